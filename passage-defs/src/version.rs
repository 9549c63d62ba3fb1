use std::fmt;

/// A Minecraft wire-protocol revision.
///
/// Declaration order follows protocol numbers, so `Ord` compares by wire
/// revision. `V1_21_2` (768) is the first revision carrying the tab-list
/// `UPDATE_LIST_ORDER` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1_19_4,
    V1_20,
    V1_20_2,
    V1_20_3,
    V1_20_5,
    V1_21,
    V1_21_2,
    V1_21_4,
}

impl ProtocolVersion {
    pub const fn id(self) -> i32 {
        match self {
            ProtocolVersion::V1_19_4 => 762,
            ProtocolVersion::V1_20 => 763,
            ProtocolVersion::V1_20_2 => 764,
            ProtocolVersion::V1_20_3 => 765,
            ProtocolVersion::V1_20_5 => 766,
            ProtocolVersion::V1_21 => 767,
            ProtocolVersion::V1_21_2 => 768,
            ProtocolVersion::V1_21_4 => 769,
        }
    }

    pub const fn from_id(id: i32) -> Option<Self> {
        match id {
            762 => Some(ProtocolVersion::V1_19_4),
            763 => Some(ProtocolVersion::V1_20),
            764 => Some(ProtocolVersion::V1_20_2),
            765 => Some(ProtocolVersion::V1_20_3),
            766 => Some(ProtocolVersion::V1_20_5),
            767 => Some(ProtocolVersion::V1_21),
            768 => Some(ProtocolVersion::V1_21_2),
            769 => Some(ProtocolVersion::V1_21_4),
            _ => None,
        }
    }

    /// First client version of this revision.
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVersion::V1_19_4 => "1.19.4",
            ProtocolVersion::V1_20 => "1.20",
            ProtocolVersion::V1_20_2 => "1.20.2",
            ProtocolVersion::V1_20_3 => "1.20.3",
            ProtocolVersion::V1_20_5 => "1.20.5",
            ProtocolVersion::V1_21 => "1.21",
            ProtocolVersion::V1_21_2 => "1.21.2",
            ProtocolVersion::V1_21_4 => "1.21.4",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
