use std::{
    io::{Read, Write},
    ops::BitOr,
};

use passage_util::{
    ReadExt as _, Uuid,
    connection::{ClientboundPacket, ConnectionError, PacketDecoder as _, PacketEncoder as _},
};

use crate::{
    packet::id,
    profile::{ChatSession, GameProfile, ProfileProperty},
    text_component::TextComponent,
};

/// Bitset of per-field actions carried by one [`UpsertPlayerInfo`].
///
/// Every entry in the packet carries exactly the fields named by the
/// packet's action set, in ascending bit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertActions(u8);

impl UpsertActions {
    pub const ADD_PLAYER: Self = Self(0x01);
    pub const INITIALIZE_CHAT: Self = Self(0x02);
    pub const UPDATE_GAME_MODE: Self = Self(0x04);
    pub const UPDATE_LISTED: Self = Self(0x08);
    pub const UPDATE_LATENCY: Self = Self(0x10);
    pub const UPDATE_DISPLAY_NAME: Self = Self(0x20);
    pub const UPDATE_LIST_ORDER: Self = Self(0x40);

    const KNOWN: u8 = 0x7F;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are dropped; receivers ignore actions they do not know.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::KNOWN)
    }
}

impl BitOr for UpsertActions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One entry delta inside an [`UpsertPlayerInfo`]. A field is meaningful
/// only when the packet's action set names it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertEntry {
    pub profile_id: Uuid,
    pub profile: Option<GameProfile>,
    pub chat_session: Option<ChatSession>,
    pub game_mode: Option<i32>,
    pub listed: Option<bool>,
    pub latency: Option<i32>,
    pub display_name: Option<TextComponent>,
    pub list_order: Option<i32>,
}

impl UpsertEntry {
    pub fn new(profile_id: Uuid) -> Self {
        Self {
            profile_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertPlayerInfo {
    pub actions: UpsertActions,
    pub entries: Vec<UpsertEntry>,
}

fn missing_field(field: &str) -> ConnectionError {
    ConnectionError::Other(
        format!("UpsertPlayerInfo entry is missing the {field} named by its action set").into(),
    )
}

impl ClientboundPacket for UpsertPlayerInfo {
    const CLIENTBOUND_ID: i32 = id::CLIENTBOUND_PLAYER_INFO_UPDATE;

    fn packet_write(&self, mut writer: impl Write) -> Result<(), ConnectionError> {
        writer.write_all(&[self.actions.bits()])?;
        writer.encode(self.entries.len() as i32)?;
        for entry in &self.entries {
            writer.encode(&entry.profile_id)?;
            if self.actions.contains(UpsertActions::ADD_PLAYER) {
                let profile = entry.profile.as_ref().ok_or_else(|| missing_field("profile"))?;
                writer.encode(&profile.name)?;
                writer.encode(profile.properties.len() as i32)?;
                for property in &profile.properties {
                    writer.encode(property)?;
                }
            }
            if self.actions.contains(UpsertActions::INITIALIZE_CHAT) {
                writer.encode(entry.chat_session.as_ref())?;
            }
            if self.actions.contains(UpsertActions::UPDATE_GAME_MODE) {
                writer.encode(entry.game_mode.ok_or_else(|| missing_field("game mode"))?)?;
            }
            if self.actions.contains(UpsertActions::UPDATE_LISTED) {
                writer.encode(entry.listed.ok_or_else(|| missing_field("listed flag"))?)?;
            }
            if self.actions.contains(UpsertActions::UPDATE_LATENCY) {
                writer.encode(entry.latency.ok_or_else(|| missing_field("latency"))?)?;
            }
            if self.actions.contains(UpsertActions::UPDATE_DISPLAY_NAME) {
                writer.encode(entry.display_name.as_ref())?;
            }
            if self.actions.contains(UpsertActions::UPDATE_LIST_ORDER) {
                writer.encode(entry.list_order.ok_or_else(|| missing_field("list order"))?)?;
            }
        }
        Ok(())
    }

    fn packet_read(mut reader: impl Read) -> Result<Self, ConnectionError> {
        let actions = UpsertActions::from_bits(reader.read_const::<1>()?[0]);
        let count: i32 = reader.decode()?;
        let mut entries = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let mut entry = UpsertEntry::new(reader.decode()?);
            if actions.contains(UpsertActions::ADD_PLAYER) {
                let name: String = reader.decode()?;
                let property_count: i32 = reader.decode()?;
                let mut properties = Vec::with_capacity(property_count.max(0) as usize);
                for _ in 0..property_count {
                    properties.push(reader.decode::<ProfileProperty>()?);
                }
                entry.profile =
                    Some(GameProfile::new(entry.profile_id, name).with_properties(properties));
            }
            if actions.contains(UpsertActions::INITIALIZE_CHAT) {
                entry.chat_session = reader.decode()?;
            }
            if actions.contains(UpsertActions::UPDATE_GAME_MODE) {
                entry.game_mode = Some(reader.decode()?);
            }
            if actions.contains(UpsertActions::UPDATE_LISTED) {
                entry.listed = Some(reader.decode()?);
            }
            if actions.contains(UpsertActions::UPDATE_LATENCY) {
                entry.latency = Some(reader.decode()?);
            }
            if actions.contains(UpsertActions::UPDATE_DISPLAY_NAME) {
                entry.display_name = reader.decode()?;
            }
            if actions.contains(UpsertActions::UPDATE_LIST_ORDER) {
                entry.list_order = Some(reader.decode()?);
            }
            entries.push(entry);
        }
        Ok(Self { actions, entries })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovePlayerInfo {
    pub profiles_to_remove: Vec<Uuid>,
}

impl ClientboundPacket for RemovePlayerInfo {
    const CLIENTBOUND_ID: i32 = id::CLIENTBOUND_PLAYER_INFO_REMOVE;

    fn packet_write(&self, mut writer: impl Write) -> Result<(), ConnectionError> {
        writer.encode(self.profiles_to_remove.len() as i32)?;
        for profile_id in &self.profiles_to_remove {
            writer.encode(profile_id)?;
        }
        Ok(())
    }

    fn packet_read(mut reader: impl Read) -> Result<Self, ConnectionError> {
        let count: i32 = reader.decode()?;
        let mut profiles_to_remove = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            profiles_to_remove.push(reader.decode()?);
        }
        Ok(Self { profiles_to_remove })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerListHeaderFooter {
    pub header: TextComponent,
    pub footer: TextComponent,
}

impl ClientboundPacket for PlayerListHeaderFooter {
    const CLIENTBOUND_ID: i32 = id::CLIENTBOUND_TAB_LIST;

    fn packet_write(&self, mut writer: impl Write) -> Result<(), ConnectionError> {
        writer.encode(&self.header)?;
        writer.encode(&self.footer)?;
        Ok(())
    }

    fn packet_read(mut reader: impl Read) -> Result<Self, ConnectionError> {
        Ok(Self {
            header: reader.decode()?,
            footer: reader.decode()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid([n; 16])
    }

    #[test]
    fn upsert_carries_only_fields_named_by_the_action_set() {
        let packet = UpsertPlayerInfo {
            actions: UpsertActions::UPDATE_LATENCY,
            entries: vec![UpsertEntry {
                latency: Some(80),
                // Set but unnamed, so it must not reach the wire.
                game_mode: Some(1),
                ..UpsertEntry::new(uuid(1))
            }],
        };
        let decoded = UpsertPlayerInfo::packet_raw_read(&packet.raw_packet().unwrap()).unwrap();
        assert_eq!(decoded.actions, UpsertActions::UPDATE_LATENCY);
        assert_eq!(decoded.entries[0].latency, Some(80));
        assert_eq!(decoded.entries[0].game_mode, None);
    }

    #[test]
    fn upsert_add_player_round_trip() {
        let profile = GameProfile::new(uuid(2), "Steve").with_properties(vec![ProfileProperty {
            name: "textures".to_owned(),
            value: "e30=".to_owned(),
            signature: None,
        }]);
        let packet = UpsertPlayerInfo {
            actions: UpsertActions::ADD_PLAYER
                | UpsertActions::UPDATE_LISTED
                | UpsertActions::UPDATE_DISPLAY_NAME,
            entries: vec![UpsertEntry {
                profile: Some(profile.clone()),
                listed: Some(true),
                display_name: Some(TextComponent::text("Steve").with_color("gold")),
                ..UpsertEntry::new(uuid(2))
            }],
        };
        let decoded = UpsertPlayerInfo::packet_raw_read(&packet.raw_packet().unwrap()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.entries[0].profile.as_ref().unwrap(), &profile);
    }

    #[test]
    fn upsert_missing_required_field_fails_encoding() {
        let packet = UpsertPlayerInfo {
            actions: UpsertActions::UPDATE_GAME_MODE,
            entries: vec![UpsertEntry::new(uuid(3))],
        };
        assert!(packet.raw_packet().is_err());
    }

    #[test]
    fn unknown_action_bits_are_ignored() {
        assert_eq!(UpsertActions::from_bits(0xFF).bits(), 0x7F);
    }

    #[test]
    fn remove_round_trip() {
        let packet = RemovePlayerInfo {
            profiles_to_remove: vec![uuid(4), uuid(5)],
        };
        let decoded = RemovePlayerInfo::packet_raw_read(&packet.raw_packet().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }
}
