pub mod play;

/// Clientbound play packet ids for the pinned protocol revision (1.21.2).
pub mod id {
    pub const CLIENTBOUND_PLAYER_INFO_REMOVE: i32 = 0x3F;
    pub const CLIENTBOUND_PLAYER_INFO_UPDATE: i32 = 0x40;
    pub const CLIENTBOUND_TAB_LIST: i32 = 0x6D;
}
