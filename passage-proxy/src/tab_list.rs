use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};

use log::debug;
use thiserror::Error;

use passage_defs::{
    ChatSession, GameProfile, ProtocolVersion, TextComponent,
    packet::play::{
        PlayerListHeaderFooter, RemovePlayerInfo, UpsertActions, UpsertEntry, UpsertPlayerInfo,
    },
};
use passage_util::{
    Uuid, clientbound_packet_enum,
    connection::{ConnectionError, ConnectionSender},
};

/// Game-mode value meaning "not set".
pub const GAME_MODE_NOT_SET: i32 = -1;
/// Legacy sentinel some servers still send for "unspecified".
pub const GAME_MODE_LEGACY_UNSPECIFIED: i32 = 256;

#[derive(Error, Debug)]
pub enum TabListError {
    #[error("Tab list entry has no profile id")]
    InvalidEntry,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

clientbound_packet_enum!(pub TabListPacket;
    UpsertPlayerInfo, Upsert;
    RemovePlayerInfo, Remove;
);

/// One row of one player's player-list UI.
///
/// The entry keeps a non-owning handle onto the engine that built it; the
/// publishing setters commit the change to the engine's mirror and emit a
/// single-action upsert through it. An entry whose engine is gone (or that
/// was built by [`TabList::build_entry`] and never added) just mutates
/// locally.
#[derive(Debug, Clone)]
pub struct TabListEntry {
    profile: GameProfile,
    display_name: Option<TextComponent>,
    latency: i32,
    game_mode: i32,
    listed: bool,
    list_order: i32,
    chat_session: Option<ChatSession>,
    tab_list: Weak<TabListInner>,
}

impl PartialEq for TabListEntry {
    /// Observable fields only; which engine owns the entry is not part of
    /// its value.
    fn eq(&self, other: &Self) -> bool {
        self.profile == other.profile
            && self.display_name == other.display_name
            && self.latency == other.latency
            && self.game_mode == other.game_mode
            && self.listed == other.listed
            && self.list_order == other.list_order
            && self.chat_session == other.chat_session
    }
}

impl TabListEntry {
    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    pub fn profile_id(&self) -> Uuid {
        self.profile.id
    }

    pub fn display_name(&self) -> Option<&TextComponent> {
        self.display_name.as_ref()
    }

    pub fn latency(&self) -> i32 {
        self.latency
    }

    pub fn game_mode(&self) -> i32 {
        self.game_mode
    }

    pub fn listed(&self) -> bool {
        self.listed
    }

    pub fn list_order(&self) -> i32 {
        self.list_order
    }

    pub fn chat_session(&self) -> Option<&ChatSession> {
        self.chat_session.as_ref()
    }

    /// The engine this entry publishes through, if it is still alive.
    pub fn tab_list(&self) -> Option<TabList> {
        self.tab_list.upgrade().map(|inner| TabList { inner })
    }

    pub fn set_display_name(
        &mut self,
        display_name: Option<TextComponent>,
    ) -> Result<(), TabListError> {
        self.display_name = display_name.clone();
        self.publish(UpsertActions::UPDATE_DISPLAY_NAME, move |delta| {
            delta.display_name = display_name;
        })
    }

    pub fn set_latency(&mut self, latency: i32) -> Result<(), TabListError> {
        self.latency = latency;
        self.publish(UpsertActions::UPDATE_LATENCY, |delta| {
            delta.latency = Some(latency);
        })
    }

    pub fn set_game_mode(&mut self, game_mode: i32) -> Result<(), TabListError> {
        self.game_mode = game_mode;
        self.publish(UpsertActions::UPDATE_GAME_MODE, |delta| {
            delta.game_mode = Some(game_mode);
        })
    }

    pub fn set_listed(&mut self, listed: bool) -> Result<(), TabListError> {
        self.listed = listed;
        self.publish(UpsertActions::UPDATE_LISTED, |delta| {
            delta.listed = Some(listed);
        })
    }

    /// Below 1.21.2 the new order is stored in the mirror but never put on
    /// the wire; the protocol has no such action there.
    pub fn set_list_order(&mut self, list_order: i32) -> Result<(), TabListError> {
        self.list_order = list_order;
        self.publish(UpsertActions::UPDATE_LIST_ORDER, |delta| {
            delta.list_order = Some(list_order);
        })
    }

    fn publish(
        &self,
        action: UpsertActions,
        fill: impl FnOnce(&mut UpsertEntry),
    ) -> Result<(), TabListError> {
        let Some(inner) = self.tab_list.upgrade() else {
            return Ok(());
        };
        inner.commit_single(self.profile_id(), action, fill)
    }
}

#[derive(Debug)]
struct TabListInner {
    sender: ConnectionSender,
    protocol_version: ProtocolVersion,
    entries: Mutex<HashMap<Uuid, TabListEntry>>,
}

impl TabListInner {
    /// Commit a one-field change to the mirror and emit it as a
    /// single-action upsert. The mirror write and the packet build happen
    /// under the entries lock; the send does not.
    fn commit_single(
        &self,
        profile_id: Uuid,
        action: UpsertActions,
        fill: impl FnOnce(&mut UpsertEntry),
    ) -> Result<(), TabListError> {
        let mut delta = UpsertEntry::new(profile_id);
        fill(&mut delta);
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(&profile_id) {
                apply_delta(entry, action, &delta);
            }
        }
        if action == UpsertActions::UPDATE_LIST_ORDER
            && self.protocol_version < ProtocolVersion::V1_21_2
        {
            return Ok(());
        }
        self.sender.send(&UpsertPlayerInfo {
            actions: action,
            entries: vec![delta],
        })?;
        Ok(())
    }
}

/// Copy into the mirror entry exactly the fields named by the action set.
fn apply_delta(entry: &mut TabListEntry, actions: UpsertActions, delta: &UpsertEntry) {
    if actions.contains(UpsertActions::INITIALIZE_CHAT) {
        entry.chat_session = delta.chat_session.clone();
    }
    if actions.contains(UpsertActions::UPDATE_GAME_MODE) {
        if let Some(game_mode) = delta.game_mode {
            entry.game_mode = game_mode;
        }
    }
    if actions.contains(UpsertActions::UPDATE_LISTED) {
        if let Some(listed) = delta.listed {
            entry.listed = listed;
        }
    }
    if actions.contains(UpsertActions::UPDATE_LATENCY) {
        if let Some(latency) = delta.latency {
            entry.latency = latency;
        }
    }
    if actions.contains(UpsertActions::UPDATE_DISPLAY_NAME) {
        entry.display_name = delta.display_name.clone();
    }
    if actions.contains(UpsertActions::UPDATE_LIST_ORDER) {
        if let Some(list_order) = delta.list_order {
            entry.list_order = list_order;
        }
    }
}

/// Server-authoritative mirror of one connected player's tab list.
///
/// Local calls mutate the mirror and emit minimal-delta packets to the
/// player; [`TabList::process_update`] / [`TabList::process_remove`] fold
/// the backend's own edits into the mirror without re-emitting.
#[derive(Debug, Clone)]
pub struct TabList {
    inner: Arc<TabListInner>,
}

impl TabList {
    pub fn new(sender: ConnectionSender, protocol_version: ProtocolVersion) -> Self {
        Self {
            inner: Arc::new(TabListInner {
                sender,
                protocol_version,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.inner.protocol_version
    }

    pub fn set_header_and_footer(
        &self,
        header: TextComponent,
        footer: TextComponent,
    ) -> Result<(), TabListError> {
        self.inner
            .sender
            .send(&PlayerListHeaderFooter { header, footer })?;
        Ok(())
    }

    pub fn clear_header_and_footer(&self) -> Result<(), TabListError> {
        self.set_header_and_footer(TextComponent::empty(), TextComponent::empty())
    }

    /// Build an entry bound to this engine. Building alone changes nothing;
    /// hand the entry to [`TabList::add_entry`] to show it to the player.
    #[allow(clippy::too_many_arguments)]
    pub fn build_entry(
        &self,
        profile: GameProfile,
        display_name: Option<TextComponent>,
        latency: i32,
        game_mode: i32,
        chat_session: Option<ChatSession>,
        listed: bool,
        list_order: i32,
    ) -> TabListEntry {
        TabListEntry {
            profile,
            display_name,
            latency,
            game_mode,
            listed,
            list_order,
            chat_session,
            tab_list: Arc::downgrade(&self.inner),
        }
    }

    /// Insert or merge an entry, emitting one upsert carrying the minimal
    /// action set. Re-adding an identical entry emits nothing. Entries
    /// built by another engine are accepted; their fields are taken into a
    /// fresh entry bound here.
    pub fn add_entry(&self, entry: TabListEntry) -> Result<(), TabListError> {
        if entry.profile_id().is_nil() {
            return Err(TabListError::InvalidEntry);
        }
        let mut entry = entry;
        entry.tab_list = Arc::downgrade(&self.inner);

        let profile_id = entry.profile_id();
        let packet = {
            let mut entries = self.inner.entries.lock().unwrap();
            match entries.entry(profile_id) {
                std::collections::hash_map::Entry::Occupied(mut previous) => {
                    let packet =
                        diff_entries(previous.get(), &entry, self.inner.protocol_version);
                    previous.insert(entry);
                    packet
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    let packet = insert_packet(&entry, self.inner.protocol_version);
                    slot.insert(entry);
                    Some(packet)
                }
            }
        };
        if let Some(packet) = packet {
            self.inner.sender.send(&packet)?;
        }
        Ok(())
    }

    /// Remove an entry from the mirror. The remove packet is emitted
    /// whether or not the id was present; the return value tells which.
    pub fn remove_entry(&self, profile_id: &Uuid) -> Result<Option<TabListEntry>, TabListError> {
        let removed = self.inner.entries.lock().unwrap().remove(profile_id);
        self.inner.sender.send(&RemovePlayerInfo {
            profiles_to_remove: vec![*profile_id],
        })?;
        Ok(removed)
    }

    pub fn contains_entry(&self, profile_id: &Uuid) -> bool {
        self.inner.entries.lock().unwrap().contains_key(profile_id)
    }

    pub fn entry(&self, profile_id: &Uuid) -> Option<TabListEntry> {
        self.inner.entries.lock().unwrap().get(profile_id).cloned()
    }

    pub fn entries(&self) -> Vec<TabListEntry> {
        self.inner.entries.lock().unwrap().values().cloned().collect()
    }

    /// Empty the mirror, telling the client to drop every row in one
    /// deferred remove packet.
    pub fn clear_all(&self) -> Result<(), TabListError> {
        let profiles_to_remove: Vec<Uuid> = {
            let mut entries = self.inner.entries.lock().unwrap();
            entries.drain().map(|(profile_id, _)| profile_id).collect()
        };
        self.inner
            .sender
            .delayed_send(&RemovePlayerInfo { profiles_to_remove })?;
        Ok(())
    }

    /// Empty the mirror without telling the client anything.
    pub fn clear_all_silent(&self) {
        self.inner.entries.lock().unwrap().clear();
    }

    /// Fold a backend player-list packet into the mirror.
    pub fn process(&self, packet: &TabListPacket) {
        match packet {
            TabListPacket::Upsert(upsert) => self.process_update(upsert),
            TabListPacket::Remove(remove) => self.process_remove(remove),
        }
    }

    /// Apply the backend's upsert to the mirror, without re-emitting.
    ///
    /// A delta for an unknown profile is only honored when the packet also
    /// adds the player; a partial update arriving before its add is
    /// dropped.
    pub fn process_update(&self, packet: &UpsertPlayerInfo) {
        let mut entries = self.inner.entries.lock().unwrap();
        for delta in &packet.entries {
            let entry = match entries.entry(delta.profile_id) {
                std::collections::hash_map::Entry::Occupied(occupied) => occupied.into_mut(),
                std::collections::hash_map::Entry::Vacant(slot) => {
                    if !packet.actions.contains(UpsertActions::ADD_PLAYER) {
                        debug!(
                            "Dropping tab list update for unknown profile {}",
                            delta.profile_id
                        );
                        continue;
                    }
                    let Some(profile) = delta.profile.clone() else {
                        debug!(
                            "Dropping tab list add for {} carrying no profile",
                            delta.profile_id
                        );
                        continue;
                    };
                    slot.insert(TabListEntry {
                        profile,
                        display_name: None,
                        latency: 0,
                        game_mode: delta.game_mode.unwrap_or(GAME_MODE_NOT_SET),
                        listed: false,
                        list_order: 0,
                        chat_session: None,
                        tab_list: Arc::downgrade(&self.inner),
                    })
                }
            };
            apply_delta(entry, packet.actions, delta);
        }
    }

    /// Drop the backend's removed profiles from the mirror.
    pub fn process_remove(&self, packet: &RemovePlayerInfo) {
        let mut entries = self.inner.entries.lock().unwrap();
        for profile_id in &packet.profiles_to_remove {
            entries.remove(profile_id);
        }
    }
}

/// Action set for a first-time insert: profile, latency and listed always
/// travel; the remaining fields only when they carry something the client
/// would not assume on its own.
fn insert_packet(entry: &TabListEntry, protocol_version: ProtocolVersion) -> UpsertPlayerInfo {
    let mut actions = UpsertActions::ADD_PLAYER
        | UpsertActions::UPDATE_LATENCY
        | UpsertActions::UPDATE_LISTED;
    let mut delta = UpsertEntry::new(entry.profile_id());
    delta.profile = Some(entry.profile.clone());
    delta.latency = Some(entry.latency);
    delta.listed = Some(entry.listed);
    if let Some(display_name) = &entry.display_name {
        actions.insert(UpsertActions::UPDATE_DISPLAY_NAME);
        delta.display_name = Some(display_name.clone());
    }
    if let Some(chat_session) = &entry.chat_session {
        actions.insert(UpsertActions::INITIALIZE_CHAT);
        delta.chat_session = Some(chat_session.clone());
    }
    if entry.game_mode != GAME_MODE_NOT_SET && entry.game_mode != GAME_MODE_LEGACY_UNSPECIFIED {
        actions.insert(UpsertActions::UPDATE_GAME_MODE);
        delta.game_mode = Some(entry.game_mode);
    }
    if entry.list_order != 0 && protocol_version >= ProtocolVersion::V1_21_2 {
        actions.insert(UpsertActions::UPDATE_LIST_ORDER);
        delta.list_order = Some(entry.list_order);
    }
    UpsertPlayerInfo {
        actions,
        entries: vec![delta],
    }
}

/// Per-field symmetric difference between the stored and the new entry;
/// equal entries produce no packet at all. A chat session can be replaced
/// but not cleared on the wire, so a dropped session changes only the
/// mirror.
fn diff_entries(
    previous: &TabListEntry,
    new: &TabListEntry,
    protocol_version: ProtocolVersion,
) -> Option<UpsertPlayerInfo> {
    let mut actions = UpsertActions::empty();
    let mut delta = UpsertEntry::new(new.profile_id());
    if previous.display_name != new.display_name {
        actions.insert(UpsertActions::UPDATE_DISPLAY_NAME);
        delta.display_name = new.display_name.clone();
    }
    if previous.latency != new.latency {
        actions.insert(UpsertActions::UPDATE_LATENCY);
        delta.latency = Some(new.latency);
    }
    if previous.game_mode != new.game_mode {
        actions.insert(UpsertActions::UPDATE_GAME_MODE);
        delta.game_mode = Some(new.game_mode);
    }
    if previous.listed != new.listed {
        actions.insert(UpsertActions::UPDATE_LISTED);
        delta.listed = Some(new.listed);
    }
    if previous.list_order != new.list_order && protocol_version >= ProtocolVersion::V1_21_2 {
        actions.insert(UpsertActions::UPDATE_LIST_ORDER);
        delta.list_order = Some(new.list_order);
    }
    if new.chat_session.is_some() && previous.chat_session != new.chat_session {
        actions.insert(UpsertActions::INITIALIZE_CHAT);
        delta.chat_session = new.chat_session.clone();
    }
    (!actions.is_empty()).then_some(UpsertPlayerInfo {
        actions,
        entries: vec![delta],
    })
}
