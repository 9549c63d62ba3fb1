//! Drives a tab list engine against a detached sender and prints every
//! packet it would put on the wire.

use passage_defs::{GameProfile, ProtocolVersion, TextComponent};
use passage_proxy::{TabList, TabListError};
use passage_util::{Uuid, connection::ConnectionSender};

fn main() -> Result<(), TabListError> {
    let sender = ConnectionSender::new();
    let tab = TabList::new(sender.clone(), ProtocolVersion::V1_21_2);

    tab.set_header_and_footer(
        TextComponent::text("Passage").with_color("#09add3"),
        TextComponent::text("tab list demo"),
    )?;

    let steve = Uuid::new_v4();
    let entry = tab.build_entry(GameProfile::new(steve, "Steve"), None, 42, 0, None, true, 0);
    tab.add_entry(entry)?;

    let mut stored = tab.entry(&steve).unwrap();
    stored.set_latency(80)?;
    stored.set_display_name(Some(TextComponent::text("Steve").with_bold(true)))?;

    tab.clear_all()?;
    sender.flush();

    for raw in sender.drain() {
        println!("packet {:#04X}: {} bytes", raw.id, raw.data.len());
    }
    Ok(())
}
