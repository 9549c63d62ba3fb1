pub mod packet;
pub mod profile;
pub mod text_component;
pub mod version;

pub use profile::{ChatSession, GameProfile, IdentifiedKey, ProfileProperty};
pub use text_component::TextComponent;
pub use version::ProtocolVersion;
