pub mod connection;
pub mod read_ext;
pub mod uuid;

pub use read_ext::ReadExt;
pub use uuid::Uuid;
