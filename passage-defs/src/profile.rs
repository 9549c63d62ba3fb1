use std::io::{Read, Write};

use passage_util::{
    Uuid,
    connection::{PacketDecodable, PacketDecoder as _, PacketEncodable, PacketEncoder as _},
};

/// A signed profile property; `textures` carries the skin blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// The identity of one player as the session layer authenticated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<ProfileProperty>) -> Self {
        self.properties = properties;
        self
    }
}

/// Signed-chat key material, valid until `expires_at` (epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedKey {
    pub expires_at: i64,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Chain-of-trust token establishing a client's signed-chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub session_id: Uuid,
    pub identified_key: IdentifiedKey,
}

impl PacketEncodable for &ProfileProperty {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.encode(&self.name)?;
        writer.encode(&self.value)?;
        writer.encode(self.signature.as_ref())
    }
}

impl PacketDecodable for ProfileProperty {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        Ok(Self {
            name: reader.decode()?,
            value: reader.decode()?,
            signature: reader.decode()?,
        })
    }
}

impl PacketEncodable for &ChatSession {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.encode(&self.session_id)?;
        writer.write_all(&self.identified_key.expires_at.to_be_bytes())?;
        writer.encode(self.identified_key.public_key.as_slice())?;
        writer.encode(self.identified_key.signature.as_slice())
    }
}

impl PacketDecodable for ChatSession {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        use passage_util::ReadExt as _;
        Ok(Self {
            session_id: reader.decode()?,
            identified_key: IdentifiedKey {
                expires_at: i64::from_be_bytes(reader.read_const()?),
                public_key: reader.decode()?,
                signature: reader.decode()?,
            },
        })
    }
}
