use std::io::Write as _;

use thiserror::Error;

use crate::ReadExt as _;

use super::{PacketDecoder as _, PacketEncoder as _};

#[derive(Error, Debug)]
pub enum PacketHandlerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Zlib compression level must be inside range 0..=9, but got {0}")]
    InvalidCompressionLevel(u32),
}

/// Per-packet payload framing between a [`super::Connection`] and its peer.
///
/// `Zlib` is the post-negotiation state: payloads at or above `threshold`
/// are deflated, smaller ones ride with a `0` length marker. A negative
/// threshold behaves like [`PacketHandler::Uncompressed`].
#[derive(Debug, Clone)]
pub enum PacketHandler {
    Uncompressed,
    Zlib { threshold: i32, level: u32 },
}

impl PacketHandler {
    pub fn new_zlib(threshold: i32, level: u32) -> Result<Self, PacketHandlerError> {
        if level > 9 {
            return Err(PacketHandlerError::InvalidCompressionLevel(level));
        }
        Ok(Self::Zlib { threshold, level })
    }

    pub(crate) fn write(&self, raw: &[u8]) -> Result<Vec<u8>, PacketHandlerError> {
        match self {
            PacketHandler::Uncompressed => Ok(raw.to_vec()),
            PacketHandler::Zlib { threshold, level } => {
                if *threshold < 0 || raw.len() < *threshold as usize {
                    let mut writer = Vec::new();
                    writer.encode(0)?;
                    writer.write_all(raw)?;
                    Ok(writer)
                } else {
                    let mut encoder = flate2::write::ZlibEncoder::new(
                        Vec::new(),
                        flate2::Compression::new(*level),
                    );
                    encoder.write_all(raw)?;
                    let compressed = encoder.finish()?;

                    let mut writer = Vec::new();
                    writer.encode(raw.len() as i32)?;
                    writer.write_all(&compressed)?;
                    Ok(writer)
                }
            }
        }
    }

    pub(crate) fn read(&self, buf: &[u8]) -> Result<Vec<u8>, PacketHandlerError> {
        match self {
            PacketHandler::Uncompressed => Ok(buf.to_vec()),
            PacketHandler::Zlib { .. } => {
                let mut reader = std::io::Cursor::new(buf);
                match reader.decode::<i32>()? {
                    0 => Ok(reader.read_remaining()?),
                    _uncompressed_size => {
                        Ok(flate2::read::ZlibDecoder::new(reader).read_remaining()?)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uncompressed_is_identity() {
        let handler = PacketHandler::Uncompressed;
        let payload = b"hello".to_vec();
        assert_eq!(handler.read(&handler.write(&payload).unwrap()).unwrap(), payload);
    }

    #[test]
    fn zlib_round_trips_both_sides_of_the_threshold() {
        let handler = PacketHandler::new_zlib(16, 6).unwrap();
        for payload in [b"tiny".to_vec(), vec![42u8; 4096]] {
            let framed = handler.write(&payload).unwrap();
            assert_eq!(handler.read(&framed).unwrap(), payload);
        }
    }

    #[test]
    fn negative_threshold_never_compresses() {
        let handler = PacketHandler::new_zlib(-1, 6).unwrap();
        let framed = handler.write(&vec![0u8; 4096]).unwrap();
        // 0 marker + raw payload.
        assert_eq!(framed.len(), 4097);
    }

    #[test]
    fn rejects_out_of_range_level() {
        assert!(PacketHandler::new_zlib(256, 10).is_err());
    }
}
