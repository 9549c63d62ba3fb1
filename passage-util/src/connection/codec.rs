use std::io::{Read, Write};

use crate::{ReadExt, Uuid};

pub trait PacketEncodable {
    fn packet_encode(self, writer: impl Write) -> std::io::Result<()>;
}

pub trait PacketDecodable
where
    Self: Sized,
{
    fn packet_decode(reader: impl Read) -> std::io::Result<Self>;
}

pub trait PacketEncoder {
    fn encode<V: PacketEncodable>(&mut self, value: V) -> std::io::Result<()>;
}

impl<W: Write> PacketEncoder for W {
    fn encode<V: PacketEncodable>(&mut self, value: V) -> std::io::Result<()> {
        value.packet_encode(self)
    }
}

pub trait PacketDecoder {
    fn decode<V: PacketDecodable>(&mut self) -> std::io::Result<V>;
}

impl<R: Read> PacketDecoder for R {
    fn decode<V: PacketDecodable>(&mut self) -> std::io::Result<V> {
        V::packet_decode(self)
    }
}

impl PacketEncodable for bool {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.write_all(&[self as u8])
    }
}

impl PacketDecodable for bool {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        match reader.read_const::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Boolean must be either 0 or 1",
            )),
        }
    }
}

impl<T: PacketEncodable> PacketEncodable for Option<T> {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        match self {
            None => writer.encode(false),
            Some(inner) => {
                writer.encode(true)?;
                writer.encode(inner)
            }
        }
    }
}

impl<T: PacketDecodable> PacketDecodable for Option<T> {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        reader
            .decode::<bool>()?
            .then(|| reader.decode())
            .transpose()
    }
}

impl PacketEncodable for i32 {
    fn packet_encode(self, writer: impl Write) -> std::io::Result<()> {
        super::varint::write_varint(writer, self)
    }
}

impl PacketDecodable for i32 {
    fn packet_decode(reader: impl Read) -> std::io::Result<Self> {
        super::varint::read_varint(reader)
    }
}

impl PacketEncodable for i64 {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        let mut value = self as u64;
        loop {
            let mut byte = value as u8 & 0x7F;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            writer.write_all(&[byte])?;
            if value == 0 {
                return Ok(());
            }
        }
    }
}

impl PacketDecodable for i64 {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        let mut value: u64 = 0;
        for position in 0..10 {
            let byte = reader.read_const::<1>()?[0];
            value |= ((byte & 0x7F) as u64) << (position * 7);
            if byte & 0x80 == 0 {
                return Ok(value as i64);
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Varlong longer than 10 bytes",
        ))
    }
}

impl PacketEncodable for &str {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.encode(self.len() as i32)?;
        writer.write_all(self.as_bytes())
    }
}

impl PacketEncodable for &String {
    fn packet_encode(self, writer: impl Write) -> std::io::Result<()> {
        self.as_str().packet_encode(writer)
    }
}

impl PacketDecodable for String {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        let len: i32 = reader.decode()?;
        let buf = reader.read_vec(len as usize)?;
        String::from_utf8(buf).map_err(|err| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, err)
        })
    }
}

// Varint-length-prefixed byte arrays (public keys, signatures).

impl PacketEncodable for &[u8] {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.encode(self.len() as i32)?;
        writer.write_all(self)
    }
}

impl PacketDecodable for Vec<u8> {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        let len: i32 = reader.decode()?;
        reader.read_vec(len as usize)
    }
}

impl PacketEncodable for &Uuid {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

impl PacketEncodable for Uuid {
    fn packet_encode(self, writer: impl Write) -> std::io::Result<()> {
        (&self).packet_encode(writer)
    }
}

impl PacketDecodable for Uuid {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        Ok(Uuid(reader.read_const()?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn option_encoding_is_prefixed() {
        let mut buf = Vec::new();
        buf.encode(None::<i32>).unwrap();
        buf.encode(Some(300)).unwrap();
        assert_eq!(buf[0], 0);
        assert_eq!(buf[1], 1);
        let mut reader = buf.as_slice();
        assert_eq!(reader.decode::<Option<i32>>().unwrap(), None);
        assert_eq!(reader.decode::<Option<i32>>().unwrap(), Some(300));
    }

    #[test]
    fn string_round_trip() {
        let mut buf = Vec::new();
        buf.encode("Passage").unwrap();
        assert_eq!(buf.as_slice().decode::<String>().unwrap(), "Passage");
    }

    #[test]
    fn varlong_round_trip() {
        for value in [0i64, 1, -1, i64::MAX, i64::MIN, 1 << 40] {
            let mut buf = Vec::new();
            buf.encode(value).unwrap();
            assert_eq!(buf.as_slice().decode::<i64>().unwrap(), value);
        }
    }

    #[test]
    fn uuid_is_sixteen_raw_bytes() {
        let uuid = Uuid([7; 16]);
        let mut buf = Vec::new();
        buf.encode(&uuid).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.as_slice().decode::<Uuid>().unwrap(), uuid);
    }
}
