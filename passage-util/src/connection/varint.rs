use std::io::{Read, Write};

/// Longest legal wire encoding of an i32 varint.
pub const MAX_VARINT_BYTES: usize = 5;

pub fn write_varint(mut writer: impl Write, value: i32) -> std::io::Result<()> {
    let mut value = value as u32;
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

/// Reads a varint, also returning how many bytes it occupied.
pub fn read_varint_ret_bytes(mut reader: impl Read) -> std::io::Result<(usize, i32)> {
    let mut bytes = 0;
    let mut value: u32 = 0;
    loop {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        let byte = buf[0];
        value |= ((byte & 0x7F) as u32) << (bytes * 7);
        bytes += 1;
        if byte & 0x80 == 0 {
            return Ok((bytes, value as i32));
        }
        if bytes == MAX_VARINT_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Varint longer than 5 bytes",
            ));
        }
    }
}

pub fn read_varint(reader: impl Read) -> std::io::Result<i32> {
    Ok(read_varint_ret_bytes(reader)?.1)
}

/// Like [`read_varint_ret_bytes`], but an incomplete buffer yields `None`
/// instead of an error so framing can wait for more bytes.
pub fn try_read_varint_ret_bytes(data: &[u8]) -> std::io::Result<Option<(usize, i32)>> {
    match read_varint_ret_bytes(data) {
        Ok(varint) => Ok(Some(varint)),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(value: i32) -> (usize, i32) {
        let mut buf = Vec::new();
        write_varint(&mut buf, value).unwrap();
        read_varint_ret_bytes(buf.as_slice()).unwrap()
    }

    #[test]
    fn round_trips() {
        for value in [0, 1, 127, 128, 255, 25565, 2097151, i32::MAX, -1, i32::MIN] {
            assert_eq!(round_trip(value).1, value);
        }
    }

    #[test]
    fn encoded_sizes() {
        assert_eq!(round_trip(0).0, 1);
        assert_eq!(round_trip(127).0, 1);
        assert_eq!(round_trip(128).0, 2);
        assert_eq!(round_trip(-1).0, 5);
    }

    #[test]
    fn incomplete_buffer_is_none() {
        assert_eq!(try_read_varint_ret_bytes(&[0x80]).unwrap(), None);
        assert_eq!(try_read_varint_ret_bytes(&[0x80, 0x01]).unwrap(), Some((2, 128)));
    }

    #[test]
    fn overlong_is_rejected() {
        assert!(read_varint([0xFFu8; 6].as_slice()).is_err());
    }
}
