use std::io::Read;

/// Small conveniences over [`Read`] used by the packet codec.
pub trait ReadExt {
    fn read_const<const N: usize>(&mut self) -> std::io::Result<[u8; N]>;
    fn read_vec(&mut self, size: usize) -> std::io::Result<Vec<u8>>;
    fn read_remaining(&mut self) -> std::io::Result<Vec<u8>>;
}

impl<T: Read> ReadExt for T {
    fn read_const<const N: usize>(&mut self) -> std::io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_vec(&mut self, size: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_remaining(&mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}
