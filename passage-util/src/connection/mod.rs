mod codec;
pub mod handler;
pub mod varint;

use std::{
    collections::VecDeque,
    io::{Read, Write},
    net::TcpStream,
    sync::{Arc, Mutex},
};

use thiserror::Error;

pub use codec::*;
pub use handler::{PacketHandler, PacketHandlerError};

use crate::ReadExt as _;
use varint::try_read_varint_ret_bytes;

const RECEIVE_BUFFER_SIZE: usize = 1024;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Handler(#[from] PacketHandlerError),
    #[error("Unsupported packet {0}: {1:#X}")]
    UnsupportedPacket(String, i32),
    #[error("Unexpected packet ID for parser (expected: {expected:#X}, found: {found:#X})")]
    UnexpectedPacketId { expected: i32, found: i32 },
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// An id + body packet, before framing and compression.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawPacket {
    pub id: i32,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn new(id: i32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn frame_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + 1);
        bytes.encode(self.id).unwrap();
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

/// A clientbound packet. The proxy sits on both ends of this direction: it
/// writes these to the player and reads them back off the backend server,
/// so the trait carries both the encoder and the decoder.
pub trait ClientboundPacket {
    const CLIENTBOUND_ID: i32;

    fn clientbound_id(&self) -> i32 {
        Self::CLIENTBOUND_ID
    }

    fn packet_write(&self, writer: impl Write) -> Result<(), ConnectionError>;

    fn packet_read(reader: impl Read) -> Result<Self, ConnectionError>
    where
        Self: Sized;

    fn raw_packet(&self) -> Result<RawPacket, ConnectionError> {
        let mut data = Vec::new();
        self.packet_write(&mut data)?;
        Ok(RawPacket {
            id: self.clientbound_id(),
            data,
        })
    }

    fn packet_raw_read(raw: &RawPacket) -> Result<Self, ConnectionError>
    where
        Self: Sized,
    {
        if raw.id != Self::CLIENTBOUND_ID {
            return Err(ConnectionError::UnexpectedPacketId {
                expected: Self::CLIENTBOUND_ID,
                found: raw.id,
            });
        }
        Self::packet_read(std::io::Cursor::new(&raw.data))
    }
}

#[macro_export]
macro_rules! clientbound_packet_enum {
    ($enum_vis:vis $enum_name:ident; $($type:ty, $name:ident;)*) => {
        #[derive(Debug)]
        $enum_vis enum $enum_name {
            $(
                $name($type),
            )*
        }

        impl TryFrom<&$crate::connection::RawPacket> for $enum_name {
            type Error = $crate::connection::ConnectionError;

            fn try_from(raw: &$crate::connection::RawPacket) -> std::result::Result<Self, Self::Error> {
                use $crate::connection::ClientboundPacket as _;
                match raw.id {
                    $(
                        <$type>::CLIENTBOUND_ID => Ok(Self::$name(
                            <$type>::packet_read(std::io::Cursor::new(&raw.data))?,
                        )),
                    )*
                    _ => Err(Self::Error::UnsupportedPacket(
                        stringify!($enum_name).to_owned(),
                        raw.id,
                    )),
                }
            }
        }

        impl TryFrom<$crate::connection::RawPacket> for $enum_name {
            type Error = $crate::connection::ConnectionError;

            fn try_from(raw: $crate::connection::RawPacket) -> std::result::Result<Self, Self::Error> {
                Self::try_from(&raw)
            }
        }
    }
}

#[derive(Debug, Default)]
struct SenderInner {
    queued: VecDeque<RawPacket>,
    pending: Vec<RawPacket>,
    closed: bool,
}

/// Cheaply clonable handle onto a connection's outbound packet queue.
///
/// Sending never performs I/O on the caller's thread; packets are encoded
/// and enqueued, and the owning [`Connection`] drains them to the socket.
/// After [`ConnectionSender::close`] every write is a silent no-op.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSender {
    inner: Arc<Mutex<SenderInner>>,
}

impl ConnectionSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Encode & enqueue a packet for immediate write-out.
    pub fn send(&self, packet: &impl ClientboundPacket) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        let raw = packet.raw_packet()?;
        inner.queued.push_back(raw);
        Ok(())
    }

    /// Encode & stage a packet; it is not written out until [`Self::flush`].
    pub fn delayed_send(&self, packet: &impl ClientboundPacket) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        let raw = packet.raw_packet()?;
        inner.pending.push(raw);
        Ok(())
    }

    /// Promote every staged packet into the outbound queue.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        let pending = std::mem::take(&mut inner.pending);
        inner.queued.extend(pending);
    }

    /// Take everything currently queued, in send order.
    pub fn drain(&self) -> Vec<RawPacket> {
        self.inner.lock().unwrap().queued.drain(..).collect()
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.queued.clear();
        inner.pending.clear();
    }
}

/// Non-blocking packet transport over a [`TcpStream`].
///
/// Inbound bytes are buffered and framed into [`RawPacket`]s; outbound
/// packets come from the shared [`ConnectionSender`] queue and are written
/// by [`Connection::flush_outgoing`]. EOF, reset and broken-pipe all
/// quietly close the connection.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    handler: PacketHandler,
    sender: ConnectionSender,
    bytes: VecDeque<u8>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Result<Self, ConnectionError> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: Some(stream),
            handler: PacketHandler::Uncompressed,
            sender: ConnectionSender::new(),
            bytes: VecDeque::new(),
        })
    }

    /// Create a new [`ConnectionSender`] writing into this connection.
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    pub fn set_packet_handler(&mut self, handler: PacketHandler) {
        self.handler = handler;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.sender.close();
    }

    fn receive_bytes(&mut self) -> Result<(), ConnectionError> {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(());
            };
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.close();
                    return Ok(());
                }
                Ok(n) => self.bytes.extend(&buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::BrokenPipe
                            | std::io::ErrorKind::UnexpectedEof
                            | std::io::ErrorKind::ConnectionReset
                    ) =>
                {
                    self.close();
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Receive a raw packet if a whole frame is available.
    pub fn receive(&mut self) -> Result<Option<RawPacket>, ConnectionError> {
        self.receive_bytes()?;

        let Some((size_bytes, size)) = try_read_varint_ret_bytes(self.bytes.make_contiguous())?
        else {
            return Ok(None);
        };
        if self.bytes.len() < size_bytes + size as usize {
            return Ok(None);
        }

        self.bytes.drain(..size_bytes);
        let framed: Vec<u8> = self.bytes.drain(..size as usize).collect();
        let decoded = self.handler.read(&framed)?;

        let mut reader = std::io::Cursor::new(&decoded);
        Ok(Some(RawPacket {
            id: reader.decode::<i32>()?,
            data: reader.read_remaining()?,
        }))
    }

    /// Receive & decode a packet if available.
    pub fn receive_into<T>(&mut self) -> Result<Option<T>, ConnectionError>
    where
        T: TryFrom<RawPacket, Error = ConnectionError>,
    {
        self.receive().map(|i| i.map(T::try_from).transpose())?
    }

    /// Write everything the sender has queued to the socket.
    pub fn flush_outgoing(&mut self) -> Result<(), ConnectionError> {
        for raw in self.sender.drain() {
            let framed = self.handler.write(&raw.frame_bytes())?;
            let mut bytes = Vec::with_capacity(framed.len() + 1);
            bytes.encode(framed.len() as i32)?;
            bytes.extend_from_slice(&framed);

            let Some(stream) = self.stream.as_mut() else {
                return Ok(());
            };
            match stream.write_all(&bytes) {
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                    ) =>
                {
                    self.close();
                    return Ok(());
                }
                result => result?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Ping(i32);

    impl ClientboundPacket for Ping {
        const CLIENTBOUND_ID: i32 = 0x01;

        fn packet_write(&self, mut writer: impl Write) -> Result<(), ConnectionError> {
            writer.encode(self.0)?;
            Ok(())
        }

        fn packet_read(mut reader: impl Read) -> Result<Self, ConnectionError> {
            Ok(Self(reader.decode()?))
        }
    }

    #[test]
    fn sender_queues_until_drained() {
        let sender = ConnectionSender::new();
        sender.send(&Ping(1)).unwrap();
        sender.send(&Ping(2)).unwrap();
        let drained = sender.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(Ping::packet_raw_read(&drained[0]).unwrap(), Ping(1));
        assert!(sender.drain().is_empty());
    }

    #[test]
    fn delayed_send_needs_flush() {
        let sender = ConnectionSender::new();
        sender.delayed_send(&Ping(7)).unwrap();
        assert!(sender.drain().is_empty());
        sender.delayed_send(&Ping(8)).unwrap();
        sender.flush();
        assert_eq!(sender.drain().len(), 1);
    }

    #[test]
    fn closed_sender_drops_writes() {
        let sender = ConnectionSender::new();
        sender.close();
        sender.send(&Ping(1)).unwrap();
        assert!(sender.drain().is_empty());
        assert!(sender.is_closed());
    }

    #[test]
    fn packets_survive_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();

        let mut writing = Connection::new(server).unwrap();
        let mut reading = Connection::new(client).unwrap();

        writing.sender().send(&Ping(25565)).unwrap();
        writing.flush_outgoing().unwrap();

        let received = loop {
            if let Some(packet) = reading.receive().unwrap() {
                break packet;
            }
        };
        assert_eq!(Ping::packet_raw_read(&received).unwrap(), Ping(25565));
    }

    #[test]
    fn raw_packet_id_mismatch_is_rejected() {
        let raw = RawPacket::new(0x55, vec![0x00]);
        assert!(matches!(
            Ping::packet_raw_read(&raw),
            Err(ConnectionError::UnexpectedPacketId { .. })
        ));
    }
}
