use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::client::Client;
use crate::cmd::Cmd;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{self, Frame};

/// Splits the byte stream of a connection into frames and writes frames back out.
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => {
                // Refuse to buffer a frame bigger than the limit.
                if src.len() > self.max_frame_size {
                    return Err(Error::Frame(frame::Error::Other(format!(
                        "frame size exceeds limit of {} bytes",
                        self.max_frame_size
                    ))));
                }
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&frame.serialize());
        Ok(())
    }
}

/// A TCP connection to a server speaking the Redis protocol.
pub struct Connection {
    pub id: Uuid,
    peer_addr: SocketAddr,
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, config: &Config) -> Result<Connection> {
        let peer_addr = stream.peer_addr()?;
        let codec = FrameCodec::new(config.max_frame_size);

        Ok(Connection {
            id: Uuid::new_v4(),
            peer_addr,
            framed: Framed::with_capacity(stream, codec, config.read_buffer_capacity),
        })
    }

    #[instrument(name = "connection", skip(config), fields(addr = %config.addr, connection_id))]
    pub async fn connect(config: &Config) -> Result<Connection> {
        let stream = TcpStream::connect(&config.addr).await?;
        let conn = Connection::new(stream, config)?;

        tracing::Span::current().record("connection_id", conn.id.to_string());
        debug!(peer = %conn.peer_addr, "connected");

        Ok(conn)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Reads the next frame. `None` means the peer closed the connection cleanly.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.framed.send(frame).await
    }

    async fn expect_frame(&mut self) -> Result<Frame> {
        match self.read_frame().await? {
            Some(frame) => {
                trace!(connection_id = %self.id, %frame, "received frame");
                Ok(frame)
            }
            None => Err(Error::ConnectionClosed),
        }
    }
}

impl Client for Connection {
    async fn request(&mut self, cmd: Cmd) -> Result<Frame> {
        self.write_frame(cmd.into_frame()).await?;
        self.expect_frame().await
    }

    async fn request_batch(&mut self, cmds: Vec<Cmd>) -> Result<Vec<Frame>> {
        let count = cmds.len();
        for cmd in cmds {
            self.framed.feed(cmd.into_frame()).await?;
        }
        self.framed.flush().await?;

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.expect_frame().await?);
        }
        Ok(frames)
    }

    async fn send(&mut self, cmd: Cmd) -> Result<()> {
        self.write_frame(cmd.into_frame()).await
    }

    async fn next_push(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>> {
        match timeout {
            Some(timeout) => match time::timeout(timeout, self.expect_frame()).await {
                Ok(frame) => frame.map(Some),
                Err(_) => Ok(None),
            },
            None => self.expect_frame().await.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo\r\n:1\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::bulk("hello")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Integer(1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"$100\r\n0123456789"[..]);

        assert!(matches!(codec.decode(&mut buf), Err(Error::Frame(_))));
    }

    #[test]
    fn encode_command() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::new();

        codec
            .encode(Cmd::new("get").arg("k").into_frame(), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    }
}
