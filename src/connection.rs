use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::codec::{self, FrameCodec};
use crate::frame::Frame;

pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    // Data is read from the socket into the codec's buffer. When a frame is decoded, the
    // corresponding bytes are removed from the buffer and anything after them is kept.
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    pub writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr) -> Connection {
        Self::with_codec(stream, client_address, FrameCodec::new())
    }

    pub fn with_codec(
        stream: TcpStream,
        client_address: SocketAddr,
        codec: FrameCodec,
    ) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader: FramedRead::new(reader, codec.clone()),
            writer: FramedWrite::new(writer, codec),
        }
    }

    /// Reads the next frame. Returns `None` once the peer has closed the connection; bytes left
    /// over without a terminator are dropped rather than returned as a partial frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, codec::Error> {
        self.reader.next().await.transpose()
    }

    /// Writes `frame` followed by the terminator and flushes it. Any short write surfaces as an
    /// error.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), codec::Error> {
        self.writer.send(frame).await
    }

    /// Shuts down the write side so the peer sees end-of-stream.
    pub async fn close(&mut self) -> Result<(), codec::Error> {
        SinkExt::<Frame>::close(&mut self.writer).await
    }
}
