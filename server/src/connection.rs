//! Length-delimited TCP framing with one bincode packet per frame
//!
//! `S` is the type this side sends and `R` the type it receives, so the
//! server splits with `<ServerPacket, ClientPacket>` and a client with the
//! reverse, and the two directions can't be mixed up.

use crate::error::ServerError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Packets a connection may have queued for its writer before it is dropped.
pub const OUTBOX_CAPACITY: usize = 256;

pub type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

pub struct PacketSender<S> {
    sink: SplitSink<FramedStream, Bytes>,
    marker: PhantomData<S>,
}

pub struct PacketReceiver<R> {
    stream: SplitStream<FramedStream>,
    marker: PhantomData<R>,
}

pub fn split_stream<S: Serialize, R: DeserializeOwned>(
    stream: TcpStream,
) -> (PacketSender<S>, PacketReceiver<R>) {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec();
    let (sink, stream) = Framed::new(stream, codec).split();

    (
        PacketSender {
            sink,
            marker: PhantomData,
        },
        PacketReceiver {
            stream,
            marker: PhantomData,
        },
    )
}

/// Bounded queue feeding a connection's writer task
///
/// A peer that stops reading its socket fills the queue. Instead of buffering
/// without limit, the first send that finds it full trips the overflow token
/// and the connection's tasks shut the connection down.
#[derive(Debug)]
pub struct Outbox<S> {
    sender: mpsc::Sender<S>,
    overflow: CancellationToken,
}

impl<S> Clone for Outbox<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            overflow: self.overflow.clone(),
        }
    }
}

pub fn outbox<S>(capacity: usize) -> (Outbox<S>, mpsc::Receiver<S>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        Outbox {
            sender,
            overflow: CancellationToken::new(),
        },
        receiver,
    )
}

impl<S> Outbox<S> {
    /// Queues a packet without waiting. Returns false once the writer is gone
    /// or the backlog is full.
    pub fn send(&self, packet: S) -> bool {
        match self.sender.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflow.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Cancelled once a send has found the backlog full.
    pub fn overflow_token(&self) -> CancellationToken {
        self.overflow.clone()
    }

    pub fn has_overflowed(&self) -> bool {
        self.overflow.is_cancelled()
    }
}

impl<S: Serialize> PacketSender<S> {
    pub async fn send(&mut self, packet: &S) -> Result<(), ServerError> {
        let bytes = shared::encode(packet)?;
        self.sink.send(Bytes::from(bytes)).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), ServerError> {
        self.sink.close().await?;
        Ok(())
    }
}

impl<R: DeserializeOwned> PacketReceiver<R> {
    /// `None` once the peer has closed the connection.
    pub async fn next_packet(&mut self) -> Option<Result<R, ServerError>> {
        let frame = match self.stream.next().await? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(ServerError::Io(e))),
        };

        Some(shared::decode(&frame).map_err(ServerError::from))
    }
}
