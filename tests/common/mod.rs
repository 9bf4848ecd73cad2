#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use serialized_redis::{
    Client, Cmd, CodecKind, Frame, MemoryClient, Result, SerializedClient, Store,
};

pub const CODECS: [CodecKind; 3] = [CodecKind::Json, CodecKind::Msgpack, CodecKind::Bincode];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn memory(kind: CodecKind) -> SerializedClient<MemoryClient> {
    init_tracing();
    SerializedClient::new(MemoryClient::new(), kind.build())
}

pub fn memory_with_store(kind: CodecKind, store: &Store) -> SerializedClient<MemoryClient> {
    init_tracing();
    SerializedClient::new(MemoryClient::with_store(store.clone()), kind.build())
}

/// A client that answers from a script and records every command it is given.
#[derive(Default)]
pub struct RecordingClient {
    pub sent: Vec<Cmd>,
    replies: VecDeque<Frame>,
}

impl RecordingClient {
    pub fn new(replies: impl IntoIterator<Item = Frame>) -> RecordingClient {
        RecordingClient {
            sent: Vec::new(),
            replies: replies.into_iter().collect(),
        }
    }

    /// The arguments of every recorded command, command name included.
    pub fn lines(&self) -> Vec<Vec<Vec<u8>>> {
        self.sent
            .iter()
            .map(|cmd| cmd.parts().iter().map(|part| part.to_vec()).collect())
            .collect()
    }

    fn next_reply(&mut self) -> Frame {
        self.replies.pop_front().unwrap_or(Frame::Null)
    }
}

impl Client for RecordingClient {
    async fn request(&mut self, cmd: Cmd) -> Result<Frame> {
        self.sent.push(cmd);
        Ok(self.next_reply())
    }

    async fn request_batch(&mut self, cmds: Vec<Cmd>) -> Result<Vec<Frame>> {
        let mut replies = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            self.sent.push(cmd);
            replies.push(self.next_reply());
        }
        Ok(replies)
    }

    async fn send(&mut self, cmd: Cmd) -> Result<()> {
        self.sent.push(cmd);
        Ok(())
    }

    async fn next_push(&mut self, _timeout: Option<Duration>) -> Result<Option<Frame>> {
        Ok(self.replies.pop_front())
    }
}

pub fn recording(kind: CodecKind, replies: impl IntoIterator<Item = Frame>) -> SerializedClient<RecordingClient> {
    init_tracing();
    SerializedClient::new(RecordingClient::new(replies), kind.build())
}
