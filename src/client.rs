use std::future::Future;
use std::time::Duration;

use crate::callbacks::ResponseCallbacks;
use crate::cmd::Cmd;
use crate::error::Result;
use crate::frame::Frame;

/// The underlying client wrapped by [`SerializedClient`](crate::SerializedClient).
///
/// Implementations move already serialized command lines to a server and hand back its raw
/// replies. They know nothing about codecs.
pub trait Client: Send {
    /// Sends one command and waits for its reply. Error replies come back as
    /// [`Frame::Error`], not as `Err`.
    fn request(&mut self, cmd: Cmd) -> impl Future<Output = Result<Frame>> + Send;

    /// Sends every command in one write and returns one reply per command, in order.
    fn request_batch(&mut self, cmds: Vec<Cmd>) -> impl Future<Output = Result<Vec<Frame>>> + Send;

    /// Sends a command without waiting for a reply, used once the connection is subscribed.
    fn send(&mut self, cmd: Cmd) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the next pushed frame of a subscribed connection. `None` as timeout waits
    /// until a frame arrives; `Ok(None)` means the timeout elapsed first.
    fn next_push(
        &mut self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<Frame>>> + Send;

    /// The protocol level reply parsers of this client.
    fn response_callbacks(&self) -> ResponseCallbacks {
        ResponseCallbacks::standard()
    }
}
