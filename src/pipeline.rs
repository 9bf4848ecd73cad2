use std::mem;

use tracing::{debug, warn};

use crate::client::Client;
use crate::cmd::{Cmd, Request};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::reply::Reply;
use crate::serialized::SerializedClient;

/// A batch of commands sent to the server in one round trip.
///
/// Pipelines expose the same command methods as [`SerializedClient`], but each call only
/// serializes its arguments and queues the command. [`Pipeline::execute`] sends the queue and
/// decodes each reply with the decoder of the command at the same position.
///
/// In transaction mode the queue is wrapped in `MULTI`/`EXEC`. Keys watched with
/// [`Pipeline::watch`] turn a failed `EXEC` into [`Error::PreconditionFailed`]. The queue is
/// cleared by every `execute`, whether it succeeds or not, so the pipeline can be reused.
///
/// A pipeline dropped while watching keys makes the client release them before its next
/// command.
pub struct Pipeline<'a, C: Client> {
    client: &'a mut SerializedClient<C>,
    transaction: bool,
    queue: Vec<Request>,
    watching: bool,
}

impl<'a, C: Client> Pipeline<'a, C> {
    pub(crate) fn new(client: &'a mut SerializedClient<C>, transaction: bool) -> Pipeline<'a, C> {
        Pipeline {
            client,
            transaction,
            queue: Vec::new(),
            watching: false,
        }
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.client.codec()
    }

    pub(crate) fn queue(&mut self, request: Request) {
        self.queue.push(request);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_transaction(&self) -> bool {
        self.transaction
    }

    pub fn watching(&self) -> bool {
        self.watching
    }

    /// Watches `keys` for changes until the next `execute`. Must be called before any command
    /// is queued; reads in between go through [`Pipeline::immediate`].
    pub async fn watch(&mut self, keys: &[&str]) -> Result<()> {
        if !self.queue.is_empty() {
            return Err(Error::InvalidState(
                "WATCH must be issued before any command is queued".to_string(),
            ));
        }
        if keys.is_empty() {
            return Err(Error::shape("WATCH needs at least one key"));
        }

        let cmd = Cmd::new("WATCH").args(keys.to_vec());
        self.client.execute(Request::new(cmd)).await?;
        self.watching = true;
        Ok(())
    }

    pub async fn unwatch(&mut self) -> Result<()> {
        if self.watching {
            self.client.execute(Request::new(Cmd::new("UNWATCH"))).await?;
            self.watching = false;
        }
        Ok(())
    }

    /// The client itself, for commands that must run right away, such as reading watched keys.
    pub fn immediate(&mut self) -> &mut SerializedClient<C> {
        &mut *self.client
    }

    /// Drops the queued commands and releases watched keys.
    pub async fn reset(&mut self) -> Result<()> {
        self.queue.clear();
        self.unwatch().await
    }

    /// Sends the queue and returns one decoded reply per command. The first error reply is
    /// raised as [`Error::Response`].
    pub async fn execute(&mut self) -> Result<Vec<Reply>> {
        self.execute_with(true).await
    }

    /// Like [`Pipeline::execute`]. With `raise_on_error` unset, error replies are returned in
    /// place as [`Reply::Error`] next to the decoded replies of the other commands.
    pub async fn execute_with(&mut self, raise_on_error: bool) -> Result<Vec<Reply>> {
        let queue = mem::take(&mut self.queue);
        let atomic = self.transaction || self.watching;
        let watching = mem::replace(&mut self.watching, false);

        if queue.is_empty() && !watching {
            return Ok(Vec::new());
        }

        debug!(size = queue.len(), atomic, "executing batch");
        self.client.release_pending().await?;

        let frames = if atomic {
            self.execute_transaction(&queue).await?
        } else {
            let cmds = queue.iter().map(|request| request.cmd.clone()).collect();
            self.client.client_mut().request_batch(cmds).await?
        };

        if frames.len() != queue.len() {
            return Err(Error::unexpected(
                "one reply per queued command",
                format!("{} replies for {} commands", frames.len(), queue.len()),
            ));
        }

        let mut replies = Vec::with_capacity(queue.len());
        for (index, (request, frame)) in queue.iter().zip(frames).enumerate() {
            let reply = self
                .client
                .decode(&request.callback, &request.options, frame)?;
            if let Reply::Error(msg) = &reply {
                if raise_on_error {
                    return Err(command_error(index, &request.cmd, msg));
                }
            }
            replies.push(reply);
        }

        Ok(replies)
    }

    // Sends `MULTI`, the queue and `EXEC`, and returns the replies inside the `EXEC` reply.
    async fn execute_transaction(&mut self, queue: &[Request]) -> Result<Vec<Frame>> {
        let mut cmds = Vec::with_capacity(queue.len() + 2);
        cmds.push(Cmd::new("MULTI"));
        cmds.extend(queue.iter().map(|request| request.cmd.clone()));
        cmds.push(Cmd::new("EXEC"));

        let mut frames = self.client.client_mut().request_batch(cmds).await?;
        let exec = frames
            .pop()
            .ok_or_else(|| Error::unexpected("EXEC reply", "no replies"))?;

        let mut acks = frames.into_iter();
        if let Some(Frame::Error(msg)) = acks.next() {
            return Err(Error::Response(msg));
        }
        // Commands the server refused to queue abort the whole transaction.
        let queue_error = acks.enumerate().find_map(|(index, frame)| match frame {
            Frame::Error(msg) => Some((index, msg)),
            _ => None,
        });

        match exec {
            Frame::Array(replies) => Ok(replies),
            Frame::Null => {
                warn!(size = queue.len(), "watched key changed, transaction aborted");
                Err(Error::PreconditionFailed)
            }
            Frame::Error(msg) => match queue_error {
                Some((index, queue_msg)) => match queue.get(index) {
                    Some(request) => Err(command_error(index, &request.cmd, &queue_msg)),
                    None => Err(Error::Response(queue_msg)),
                },
                None => Err(Error::Response(msg)),
            },
            other => Err(Error::unexpected("EXEC reply", other)),
        }
    }
}

impl<'a, C: Client> std::fmt::Debug for Pipeline<'a, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("transaction", &self.transaction)
            .field("queue", &self.queue)
            .field("watching", &self.watching)
            .finish_non_exhaustive()
    }
}

impl<'a, C: Client> Drop for Pipeline<'a, C> {
    fn drop(&mut self) {
        if self.watching {
            self.client.defer_unwatch();
        }
    }
}

fn command_error(index: usize, cmd: &Cmd, msg: &str) -> Error {
    Error::Response(format!(
        "Command # {} ({}) of pipeline caused error: {}",
        index + 1,
        cmd,
        msg
    ))
}
