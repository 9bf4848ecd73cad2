use std::collections::HashSet;
use std::time::Duration;

use strum_macros::{Display, EnumString};
use tracing::debug;

use crate::client::Client;
use crate::cmd::Cmd;
use crate::codec::deserialize_value;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::reply::Reply;
use crate::serialized::SerializedClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Subscribe,
    Unsubscribe,
    Psubscribe,
    Punsubscribe,
    Message,
    Pmessage,
}

impl MessageKind {
    /// Acknowledgements of subscription changes, which carry a count instead of a payload.
    pub fn is_subscription(self) -> bool {
        !matches!(self, MessageKind::Message | MessageKind::Pmessage)
    }
}

/// An event received on a subscribed connection.
///
/// For `message` and `pmessage` events `data` holds the decoded payload as [`Reply::Value`].
/// For subscription acknowledgements it holds the number of active subscriptions as
/// [`Reply::Int`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub pattern: Option<String>,
    pub channel: String,
    pub data: Reply,
}

/// The subscriber side of publish/subscribe.
///
/// Channel and pattern names are plain text. Message payloads go through the codec of the
/// client, the same way [`SerializedClient::publish`] encoded them.
pub struct PubSub<'a, C: Client> {
    client: &'a mut SerializedClient<C>,
    channels: HashSet<String>,
    patterns: HashSet<String>,
    ignore_subscribe_messages: bool,
    // A subscription command was sent and the connection has not left subscribed mode since.
    active: bool,
}

impl<'a, C: Client> PubSub<'a, C> {
    pub(crate) fn new(client: &'a mut SerializedClient<C>) -> PubSub<'a, C> {
        PubSub {
            client,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            ignore_subscribe_messages: false,
            active: false,
        }
    }

    /// When set, [`PubSub::get_message`] swallows subscription acknowledgements and returns
    /// `None` in their place.
    pub fn ignore_subscribe_messages(mut self, ignore: bool) -> PubSub<'a, C> {
        self.ignore_subscribe_messages = ignore;
        self
    }

    pub fn channels(&self) -> &HashSet<String> {
        &self.channels
    }

    pub fn patterns(&self) -> &HashSet<String> {
        &self.patterns
    }

    pub fn subscribed(&self) -> bool {
        !self.channels.is_empty() || !self.patterns.is_empty()
    }

    pub async fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        if channels.is_empty() {
            return Err(Error::shape("SUBSCRIBE needs at least one channel"));
        }
        debug!(?channels, "subscribing");
        self.send(Cmd::new("SUBSCRIBE").args(channels.to_vec())).await?;
        self.channels.extend(channels.iter().map(|c| c.to_string()));
        Ok(())
    }

    pub async fn psubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        if patterns.is_empty() {
            return Err(Error::shape("PSUBSCRIBE needs at least one pattern"));
        }
        debug!(?patterns, "subscribing to patterns");
        self.send(Cmd::new("PSUBSCRIBE").args(patterns.to_vec())).await?;
        self.patterns.extend(patterns.iter().map(|p| p.to_string()));
        Ok(())
    }

    /// Unsubscribes from `channels`, or from every channel when empty.
    pub async fn unsubscribe(&mut self, channels: &[&str]) -> Result<()> {
        debug!(?channels, "unsubscribing");
        self.send(Cmd::new("UNSUBSCRIBE").args(channels.to_vec())).await?;
        if channels.is_empty() {
            self.channels.clear();
        } else {
            for channel in channels {
                self.channels.remove(*channel);
            }
        }
        Ok(())
    }

    /// Unsubscribes from `patterns`, or from every pattern when empty.
    pub async fn punsubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        debug!(?patterns, "unsubscribing from patterns");
        self.send(Cmd::new("PUNSUBSCRIBE").args(patterns.to_vec())).await?;
        if patterns.is_empty() {
            self.patterns.clear();
        } else {
            for pattern in patterns {
                self.patterns.remove(*pattern);
            }
        }
        Ok(())
    }

    /// Waits up to `timeout` for the next event, or indefinitely when `timeout` is `None`.
    /// Returns `None` when the timeout elapses first.
    pub async fn get_message(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        let frame = match self.client.client_mut().next_push(timeout).await? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let message = self.parse(frame)?;
        if self.ignore_subscribe_messages && message.kind.is_subscription() {
            return Ok(None);
        }
        Ok(Some(message))
    }

    /// Drops every subscription and waits until the server confirms, leaving the connection
    /// ready for regular commands. Messages still in flight are discarded.
    ///
    /// Dropping a subscriber without closing it defers the same cleanup to the next command
    /// issued through the client.
    pub async fn close(mut self) -> Result<()> {
        if self.active {
            release_subscriptions(self.client.client_mut()).await?;
        }
        self.active = false;
        self.channels.clear();
        self.patterns.clear();
        Ok(())
    }

    async fn send(&mut self, cmd: Cmd) -> Result<()> {
        self.client.release_pending().await?;
        self.active = true;
        self.client.client_mut().send(cmd).await
    }

    fn parse(&self, frame: Frame) -> Result<Message> {
        let parts = match frame {
            Frame::Array(parts) => parts,
            other => return Err(Error::unexpected("pushed array", other)),
        };

        let mut parts = parts.into_iter();
        let kind = match parts.next() {
            Some(frame) => text(frame)?
                .parse::<MessageKind>()
                .map_err(|e| Error::unexpected("message kind", e))?,
            None => return Err(Error::unexpected("message kind", "empty array")),
        };

        let pattern = match kind {
            MessageKind::Pmessage => Some(next_text(&mut parts)?),
            _ => None,
        };
        let channel = next_text(&mut parts)?;

        let data = match parts.next() {
            Some(Frame::Bulk(raw)) if !kind.is_subscription() => {
                Reply::Value(deserialize_value(self.client.codec(), &raw)?)
            }
            Some(Frame::Integer(count)) => Reply::Int(count),
            Some(other) => Reply::from(other),
            None => Reply::Nil,
        };

        // Acknowledgements of pattern subscriptions name the pattern in the channel slot.
        let (pattern, channel) = match kind {
            MessageKind::Psubscribe | MessageKind::Punsubscribe => (Some(channel.clone()), channel),
            _ => (pattern, channel),
        };

        Ok(Message {
            kind,
            pattern,
            channel,
            data,
        })
    }
}

impl<'a, C: Client> Drop for PubSub<'a, C> {
    fn drop(&mut self) {
        if self.active {
            self.client.defer_unsubscribe();
        }
    }
}

/// Unsubscribes from every channel and pattern, then discards pushed frames up to the last
/// acknowledgement. Pending messages and unread acknowledgements go with them.
pub(crate) async fn release_subscriptions<C: Client>(client: &mut C) -> Result<()> {
    client.send(Cmd::new("UNSUBSCRIBE")).await?;
    client.send(Cmd::new("PUNSUBSCRIBE")).await?;

    let mut discarded = 0usize;
    loop {
        match client.next_push(None).await? {
            Some(frame) if is_final_ack(&frame) => break,
            Some(_) => discarded += 1,
            None => return Err(Error::ConnectionClosed),
        }
    }
    debug!(discarded, "left subscribed mode");
    Ok(())
}

// `PUNSUBSCRIBE` is sent last, so its acknowledgement with no subscriptions left ends the drain.
fn is_final_ack(frame: &Frame) -> bool {
    match frame {
        Frame::Array(parts) => matches!(
            parts.as_slice(),
            [Frame::Bulk(kind), _, Frame::Integer(0)] if &kind[..] == b"punsubscribe"
        ),
        _ => false,
    }
}

fn next_text(parts: &mut impl Iterator<Item = Frame>) -> Result<String> {
    match parts.next() {
        Some(frame) => text(frame),
        None => Err(Error::unexpected("channel name", "short array")),
    }
}

fn text(frame: Frame) -> Result<String> {
    match frame {
        Frame::Bulk(raw) => {
            String::from_utf8(raw.to_vec()).map_err(|_| Error::unexpected("utf-8 text", raw))
        }
        Frame::Simple(s) => Ok(s),
        // Unsubscribing while subscribed to nothing names no channel.
        Frame::Null => Ok(String::new()),
        other => Err(Error::unexpected("text", other)),
    }
}
