use std::sync::Arc;

use tracing::{debug, trace};

use crate::callbacks::ResponseCallbacks;
use crate::client::Client;
use crate::cmd::{Cmd, ReplyOptions, Request};
use crate::codec::Codec;
use crate::config::Config;
use crate::connection::Connection;
use crate::decoders::DECODED_COMMANDS;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::pipeline::Pipeline;
use crate::pubsub::{release_subscriptions, PubSub};
use crate::reply::{FromReply, KeyType, Reply};
use crate::value::Value;

/// A client that serializes every value it writes and deserializes every value it reads.
///
/// Keys, hash field names and channel names are passed as plain text. The reply decoders are
/// chained onto the response callbacks of the underlying client once, in [`SerializedClient::new`],
/// and the resulting table is never modified afterwards.
///
/// # Example
///
/// ```no_run
/// use serialized_redis::{CodecKind, Config, SerializedClient, Value};
///
/// # async fn run() -> serialized_redis::Result<()> {
/// let config = Config::builder().codec(CodecKind::Json).build();
/// let mut client = SerializedClient::connect(&config).await?;
///
/// client.set("answer", 42).await?;
/// assert_eq!(client.get("answer").await?, Some(Value::Int(42)));
/// # Ok(())
/// # }
/// ```
pub struct SerializedClient<C> {
    client: C,
    codec: Arc<dyn Codec>,
    callbacks: Arc<ResponseCallbacks>,
    // Set when a batch context was dropped while still watching keys.
    pending_unwatch: bool,
    // Set when a subscriber was dropped without leaving subscribed mode.
    pending_unsubscribe: bool,
}

impl SerializedClient<Connection> {
    /// Connects to the server in `config` and wraps the connection with the configured codec.
    pub async fn connect(config: &Config) -> Result<SerializedClient<Connection>> {
        let connection = Connection::connect(config).await?;
        Ok(SerializedClient::new(connection, config.codec.build()))
    }
}

impl<C: Client> SerializedClient<C> {
    pub fn new(client: C, codec: Arc<dyn Codec>) -> SerializedClient<C> {
        let mut callbacks = client.response_callbacks();
        for &(command, shape) in DECODED_COMMANDS {
            trace!(command, ?shape, codec = codec.name(), "chaining value decoder");
            callbacks = callbacks.chain(command, shape.callback(codec.clone()));
        }

        SerializedClient {
            client,
            codec,
            callbacks: Arc::new(callbacks),
            pending_unwatch: false,
            pending_unsubscribe: false,
        }
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn response_callbacks(&self) -> &ResponseCallbacks {
        &self.callbacks
    }

    pub fn get_ref(&self) -> &C {
        &self.client
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Sends `request` and returns its decoded reply. A server error reply becomes
    /// [`Error::Response`].
    pub async fn execute(&mut self, request: Request) -> Result<Reply> {
        self.release_pending().await?;

        let Request {
            cmd,
            callback,
            options,
        } = request;
        debug!(command = %callback, "dispatching command");

        let frame = self.client.request(cmd).await?;
        self.decode(&callback, &options, frame)?.into_result()
    }

    /// Sends `request` and converts its decoded reply into `T`.
    pub async fn query<T: FromReply>(&mut self, request: Request) -> Result<T> {
        T::from_reply(self.execute(request).await?)
    }

    /// Opens a batch context. With `transaction` set the queued commands run atomically inside
    /// `MULTI`/`EXEC`.
    pub fn pipeline(&mut self, transaction: bool) -> Pipeline<'_, C> {
        Pipeline::new(self, transaction)
    }

    /// Turns this client into a subscriber. The connection only accepts subscription commands
    /// until the returned subscriber is closed or dropped.
    pub fn pubsub(&mut self) -> PubSub<'_, C> {
        PubSub::new(self)
    }

    /// Stores `value` whole under `key`, replacing whatever was there, using the native type
    /// that matches its kind: maps as hashes, lists as lists, sets as sets and anything else as
    /// a string.
    ///
    /// Redis has no empty hash, list or set, so an empty collection could not be read back as
    /// one and is refused with `InvalidArgumentShape`. Use [`SerializedClient::delete`] to clear
    /// a key.
    pub async fn smart_set(&mut self, key: &str, value: Value) -> Result<bool> {
        let kind = value.kind();
        let empty = match &value {
            Value::Map(map) => map.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Set(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            return Err(Error::shape(format!("cannot store an empty {} whole", kind)));
        }

        let mut pipe = self.pipeline(true);
        pipe.delete(&[key])?;

        match value {
            Value::Map(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (field, value) in map {
                    match field {
                        Value::Str(field) => fields.push((field, value)),
                        other => {
                            return Err(Error::shape(format!(
                                "hash fields must be strings, got {}",
                                other.kind()
                            )))
                        }
                    }
                }
                pipe.hmset(key, fields)?;
            }
            Value::List(items) => {
                pipe.rpush(key, items)?;
            }
            Value::Set(items) => {
                pipe.sadd(key, items)?;
            }
            scalar => {
                pipe.set(key, scalar)?;
            }
        }

        debug!(key, kind, "storing whole value");
        pipe.execute().await?;
        Ok(true)
    }

    /// Loads a whole value stored by [`SerializedClient::smart_set`], dispatching on the type
    /// of the key. Sorted sets load as the list of their members. Returns `None` for a missing
    /// key.
    pub async fn smart_get(&mut self, key: &str) -> Result<Option<Value>> {
        let value = match self.key_type(key).await? {
            KeyType::None => return Ok(None),
            KeyType::String => self.get(key).await?.unwrap_or(Value::Nil),
            KeyType::List => Value::List(self.lmembers(key).await?),
            KeyType::Zset => Value::List(self.zmembers(key).await?),
            KeyType::Set => Value::Set(self.smembers(key).await?.into_iter().collect()),
            KeyType::Hash => Value::Map(
                self.hgetall(key)
                    .await?
                    .into_iter()
                    .map(|(field, value)| (Value::Str(field), value))
                    .collect(),
            ),
            KeyType::Stream => {
                return Err(Error::not_supported(format!(
                    "{} holds a stream, which has no whole value form",
                    key
                )))
            }
        };
        Ok(Some(value))
    }

    pub(crate) fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Runs the callback chain of `callback` on a raw reply.
    pub(crate) fn decode(
        &self,
        callback: &str,
        options: &ReplyOptions,
        frame: Frame,
    ) -> Result<Reply> {
        self.callbacks.apply(callback, Reply::from(frame), options)
    }

    pub(crate) fn defer_unwatch(&mut self) {
        self.pending_unwatch = true;
    }

    pub(crate) fn defer_unsubscribe(&mut self) {
        self.pending_unsubscribe = true;
    }

    /// Releases the subscriptions and watches left behind by dropped subscribers and batch
    /// contexts, so the next reply read belongs to the next command.
    pub(crate) async fn release_pending(&mut self) -> Result<()> {
        if self.pending_unsubscribe {
            self.pending_unsubscribe = false;
            debug!("releasing subscriptions");
            release_subscriptions(&mut self.client).await?;
        }
        if self.pending_unwatch {
            self.pending_unwatch = false;
            debug!("releasing watched keys");
            self.client.request(Cmd::new("UNWATCH")).await?;
        }
        Ok(())
    }
}
