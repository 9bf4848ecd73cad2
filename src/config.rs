//! Connection settings with defaults, a builder and environment overrides.

use std::env;

use crate::codec::CodecKind;
use crate::error::{Error, Result};

/// Settings used by [`SerializedClient::connect`](crate::SerializedClient::connect).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server address, `host:port`.
    pub addr: String,

    /// Codec applied to every stored value.
    pub codec: CodecKind,

    /// Largest frame accepted from the server (in bytes). Bigger frames fail the read instead
    /// of growing the buffer without bound.
    pub max_frame_size: usize,

    /// Initial capacity of the connection read buffer (in bytes).
    pub read_buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            codec: CodecKind::default(),
            max_frame_size: 512 * 1024 * 1024, // 512 MB
            read_buffer_capacity: 4 * 1024,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Defaults overridden by `SERIALIZED_REDIS_ADDR`, `SERIALIZED_REDIS_CODEC` and
    /// `MAX_FRAME_SIZE` when they are set.
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let mut config = Config::default();

        if let Some(addr) = lookup("SERIALIZED_REDIS_ADDR") {
            config.addr = addr;
        }
        if let Some(name) = lookup("SERIALIZED_REDIS_CODEC") {
            config.codec = CodecKind::parse(&name)
                .ok_or_else(|| Error::Config(format!("unknown codec {:?}", name)))?;
        }
        if let Some(size) = lookup("MAX_FRAME_SIZE") {
            config.max_frame_size = size
                .parse()
                .map_err(|_| Error::Config(format!("MAX_FRAME_SIZE must be a number, got {:?}", size)))?;
        }

        Ok(config)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.config.codec = codec;
        self
    }

    /// Set the max frame size (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the read buffer capacity (in bytes)
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::builder()
            .addr("10.0.0.1:7000")
            .codec(CodecKind::Bincode)
            .build();

        assert_eq!(config.addr, "10.0.0.1:7000");
        assert_eq!(config.codec, CodecKind::Bincode);
        assert_eq!(config.max_frame_size, Config::default().max_frame_size);
    }

    #[test]
    fn env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SERIALIZED_REDIS_CODEC", "MsgPack"),
            ("MAX_FRAME_SIZE", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.codec, CodecKind::Msgpack);
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.addr, "127.0.0.1:6379");
    }

    #[test]
    fn invalid_env_values() {
        let err = Config::from_lookup(lookup(&[("SERIALIZED_REDIS_CODEC", "pickle")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[("MAX_FRAME_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
