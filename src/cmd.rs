use std::fmt;

use bytes::Bytes;

use crate::frame::Frame;

/// A command line as sent to the server: the command name followed by its arguments, every part
/// a binary safe bulk string.
#[derive(Clone, Debug, PartialEq)]
pub struct Cmd {
    parts: Vec<Bytes>,
}

impl Cmd {
    pub fn new(name: &str) -> Cmd {
        Cmd {
            parts: vec![Bytes::from(name.to_uppercase())],
        }
    }

    pub fn arg(mut self, arg: impl ToArg) -> Cmd {
        self.parts.push(arg.to_arg());
        self
    }

    pub fn args<T: ToArg>(mut self, args: impl IntoIterator<Item = T>) -> Cmd {
        self.parts.extend(args.into_iter().map(|arg| arg.to_arg()));
        self
    }

    /// Appends `arg` only when `condition` holds, used for flag arguments such as `WITHSCORES`.
    pub fn flag(self, condition: bool, arg: &str) -> Cmd {
        if condition {
            self.arg(arg)
        } else {
            self
        }
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.parts[0]).into_owned()
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn into_frame(self) -> Frame {
        Frame::Array(self.parts.into_iter().map(Frame::Bulk).collect())
    }
}

impl From<Cmd> for Frame {
    fn from(cmd: Cmd) -> Frame {
        cmd.into_frame()
    }
}

// Renders the command line the way pipeline errors report it: `LPUSH c 3`.
impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", String::from_utf8_lossy(part))?;
        }
        Ok(())
    }
}

/// Conversion into a single raw command argument.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for &[u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for &str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for &String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

macro_rules! display_arg {
    ($($ty:ty),*) => {
        $(
            impl ToArg for $ty {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

display_arg!(i64, u64, usize, u32);

impl ToArg for f64 {
    fn to_arg(&self) -> Bytes {
        Bytes::from(format_float(*self))
    }
}

/// Formats a score or coordinate the way the server parses it.
pub fn format_float(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// Per invocation switches that change the shape of a reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplyOptions {
    pub with_scores: bool,
    pub with_dist: bool,
    pub with_coord: bool,
    pub with_hash: bool,
    /// The result was stored under a destination key; the reply is a count.
    pub store: bool,
    /// Return unordered collections as a list in server order instead of a set.
    pub as_list: bool,
}

impl ReplyOptions {
    pub fn with_scores() -> ReplyOptions {
        ReplyOptions {
            with_scores: true,
            ..Default::default()
        }
    }

    pub fn store() -> ReplyOptions {
        ReplyOptions {
            store: true,
            ..Default::default()
        }
    }

    pub fn as_list() -> ReplyOptions {
        ReplyOptions {
            as_list: true,
            ..Default::default()
        }
    }
}

/// A command ready to be dispatched together with what is needed to post-process its reply.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub cmd: Cmd,
    /// Key into the response callback table, usually the command name.
    pub callback: String,
    pub options: ReplyOptions,
}

impl Request {
    pub fn new(cmd: Cmd) -> Request {
        let callback = cmd.name();
        Request {
            cmd,
            callback,
            options: ReplyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReplyOptions) -> Request {
        self.options = options;
        self
    }

    /// Uses `callback` as table key, for sub-commands such as `PUBSUB CHANNELS`.
    pub fn with_callback(mut self, callback: &str) -> Request {
        self.callback = callback.to_string();
        self
    }
}

impl From<Cmd> for Request {
    fn from(cmd: Cmd) -> Request {
        Request::new(cmd)
    }
}
