//! Typed Command Requests and the Cache Error Taxonomy
//!
//! This module defines the decoded form of every command the proxy
//! understands, plus the closed set of error kinds that flows between the
//! backend tiers, the orchestrator, and the connection layer.
//!
//! ## Command Surface
//!
//! | Verb(s)                                      | Request type      |
//! |----------------------------------------------|-------------------|
//! | `get`, `gets`, `gete`                        | [`GetRequest`]    |
//! | `set`, `add`, `replace`, `append`, `prepend` | [`SetRequest`]    |
//! | `delete`                                     | [`DeleteRequest`] |
//! | `touch`                                      | [`TouchRequest`]  |
//! | `gat`, `gats`                                | [`GatRequest`]    |
//! | `noop`, `version`, `quit`                    | [`NoopRequest`], [`VersionRequest`], [`QuitRequest`] |
//!
//! Keys are opaque byte sequences. This layer enforces no uniqueness:
//! duplicate keys in a multi-key get are each processed independently, in
//! request order.
//!
//! ## Error Taxonomy
//!
//! [`CacheError`] is deliberately a small, closed enum rather than a
//! free-form error channel. Every backend call resolves to exactly one of
//! these kinds, which lets the orchestrator's translation table be matched
//! exhaustively at compile time.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// The line terminator used by the memcached text protocol.
pub const CRLF: &[u8] = b"\r\n";

/// The closed set of cache outcomes a backend tier may report.
///
/// Handlers must never fail with anything outside this taxonomy; the
/// orchestrator relies on it being total when translating outcomes into
/// protocol responses.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The key is absent from the consulted tier.
    #[error("key not found")]
    KeyNotFound,

    /// A conditional store's precondition failed (e.g. replace on a
    /// missing key, add on an existing one).
    #[error("item not stored")]
    ItemNotStored,

    /// A backend or transport failure not attributable to the request.
    #[error("internal cache error")]
    Internal,

    /// The active orchestration variant does not implement this command.
    #[error("unsupported command")]
    UnsupportedCommand,
}

/// A value as stored in a cache tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored payload.
    pub data: Bytes,
    /// Client-supplied flags, stored verbatim and echoed on reads.
    pub flags: u32,
    /// Expiry in seconds as the client supplied it (0 = never).
    pub exptime: u32,
}

impl CacheEntry {
    /// Creates an entry with no flags and no expiry.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            flags: 0,
            exptime: 0,
        }
    }
}

/// A batch retrieval request (`get`, `gets`, `gete`).
///
/// `keys`, `opaques` and `quiet` are parallel arrays: entry `i` of each
/// describes key `i`. `noop_end` is set when the client pipelined its own
/// terminator after the batch, in which case the end-marker is suppressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRequest {
    /// Keys to look up, in the order responses must be rendered.
    pub keys: Vec<Bytes>,
    /// Per-key opaque correlation tokens.
    pub opaques: Vec<u32>,
    /// Per-key quiet flags (suppressed responses where the protocol allows).
    pub quiet: Vec<bool>,
    /// Skip the trailing end-marker; the client terminates the batch itself.
    pub noop_end: bool,
}

impl GetRequest {
    /// Builds a plain single-key lookup (no opaque, not quiet).
    pub fn single(key: impl Into<Bytes>) -> Self {
        Self {
            keys: vec![key.into()],
            opaques: vec![0],
            quiet: vec![false],
            noop_end: false,
        }
    }
}

/// A store request, shared by `set`, `add`, `replace`, `append`, `prepend`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetRequest {
    pub key: Bytes,
    pub data: Bytes,
    pub flags: u32,
    pub exptime: u32,
    pub opaque: u32,
    pub quiet: bool,
}

/// A `delete` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: Bytes,
    pub opaque: u32,
    pub quiet: bool,
}

/// A `touch` request (reset expiry without reading the value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchRequest {
    pub key: Bytes,
    pub exptime: u32,
    pub opaque: u32,
    pub quiet: bool,
}

/// A `gat` request (get-and-touch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatRequest {
    pub key: Bytes,
    pub exptime: u32,
    pub opaque: u32,
    pub quiet: bool,
}

/// A `noop` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopRequest {
    pub opaque: u32,
}

/// A `version` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionRequest {
    pub opaque: u32,
}

/// A `quit` request. The connection layer closes the socket after the
/// farewell line is flushed; the orchestrator never does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuitRequest {
    pub opaque: u32,
    pub quiet: bool,
}

/// A fully decoded command, ready for orchestrator dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(GetRequest),
    GetE(GetRequest),
    Gat(GatRequest),
    Set(SetRequest),
    Add(SetRequest),
    Replace(SetRequest),
    Append(SetRequest),
    Prepend(SetRequest),
    Delete(DeleteRequest),
    Touch(TouchRequest),
    Noop(NoopRequest),
    Version(VersionRequest),
    Quit(QuitRequest),
}

impl Command {
    /// The canonical verb, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get(_) => "get",
            Command::GetE(_) => "gete",
            Command::Gat(_) => "gat",
            Command::Set(_) => "set",
            Command::Add(_) => "add",
            Command::Replace(_) => "replace",
            Command::Append(_) => "append",
            Command::Prepend(_) => "prepend",
            Command::Delete(_) => "delete",
            Command::Touch(_) => "touch",
            Command::Noop(_) => "noop",
            Command::Version(_) => "version",
            Command::Quit(_) => "quit",
        }
    }

    /// True when the client asked for the response to be suppressed
    /// (`noreply`). Batch gets are never quiet as a whole.
    pub fn is_quiet(&self) -> bool {
        match self {
            Command::Set(r)
            | Command::Add(r)
            | Command::Replace(r)
            | Command::Append(r)
            | Command::Prepend(r) => r.quiet,
            Command::Delete(r) => r.quiet,
            Command::Touch(r) => r.quiet,
            Command::Gat(r) => r.quiet,
            Command::Quit(r) => r.quiet,
            Command::Get(_) | Command::GetE(_) | Command::Noop(_) | Command::Version(_) => false,
        }
    }

    /// The opaque token to correlate an error line with, where one exists.
    pub fn opaque(&self) -> u32 {
        match self {
            Command::Get(r) | Command::GetE(r) => r.opaques.first().copied().unwrap_or(0),
            Command::Gat(r) => r.opaque,
            Command::Set(r)
            | Command::Add(r)
            | Command::Replace(r)
            | Command::Append(r)
            | Command::Prepend(r) => r.opaque,
            Command::Delete(r) => r.opaque,
            Command::Touch(r) => r.opaque,
            Command::Noop(r) => r.opaque,
            Command::Version(r) => r.opaque,
            Command::Quit(r) => r.opaque,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
