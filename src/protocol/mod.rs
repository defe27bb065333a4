//! Memcached Text Protocol Implementation
//!
//! This module owns both edges of the wire: decoding client bytes into
//! typed commands and encoding semantic outcomes back into protocol lines.
//! The orchestration core in [`crate::orca`] sits between the two and never
//! touches raw bytes itself.
//!
//! ## Modules
//!
//! - `types`: typed command requests and the closed cache-error taxonomy
//! - `parser`: incremental parser for the text protocol
//! - `responder`: the response-encoder capability and its text implementation
//!
//! ## Example
//!
//! ```
//! use stratakv::protocol::{parse, Command, Responder, TextResponder};
//!
//! // Decoding incoming data
//! let (cmd, consumed) = parse(b"get name\r\n").unwrap().unwrap();
//! assert!(matches!(cmd, Command::Get(_)));
//! assert_eq!(consumed, 10);
//!
//! // Encoding a response
//! let mut out = Vec::new();
//! let mut res = TextResponder::new(&mut out);
//! res.value(b"name", 0, 0, b"Ada").unwrap();
//! assert_eq!(out, b"VALUE name 0 3\r\nAda\r\n");
//! ```

pub mod parser;
pub mod responder;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse, ParseError, ParseResult};
pub use responder::{Responder, TextResponder};
pub use types::{
    CacheEntry, CacheError, Command, DeleteRequest, GatRequest, GetRequest, NoopRequest,
    QuitRequest, SetRequest, TouchRequest, VersionRequest,
};
