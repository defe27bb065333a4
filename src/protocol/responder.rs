//! Text Protocol Response Encoder
//!
//! The orchestrator never writes bytes itself; it describes what should be
//! rendered by calling one method per response directive on a [`Responder`].
//! This module provides that trait plus [`TextResponder`], the memcached
//! text-protocol implementation.
//!
//! ## Response Lines
//!
//! | Directive     | Wire form                                   |
//! |---------------|---------------------------------------------|
//! | value         | `VALUE <key> <flags> <len>\r\n<data>\r\n`   |
//! | stored        | `STORED\r\n`                                |
//! | not stored    | `NOT_STORED\r\n`                            |
//! | deleted       | `DELETED\r\n`                               |
//! | not found     | *(nothing; a miss is the absence of a VALUE line)*  |
//! | generic line  | `<text>\r\n`                                |
//! | version       | `VERSION <v>\r\n`                           |
//! | end           | `END\r\n`                                   |
//!
//! Quiet (`noreply`) requests suppress their confirmation lines. Opaque
//! tokens exist for protocol families that echo them; the text protocol
//! ignores them, but the directives carry them so an encoder for another
//! family can be dropped in behind the same trait.
//!
//! Every directive flushes the underlying writer so that a response is on
//! the wire before the orchestrator returns to the connection loop.

use crate::protocol::types::{CacheError, CRLF};
use std::io::{self, Write};

/// The response-encoder capability consumed by the orchestrator.
///
/// Each method is a pure side-effecting write; the only observable result
/// is a possible I/O failure, which the orchestrator propagates untouched
/// as a fatal transport condition.
pub trait Responder {
    /// Renders one value hit within a retrieval batch.
    fn value(&mut self, key: &[u8], opaque: u32, flags: u32, data: &[u8]) -> io::Result<()>;

    /// Confirms a successful store.
    fn stored(&mut self, opaque: u32, quiet: bool) -> io::Result<()>;

    /// Reports a failed conditional store.
    fn not_stored(&mut self, opaque: u32, quiet: bool) -> io::Result<()>;

    /// Confirms a successful delete.
    fn deleted(&mut self, opaque: u32, quiet: bool) -> io::Result<()>;

    /// Reports a miss. Silent in the text protocol.
    fn not_found(&mut self, opaque: u32, quiet: bool) -> io::Result<()>;

    /// Renders an arbitrary one-line response.
    fn line(&mut self, text: &str) -> io::Result<()>;

    /// Renders the server version string.
    fn version(&mut self, version: &str) -> io::Result<()>;

    /// Renders the end-of-batch marker.
    fn end(&mut self, opaque: u32) -> io::Result<()>;

    /// Renders the protocol failure line for a cache error. Called by the
    /// connection layer after the orchestrator returns an error, never by
    /// the orchestrator itself.
    fn error(&mut self, opaque: u32, quiet: bool, err: CacheError) -> io::Result<()>;
}

/// Memcached text-protocol responder over any [`io::Write`].
#[derive(Debug)]
pub struct TextResponder<W> {
    writer: W,
}

impl<W: Write> TextResponder<W> {
    /// Wraps a writer. The writer is flushed after every directive.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the responder, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(CRLF)?;
        self.writer.flush()
    }
}

impl<W: Write> Responder for TextResponder<W> {
    fn value(&mut self, key: &[u8], _opaque: u32, flags: u32, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(b"VALUE ")?;
        self.writer.write_all(key)?;
        write!(self.writer, " {} {}", flags, data.len())?;
        self.writer.write_all(CRLF)?;
        self.writer.write_all(data)?;
        self.writer.write_all(CRLF)?;
        self.writer.flush()
    }

    fn stored(&mut self, _opaque: u32, quiet: bool) -> io::Result<()> {
        if quiet {
            return Ok(());
        }
        self.write_line(b"STORED")
    }

    fn not_stored(&mut self, _opaque: u32, quiet: bool) -> io::Result<()> {
        if quiet {
            return Ok(());
        }
        self.write_line(b"NOT_STORED")
    }

    fn deleted(&mut self, _opaque: u32, quiet: bool) -> io::Result<()> {
        if quiet {
            return Ok(());
        }
        self.write_line(b"DELETED")
    }

    fn not_found(&mut self, _opaque: u32, _quiet: bool) -> io::Result<()> {
        // A text-protocol miss produces no line of its own.
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        self.write_line(text.as_bytes())
    }

    fn version(&mut self, version: &str) -> io::Result<()> {
        self.writer.write_all(b"VERSION ")?;
        self.writer.write_all(version.as_bytes())?;
        self.writer.write_all(CRLF)?;
        self.writer.flush()
    }

    fn end(&mut self, _opaque: u32) -> io::Result<()> {
        self.write_line(b"END")
    }

    fn error(&mut self, _opaque: u32, quiet: bool, err: CacheError) -> io::Result<()> {
        match err {
            // Misses and failed conditional stores honor noreply.
            CacheError::KeyNotFound => {
                if quiet {
                    Ok(())
                } else {
                    self.write_line(b"NOT_FOUND")
                }
            }
            CacheError::ItemNotStored => {
                if quiet {
                    Ok(())
                } else {
                    self.write_line(b"NOT_STORED")
                }
            }
            // Server-side failures are reported regardless of noreply.
            CacheError::UnsupportedCommand => self.write_line(b"ERROR"),
            CacheError::Internal => self.write_line(b"SERVER_ERROR internal cache error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F>(f: F) -> Vec<u8>
    where
        F: FnOnce(&mut TextResponder<&mut Vec<u8>>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        let mut res = TextResponder::new(&mut out);
        f(&mut res).unwrap();
        out
    }

    #[test]
    fn value_line() {
        let out = render(|r| r.value(b"key", 0, 0, b"foo"));
        assert_eq!(out, b"VALUE key 0 3\r\nfoo\r\n");
    }

    #[test]
    fn value_line_with_flags() {
        let out = render(|r| r.value(b"widget", 0, 42, b"abcdefgh"));
        assert_eq!(out, b"VALUE widget 42 8\r\nabcdefgh\r\n");
    }

    #[test]
    fn store_lines() {
        assert_eq!(render(|r| r.stored(0, false)), b"STORED\r\n");
        assert_eq!(render(|r| r.not_stored(0, false)), b"NOT_STORED\r\n");
        assert_eq!(render(|r| r.deleted(0, false)), b"DELETED\r\n");
        assert_eq!(render(|r| r.end(0)), b"END\r\n");
    }

    #[test]
    fn quiet_suppresses_confirmations() {
        assert!(render(|r| r.stored(0, true)).is_empty());
        assert!(render(|r| r.not_stored(0, true)).is_empty());
        assert!(render(|r| r.deleted(0, true)).is_empty());
    }

    #[test]
    fn miss_is_silent() {
        assert!(render(|r| r.not_found(0, false)).is_empty());
    }

    #[test]
    fn version_line() {
        assert_eq!(render(|r| r.version("1.2.3")), b"VERSION 1.2.3\r\n");
    }

    #[test]
    fn generic_line() {
        assert_eq!(render(|r| r.line("Bye")), b"Bye\r\n");
    }

    #[test]
    fn error_lines() {
        assert_eq!(
            render(|r| r.error(0, false, CacheError::KeyNotFound)),
            b"NOT_FOUND\r\n"
        );
        assert_eq!(
            render(|r| r.error(0, false, CacheError::ItemNotStored)),
            b"NOT_STORED\r\n"
        );
        assert_eq!(
            render(|r| r.error(0, false, CacheError::UnsupportedCommand)),
            b"ERROR\r\n"
        );
        assert_eq!(
            render(|r| r.error(0, false, CacheError::Internal)),
            b"SERVER_ERROR internal cache error\r\n"
        );
    }

    #[test]
    fn quiet_errors() {
        assert!(render(|r| r.error(0, true, CacheError::KeyNotFound)).is_empty());
        assert!(render(|r| r.error(0, true, CacheError::ItemNotStored)).is_empty());
        // Server errors are never suppressed.
        assert_eq!(
            render(|r| r.error(0, true, CacheError::Internal)),
            b"SERVER_ERROR internal cache error\r\n"
        );
    }
}
