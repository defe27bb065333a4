//! Incremental Memcached Text-Protocol Parser
//!
//! Turns raw bytes from a client socket into typed [`Command`] requests.
//! The parser is incremental: it can be handed a partially received buffer
//! and will report how much more it needs.
//!
//! ## How the Parser Works
//!
//! [`parse`] reads from a buffer and returns either:
//! - `Ok(Some((command, consumed)))` - a complete command, `consumed` bytes used
//! - `Ok(None)` - the buffer holds only a partial command, read more
//! - `Err(ParseError)` - the input violates the protocol
//!
//! This design lets the connection loop:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse()` to attempt parsing
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//! 5. If error, report it and disconnect the client
//!
//! ## Grammar
//!
//! ```text
//! get|gets <key>+\r\n
//! gete <key>+\r\n
//! gat|gats <exptime> <key>\r\n
//! set|add|replace|append|prepend <key> <flags> <exptime> <bytes> [noreply]\r\n<data>\r\n
//! delete <key> [noreply]\r\n
//! touch <key> <exptime> [noreply]\r\n
//! noop\r\n
//! version\r\n
//! quit\r\n
//! ```

use crate::protocol::types::{
    Command, DeleteRequest, GatRequest, GetRequest, NoopRequest, QuitRequest, SetRequest,
    TouchRequest, VersionRequest, CRLF,
};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing the text protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The command line exceeds the maximum allowed length
    #[error("command line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },

    /// Empty command line
    #[error("empty command")]
    EmptyCommand,

    /// The verb is not one this proxy knows about
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments for a known verb
    #[error("wrong number of arguments for '{verb}': expected {expected}, got {got}")]
    BadArgumentCount {
        verb: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// A numeric field (flags, exptime, bytes) did not parse
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// A key is empty or exceeds the protocol's key size limit
    #[error("invalid key: {len} bytes (max: {max})")]
    InvalidKey { len: usize, max: usize },

    /// The declared value size exceeds the maximum allowed
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// The data block was not terminated with CRLF at the declared length
    #[error("bad data chunk")]
    BadDataChunk,

    /// Too many keys in one retrieval batch
    #[error("too many keys in batch: {count} (max: {max})")]
    TooManyKeys { count: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a single command line (excluding the data block).
pub const MAX_LINE_LENGTH: usize = 2048;

/// Maximum size of a stored value (8 MB).
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024;

/// Maximum key length, per the memcached protocol.
pub const MAX_KEY_SIZE: usize = 250;

/// Maximum number of keys in one multi-key get.
pub const MAX_BATCH_KEYS: usize = 64;

/// Attempts to parse one complete command from the buffer.
///
/// Returns the command and the number of bytes consumed, `Ok(None)` if the
/// buffer holds only a partial command, or an error if the input is
/// malformed.
pub fn parse(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => {
            if buf.len() > MAX_LINE_LENGTH {
                return Err(ParseError::LineTooLong {
                    len: buf.len(),
                    max: MAX_LINE_LENGTH,
                });
            }
            return Ok(None);
        }
    };

    if line_end > MAX_LINE_LENGTH {
        return Err(ParseError::LineTooLong {
            len: line_end,
            max: MAX_LINE_LENGTH,
        });
    }

    let line = &buf[..line_end];
    let consumed = line_end + CRLF.len();

    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());
    let verb = match tokens.next() {
        Some(v) => v,
        None => return Err(ParseError::EmptyCommand),
    };
    let args: Vec<&[u8]> = tokens.collect();

    match verb.to_ascii_lowercase().as_slice() {
        b"get" | b"gets" => parse_get(&args, "get").map(|r| Some((Command::Get(r), consumed))),
        b"gete" => parse_get(&args, "gete").map(|r| Some((Command::GetE(r), consumed))),
        b"gat" | b"gats" => parse_gat(&args).map(|r| Some((Command::Gat(r), consumed))),
        b"set" => parse_store(buf, &args, consumed, "set", Command::Set),
        b"add" => parse_store(buf, &args, consumed, "add", Command::Add),
        b"replace" => parse_store(buf, &args, consumed, "replace", Command::Replace),
        b"append" => parse_store(buf, &args, consumed, "append", Command::Append),
        b"prepend" => parse_store(buf, &args, consumed, "prepend", Command::Prepend),
        b"delete" => parse_delete(&args).map(|r| Some((Command::Delete(r), consumed))),
        b"touch" => parse_touch(&args).map(|r| Some((Command::Touch(r), consumed))),
        b"noop" => Ok(Some((Command::Noop(NoopRequest::default()), consumed))),
        b"version" => Ok(Some((Command::Version(VersionRequest::default()), consumed))),
        b"quit" => Ok(Some((
            Command::Quit(QuitRequest {
                opaque: 0,
                quiet: args.first() == Some(&&b"noreply"[..]),
            }),
            consumed,
        ))),
        _ => Err(ParseError::UnknownCommand(
            String::from_utf8_lossy(verb).into_owned(),
        )),
    }
}

/// `get <key>+` / `gets <key>+` / `gete <key>+`
fn parse_get(args: &[&[u8]], verb: &'static str) -> ParseResult<GetRequest> {
    if args.is_empty() {
        return Err(ParseError::BadArgumentCount {
            verb,
            expected: "1 or more keys",
            got: 0,
        });
    }
    if args.len() > MAX_BATCH_KEYS {
        return Err(ParseError::TooManyKeys {
            count: args.len(),
            max: MAX_BATCH_KEYS,
        });
    }

    let mut keys = Vec::with_capacity(args.len());
    for key in args {
        keys.push(parse_key(key)?);
    }

    let count = keys.len();
    Ok(GetRequest {
        keys,
        opaques: vec![0; count],
        quiet: vec![false; count],
        noop_end: false,
    })
}

/// `gat <exptime> <key>` / `gats <exptime> <key>`
fn parse_gat(args: &[&[u8]]) -> ParseResult<GatRequest> {
    if args.len() != 2 {
        return Err(ParseError::BadArgumentCount {
            verb: "gat",
            expected: "2 (exptime, key)",
            got: args.len(),
        });
    }

    Ok(GatRequest {
        exptime: parse_u32(args[0])?,
        key: parse_key(args[1])?,
        opaque: 0,
        quiet: false,
    })
}

/// `<verb> <key> <flags> <exptime> <bytes> [noreply]` plus its data block.
///
/// Storage commands span the command line and a `<bytes>`-long payload
/// terminated by CRLF, so this returns `Ok(None)` until the whole payload
/// has arrived.
fn parse_store(
    buf: &[u8],
    args: &[&[u8]],
    line_consumed: usize,
    verb: &'static str,
    build: fn(SetRequest) -> Command,
) -> ParseResult<Option<(Command, usize)>> {
    let quiet = match args.len() {
        4 => false,
        5 if args[4] == b"noreply" => true,
        got => {
            return Err(ParseError::BadArgumentCount {
                verb,
                expected: "4 or 5 (key, flags, exptime, bytes, [noreply])",
                got,
            })
        }
    };

    let key = parse_key(args[0])?;
    let flags = parse_u32(args[1])?;
    let exptime = parse_u32(args[2])?;
    let size = parse_usize(args[3])?;

    if size > MAX_VALUE_SIZE {
        return Err(ParseError::ValueTooLarge {
            size,
            max: MAX_VALUE_SIZE,
        });
    }

    let total = line_consumed + size + CRLF.len();
    if buf.len() < total {
        return Ok(None); // Data block still in flight
    }

    if &buf[line_consumed + size..total] != CRLF {
        return Err(ParseError::BadDataChunk);
    }

    let data = Bytes::copy_from_slice(&buf[line_consumed..line_consumed + size]);
    Ok(Some((
        build(SetRequest {
            key,
            data,
            flags,
            exptime,
            opaque: 0,
            quiet,
        }),
        total,
    )))
}

/// `delete <key> [noreply]`
fn parse_delete(args: &[&[u8]]) -> ParseResult<DeleteRequest> {
    let quiet = match args.len() {
        1 => false,
        2 if args[1] == b"noreply" => true,
        got => {
            return Err(ParseError::BadArgumentCount {
                verb: "delete",
                expected: "1 or 2 (key, [noreply])",
                got,
            })
        }
    };

    Ok(DeleteRequest {
        key: parse_key(args[0])?,
        opaque: 0,
        quiet,
    })
}

/// `touch <key> <exptime> [noreply]`
fn parse_touch(args: &[&[u8]]) -> ParseResult<TouchRequest> {
    let quiet = match args.len() {
        2 => false,
        3 if args[2] == b"noreply" => true,
        got => {
            return Err(ParseError::BadArgumentCount {
                verb: "touch",
                expected: "2 or 3 (key, exptime, [noreply])",
                got,
            })
        }
    };

    Ok(TouchRequest {
        key: parse_key(args[0])?,
        exptime: parse_u32(args[1])?,
        opaque: 0,
        quiet,
    })
}

/// Validates a key token and converts it to owned bytes.
fn parse_key(key: &[u8]) -> ParseResult<Bytes> {
    if key.is_empty() || key.len() > MAX_KEY_SIZE {
        return Err(ParseError::InvalidKey {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(Bytes::copy_from_slice(key))
}

fn parse_u32(token: &[u8]) -> ParseResult<u32> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::InvalidNumber(String::from_utf8_lossy(token).into_owned()))
}

fn parse_usize(token: &[u8]) -> ParseResult<usize> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::InvalidNumber(String::from_utf8_lossy(token).into_owned()))
}

/// Finds the position of the first CRLF in the buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &[u8]) -> (Command, usize) {
        parse(input).unwrap().expect("expected a complete command")
    }

    #[test]
    fn parse_single_get() {
        let (cmd, consumed) = parse_one(b"get key\r\n");
        assert_eq!(consumed, 9);
        match cmd {
            Command::Get(req) => {
                assert_eq!(req.keys, vec![Bytes::from("key")]);
                assert_eq!(req.quiet, vec![false]);
                assert!(!req.noop_end);
            }
            other => panic!("expected get, got {:?}", other),
        }
    }

    #[test]
    fn parse_multi_get() {
        let (cmd, _) = parse_one(b"gets a b c\r\n");
        match cmd {
            Command::Get(req) => {
                assert_eq!(req.keys.len(), 3);
                assert_eq!(req.keys[2], Bytes::from("c"));
                assert_eq!(req.opaques, vec![0, 0, 0]);
            }
            other => panic!("expected get, got {:?}", other),
        }
    }

    #[test]
    fn parse_set_with_data_block() {
        let (cmd, consumed) = parse_one(b"set key 7 60 5\r\nhello\r\n");
        assert_eq!(consumed, 23);
        match cmd {
            Command::Set(req) => {
                assert_eq!(req.key, Bytes::from("key"));
                assert_eq!(req.data, Bytes::from("hello"));
                assert_eq!(req.flags, 7);
                assert_eq!(req.exptime, 60);
                assert!(!req.quiet);
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn parse_set_noreply() {
        let (cmd, _) = parse_one(b"set key 0 0 2 noreply\r\nhi\r\n");
        match cmd {
            Command::Set(req) => assert!(req.quiet),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn partial_set_needs_more_data() {
        // Command line complete, data block still in flight.
        assert_eq!(parse(b"set key 0 0 5\r\nhel").unwrap(), None);
        // Command line itself incomplete.
        assert_eq!(parse(b"set key 0 0").unwrap(), None);
    }

    #[test]
    fn bad_data_chunk_is_rejected() {
        let err = parse(b"set key 0 0 5\r\nhelloXX").unwrap_err();
        assert_eq!(err, ParseError::BadDataChunk);
    }

    #[test]
    fn parse_replace_add_append_prepend() {
        assert!(matches!(
            parse_one(b"replace k 0 0 1\r\nx\r\n").0,
            Command::Replace(_)
        ));
        assert!(matches!(parse_one(b"add k 0 0 1\r\nx\r\n").0, Command::Add(_)));
        assert!(matches!(
            parse_one(b"append k 0 0 1\r\nx\r\n").0,
            Command::Append(_)
        ));
        assert!(matches!(
            parse_one(b"prepend k 0 0 1\r\nx\r\n").0,
            Command::Prepend(_)
        ));
    }

    #[test]
    fn parse_delete_and_touch() {
        let (cmd, _) = parse_one(b"delete key noreply\r\n");
        match cmd {
            Command::Delete(req) => {
                assert_eq!(req.key, Bytes::from("key"));
                assert!(req.quiet);
            }
            other => panic!("expected delete, got {:?}", other),
        }

        let (cmd, _) = parse_one(b"touch key 300\r\n");
        match cmd {
            Command::Touch(req) => {
                assert_eq!(req.exptime, 300);
                assert!(!req.quiet);
            }
            other => panic!("expected touch, got {:?}", other),
        }
    }

    #[test]
    fn parse_gat() {
        let (cmd, _) = parse_one(b"gat 120 key\r\n");
        match cmd {
            Command::Gat(req) => {
                assert_eq!(req.exptime, 120);
                assert_eq!(req.key, Bytes::from("key"));
            }
            other => panic!("expected gat, got {:?}", other),
        }
    }

    #[test]
    fn parse_server_commands() {
        assert!(matches!(parse_one(b"noop\r\n").0, Command::Noop(_)));
        assert!(matches!(parse_one(b"version\r\n").0, Command::Version(_)));
        assert!(matches!(parse_one(b"quit\r\n").0, Command::Quit(_)));
        assert!(matches!(parse_one(b"VERSION\r\n").0, Command::Version(_)));
    }

    #[test]
    fn unknown_command() {
        let err = parse(b"bogus key\r\n").unwrap_err();
        assert_eq!(err, ParseError::UnknownCommand("bogus".to_string()));
    }

    #[test]
    fn empty_command_line() {
        assert_eq!(parse(b"\r\n").unwrap_err(), ParseError::EmptyCommand);
    }

    #[test]
    fn get_without_keys() {
        assert!(matches!(
            parse(b"get\r\n").unwrap_err(),
            ParseError::BadArgumentCount { verb: "get", .. }
        ));
    }

    #[test]
    fn oversized_key_rejected() {
        let mut line = b"get ".to_vec();
        line.extend(std::iter::repeat(b'k').take(MAX_KEY_SIZE + 1));
        line.extend_from_slice(b"\r\n");
        assert!(matches!(
            parse(&line).unwrap_err(),
            ParseError::InvalidKey { .. }
        ));
    }

    #[test]
    fn oversized_value_rejected() {
        let line = format!("set key 0 0 {}\r\n", MAX_VALUE_SIZE + 1);
        assert!(matches!(
            parse(line.as_bytes()).unwrap_err(),
            ParseError::ValueTooLarge { .. }
        ));
    }

    #[test]
    fn unterminated_line_within_limit_is_incomplete() {
        assert_eq!(parse(b"get key").unwrap(), None);
    }

    #[test]
    fn runaway_line_is_rejected() {
        let line = vec![b'a'; MAX_LINE_LENGTH + 1];
        assert!(matches!(
            parse(&line).unwrap_err(),
            ParseError::LineTooLong { .. }
        ));
    }

    #[test]
    fn invalid_number_rejected() {
        assert!(matches!(
            parse(b"set key x 0 5\r\nhello\r\n").unwrap_err(),
            ParseError::InvalidNumber(_)
        ));
    }

    #[test]
    fn pipelined_commands_consume_exactly_one() {
        let input = b"get a\r\nget b\r\n";
        let (cmd, consumed) = parse_one(input);
        assert!(matches!(cmd, Command::Get(_)));
        assert_eq!(consumed, 7);
        let (cmd2, _) = parse_one(&input[consumed..]);
        match cmd2 {
            Command::Get(req) => assert_eq!(req.keys, vec![Bytes::from("b")]),
            other => panic!("expected get, got {:?}", other),
        }
    }
}
