//! L1-Only Orchestration Variant
//!
//! Routing policy: every supported command is satisfied by the primary
//! tier alone. The durable tier handle is held for constructor parity with
//! write-through variants but is never consulted. Commands outside this
//! variant's surface are rejected as unsupported before any tier is
//! touched; that is a configuration choice, not a backend capability gap.
//!
//! ## Decision Table
//!
//! | Command                         | Tier call | Success render | Error handling                      |
//! |---------------------------------|-----------|----------------|-------------------------------------|
//! | get                             | l1, per key | value × n, end | single-key miss returns `KeyNotFound`; batch misses are silent; anything else aborts |
//! | set                             | l1        | stored         | pass through, render nothing        |
//! | replace                         | l1        | stored         | miss → `ItemNotStored`; else pass through |
//! | delete                          | l1        | deleted        | pass through, render nothing        |
//! | add, append, prepend            | none      | (none)         | `UnsupportedCommand`                |
//! | touch, gete, gat                | none      | (none)         | `UnsupportedCommand`                |
//! | noop, version, quit             | none      | fixed line     | infallible                          |

use crate::handlers::Handler;
use crate::orca::{Orca, OrcaError};
use crate::protocol::responder::Responder;
use crate::protocol::types::{
    CacheError, DeleteRequest, GatRequest, GetRequest, NoopRequest, QuitRequest, SetRequest,
    TouchRequest, VersionRequest,
};
use tracing::{debug, trace};

/// Acknowledgment line rendered for `noop`.
const NOOP_LINE: &str = "Yep, it works.";

/// Farewell line rendered for `quit`.
const QUIT_LINE: &str = "Bye";

/// The l1-only orchestrator. Stateless per call; bound to its two tier
/// handles and one responder for the lifetime of a connection.
pub struct L1Only<H1, H2, R> {
    l1: H1,
    // Durable tier. This variant never consults it, but the slot is part of
    // the construction contract shared with write-through variants.
    #[allow(dead_code)]
    l2: H2,
    res: R,
}

impl<H1, H2, R> L1Only<H1, H2, R>
where
    H1: Handler,
    H2: Handler,
    R: Responder,
{
    /// Binds an orchestrator to its tiers and response encoder.
    pub fn new(l1: H1, l2: H2, res: R) -> Self {
        Self { l1, l2, res }
    }
}

impl<H1, H2, R> Orca for L1Only<H1, H2, R>
where
    H1: Handler,
    H2: Handler,
    R: Responder,
{
    /// Batch retrieval against the primary tier, strictly in key order.
    ///
    /// Hits render a value directive each (quiet never suppresses a found
    /// value). A miss is silent within a batch, except that a single-key
    /// batch reports `KeyNotFound` with nothing rendered at all, not even
    /// the end-marker. Any other tier failure aborts the batch immediately.
    fn get(&mut self, req: GetRequest) -> Result<(), OrcaError> {
        let single = req.keys.len() == 1;

        for (i, key) in req.keys.iter().enumerate() {
            match self.l1.get(key) {
                Ok(entry) => {
                    trace!(key = ?key, "l1 get hit");
                    self.res
                        .value(key, req.opaques[i], entry.flags, &entry.data)?;
                }
                Err(CacheError::KeyNotFound) if single => {
                    trace!(key = ?key, "l1 get miss (single key)");
                    return Err(CacheError::KeyNotFound.into());
                }
                Err(CacheError::KeyNotFound) => {
                    trace!(key = ?key, "l1 get miss (batch)");
                    self.res.not_found(req.opaques[i], req.quiet[i])?;
                }
                Err(e) => {
                    debug!(key = ?key, error = %e, "l1 get failed, aborting batch");
                    return Err(e.into());
                }
            }
        }

        if !req.noop_end {
            self.res.end(0)?;
        }
        Ok(())
    }

    fn get_e(&mut self, _req: GetRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    fn gat(&mut self, _req: GatRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    /// Unconditional store to the primary tier. Failures pass through
    /// untranslated with nothing rendered.
    fn set(&mut self, req: SetRequest) -> Result<(), OrcaError> {
        match self.l1.set(&req) {
            Ok(()) => {
                self.res.stored(req.opaque, req.quiet)?;
                Ok(())
            }
            Err(e) => {
                debug!(key = ?req.key, error = %e, "l1 set failed");
                Err(e.into())
            }
        }
    }

    fn add(&mut self, _req: SetRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    /// Conditional store: the key must already exist. A primary-tier miss
    /// is translated to `ItemNotStored` here, since replace semantics make
    /// a miss a failed store precondition, not a lookup miss.
    fn replace(&mut self, req: SetRequest) -> Result<(), OrcaError> {
        match self.l1.replace(&req) {
            Ok(()) => {
                self.res.stored(req.opaque, req.quiet)?;
                Ok(())
            }
            Err(CacheError::KeyNotFound) => {
                debug!(key = ?req.key, "l1 replace miss");
                Err(CacheError::ItemNotStored.into())
            }
            Err(e) => {
                debug!(key = ?req.key, error = %e, "l1 replace failed");
                Err(e.into())
            }
        }
    }

    fn append(&mut self, _req: SetRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    fn prepend(&mut self, _req: SetRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    /// Delete against the primary tier; the backend outcome passes through
    /// unchanged.
    fn delete(&mut self, req: DeleteRequest) -> Result<(), OrcaError> {
        match self.l1.delete(&req) {
            Ok(()) => {
                self.res.deleted(req.opaque, req.quiet)?;
                Ok(())
            }
            Err(e) => {
                debug!(key = ?req.key, error = %e, "l1 delete failed");
                Err(e.into())
            }
        }
    }

    fn touch(&mut self, _req: TouchRequest) -> Result<(), OrcaError> {
        Err(CacheError::UnsupportedCommand.into())
    }

    /// Backend-independent liveness check.
    fn noop(&mut self, _req: NoopRequest) -> Result<(), OrcaError> {
        self.res.line(NOOP_LINE)?;
        Ok(())
    }

    /// Renders the running build's version string.
    fn version(&mut self, _req: VersionRequest) -> Result<(), OrcaError> {
        self.res.version(crate::VERSION)?;
        Ok(())
    }

    /// Renders the farewell line. Closing the connection afterwards is the
    /// caller's job.
    fn quit(&mut self, _req: QuitRequest) -> Result<(), OrcaError> {
        self.res.line(QUIT_LINE)?;
        Ok(())
    }
}
