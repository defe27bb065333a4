//! Command Orchestration, the Core of the Proxy
//!
//! An orca is the per-connection strategy object that decides, for each
//! decoded command, which cache tier(s) to consult, how to interpret the
//! backend outcome, and which response directives to emit. It is the single
//! place where cache-consistency policy, command support and protocol
//! error signaling meet.
//!
//! ## Shape
//!
//! ```text
//! Connection loop ──► Orca ──► Handler (l1)   primary / fast tier
//!                      │  └──► Handler (l2)   secondary / durable tier
//!                      └─────► Responder      response encoder
//! ```
//!
//! Each orchestration *variant* implements the [`Orca`] trait with a fixed
//! routing policy. [`L1Only`] is the variant shipped today: every supported
//! command is satisfied by the primary tier alone, and the durable tier is
//! held but never consulted. A write-through variant would implement the
//! same trait with a different decision table and be swapped in at
//! construction time; no other layer changes.
//!
//! ## Contract With the Caller
//!
//! Every `Orca` method renders exactly one response-directive sequence (or,
//! for error and quiet cases, explicitly none) and returns an error kind
//! consistent with what was rendered. The caller must not render anything
//! for a command itself; it uses the returned error only for logging, for
//! emitting the protocol failure line, and for connection-state decisions
//! such as closing after `quit`.

use crate::protocol::types::{
    CacheError, Command, DeleteRequest, GatRequest, GetRequest, NoopRequest, QuitRequest,
    SetRequest, TouchRequest, VersionRequest,
};
use thiserror::Error;

pub mod l1_only;

pub use l1_only::L1Only;

/// What an orchestrator call can come back with.
///
/// Semantic outcomes keep their [`CacheError`] kind so callers can match on
/// them; a transport failure from the response encoder is fatal for the
/// connection and passes through untouched.
#[derive(Debug, Error)]
pub enum OrcaError {
    /// A cache outcome to report to the client (or log and move on).
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The response encoder's writer failed; the connection is unusable.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl OrcaError {
    /// The semantic outcome, if this is one.
    pub fn cache_kind(&self) -> Option<CacheError> {
        match self {
            OrcaError::Cache(e) => Some(*e),
            OrcaError::Transport(_) => None,
        }
    }
}

/// One orchestration variant: the full command surface, one method per
/// command kind.
///
/// Methods take `&mut self` because rendering mutates the bound responder;
/// an orca holds no other state across calls.
pub trait Orca {
    fn get(&mut self, req: GetRequest) -> Result<(), OrcaError>;
    fn get_e(&mut self, req: GetRequest) -> Result<(), OrcaError>;
    fn gat(&mut self, req: GatRequest) -> Result<(), OrcaError>;
    fn set(&mut self, req: SetRequest) -> Result<(), OrcaError>;
    fn add(&mut self, req: SetRequest) -> Result<(), OrcaError>;
    fn replace(&mut self, req: SetRequest) -> Result<(), OrcaError>;
    fn append(&mut self, req: SetRequest) -> Result<(), OrcaError>;
    fn prepend(&mut self, req: SetRequest) -> Result<(), OrcaError>;
    fn delete(&mut self, req: DeleteRequest) -> Result<(), OrcaError>;
    fn touch(&mut self, req: TouchRequest) -> Result<(), OrcaError>;
    fn noop(&mut self, req: NoopRequest) -> Result<(), OrcaError>;
    fn version(&mut self, req: VersionRequest) -> Result<(), OrcaError>;
    fn quit(&mut self, req: QuitRequest) -> Result<(), OrcaError>;
}

/// Routes a decoded command to the matching orca method.
pub fn dispatch<O: Orca>(orca: &mut O, command: Command) -> Result<(), OrcaError> {
    match command {
        Command::Get(req) => orca.get(req),
        Command::GetE(req) => orca.get_e(req),
        Command::Gat(req) => orca.gat(req),
        Command::Set(req) => orca.set(req),
        Command::Add(req) => orca.add(req),
        Command::Replace(req) => orca.replace(req),
        Command::Append(req) => orca.append(req),
        Command::Prepend(req) => orca.prepend(req),
        Command::Delete(req) => orca.delete(req),
        Command::Touch(req) => orca.touch(req),
        Command::Noop(req) => orca.noop(req),
        Command::Version(req) => orca.version(req),
        Command::Quit(req) => orca.quit(req),
    }
}
