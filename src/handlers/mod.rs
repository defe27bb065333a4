//! Backend Handler Capability
//!
//! A [`Handler`] is one cache tier as the orchestrator sees it: one method
//! per command family, each resolving to a payload or an error kind from
//! the closed [`CacheError`] taxonomy. The orchestrator treats handlers as
//! opaque: it neither knows nor cares whether a tier is an in-process map
//! or a network-attached store.
//!
//! ## Contract
//!
//! - Every failure must be one of the four [`CacheError`] kinds; a handler
//!   must never surface anything else, so the orchestrator's translation
//!   table stays total.
//! - Handlers must be safe to call repeatedly with the same request
//!   (idempotent observation; mutations follow their own semantics).
//! - Handlers are shared across connection tasks and must be `Send + Sync`.
//!
//! ## Implementations
//!
//! - [`MemoryHandler`]: the in-process primary tier over [`crate::storage::StorageEngine`]
//! - [`NullHandler`]: stand-in for an unconfigured secondary tier

use crate::protocol::types::{
    CacheEntry, CacheError, DeleteRequest, GatRequest, SetRequest, TouchRequest,
};

pub mod memory;
pub mod null;

pub use memory::MemoryHandler;
pub use null::NullHandler;

/// One cache tier, as consumed by the orchestrator.
///
/// Retrieval methods take a bare key because the orchestrator iterates a
/// batch request key by key, in request order; everything else takes the
/// command's typed request.
pub trait Handler: Send + Sync {
    /// Looks up one key.
    fn get(&self, key: &[u8]) -> Result<CacheEntry, CacheError>;

    /// Looks up one key including its expiry metadata. Tiers that do not
    /// track per-entry metadata may report `UnsupportedCommand`.
    fn get_e(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        self.get(key)
    }

    /// Stores a value unconditionally.
    fn set(&self, req: &SetRequest) -> Result<(), CacheError>;

    /// Stores a value only if the key is absent.
    fn add(&self, req: &SetRequest) -> Result<(), CacheError>;

    /// Stores a value only if the key is present.
    fn replace(&self, req: &SetRequest) -> Result<(), CacheError>;

    /// Appends to an existing value.
    fn append(&self, req: &SetRequest) -> Result<(), CacheError>;

    /// Prepends to an existing value.
    fn prepend(&self, req: &SetRequest) -> Result<(), CacheError>;

    /// Removes a key.
    fn delete(&self, req: &DeleteRequest) -> Result<(), CacheError>;

    /// Resets a key's expiry.
    fn touch(&self, req: &TouchRequest) -> Result<(), CacheError>;

    /// Reads a key and resets its expiry in one step.
    fn gat(&self, req: &GatRequest) -> Result<CacheEntry, CacheError>;
}

// Allow handlers to be passed by shared reference or Arc without
// re-wrapping.
impl<H: Handler + ?Sized> Handler for &H {
    fn get(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        (**self).get(key)
    }
    fn get_e(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        (**self).get_e(key)
    }
    fn set(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).set(req)
    }
    fn add(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).add(req)
    }
    fn replace(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).replace(req)
    }
    fn append(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).append(req)
    }
    fn prepend(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).prepend(req)
    }
    fn delete(&self, req: &DeleteRequest) -> Result<(), CacheError> {
        (**self).delete(req)
    }
    fn touch(&self, req: &TouchRequest) -> Result<(), CacheError> {
        (**self).touch(req)
    }
    fn gat(&self, req: &GatRequest) -> Result<CacheEntry, CacheError> {
        (**self).gat(req)
    }
}

impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    fn get(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        (**self).get(key)
    }
    fn get_e(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        (**self).get_e(key)
    }
    fn set(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).set(req)
    }
    fn add(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).add(req)
    }
    fn replace(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).replace(req)
    }
    fn append(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).append(req)
    }
    fn prepend(&self, req: &SetRequest) -> Result<(), CacheError> {
        (**self).prepend(req)
    }
    fn delete(&self, req: &DeleteRequest) -> Result<(), CacheError> {
        (**self).delete(req)
    }
    fn touch(&self, req: &TouchRequest) -> Result<(), CacheError> {
        (**self).touch(req)
    }
    fn gat(&self, req: &GatRequest) -> Result<CacheEntry, CacheError> {
        (**self).gat(req)
    }
}
