//! Placeholder Secondary Tier
//!
//! Orchestration variants are constructed with two tier handles even when
//! the active policy only ever consults one. [`NullHandler`] fills the
//! durable-tier slot in deployments that run l1-only: it satisfies the
//! capability contract but reports `Internal` on any call, so a routing
//! bug that reaches it surfaces loudly instead of silently serving
//! nothing.

use crate::handlers::Handler;
use crate::protocol::types::{
    CacheEntry, CacheError, DeleteRequest, GatRequest, SetRequest, TouchRequest,
};

/// A tier that is configured but not backed by anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl Handler for NullHandler {
    fn get(&self, _key: &[u8]) -> Result<CacheEntry, CacheError> {
        Err(CacheError::Internal)
    }

    fn set(&self, _req: &SetRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn add(&self, _req: &SetRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn replace(&self, _req: &SetRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn append(&self, _req: &SetRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn prepend(&self, _req: &SetRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn delete(&self, _req: &DeleteRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn touch(&self, _req: &TouchRequest) -> Result<(), CacheError> {
        Err(CacheError::Internal)
    }

    fn gat(&self, _req: &GatRequest) -> Result<CacheEntry, CacheError> {
        Err(CacheError::Internal)
    }
}
