//! In-Process Primary Tier
//!
//! Adapts the sharded [`StorageEngine`] to the [`Handler`] capability,
//! mapping engine outcomes onto the protocol error taxonomy:
//!
//! | Engine outcome                      | Error kind        |
//! |-------------------------------------|-------------------|
//! | miss on get / gat                   | `KeyNotFound`     |
//! | replace / delete / touch on a miss  | `KeyNotFound`     |
//! | add on an existing key              | `ItemNotStored`   |
//! | append / prepend on a miss          | `ItemNotStored`   |
//!
//! The engine itself cannot fail internally (it is an in-process map), so
//! this handler never reports `Internal`.

use crate::handlers::Handler;
use crate::protocol::types::{
    CacheEntry, CacheError, DeleteRequest, GatRequest, SetRequest, TouchRequest,
};
use crate::storage::StorageEngine;
use std::sync::Arc;

/// The in-process fast tier.
#[derive(Debug, Clone)]
pub struct MemoryHandler {
    engine: Arc<StorageEngine>,
}

impl MemoryHandler {
    /// Wraps a shared storage engine.
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }
}

impl Handler for MemoryHandler {
    fn get(&self, key: &[u8]) -> Result<CacheEntry, CacheError> {
        self.engine.get(key).ok_or(CacheError::KeyNotFound)
    }

    fn set(&self, req: &SetRequest) -> Result<(), CacheError> {
        self.engine
            .set(req.key.clone(), req.data.clone(), req.flags, req.exptime);
        Ok(())
    }

    fn add(&self, req: &SetRequest) -> Result<(), CacheError> {
        if self
            .engine
            .add(req.key.clone(), req.data.clone(), req.flags, req.exptime)
        {
            Ok(())
        } else {
            Err(CacheError::ItemNotStored)
        }
    }

    fn replace(&self, req: &SetRequest) -> Result<(), CacheError> {
        if self
            .engine
            .replace(req.key.clone(), req.data.clone(), req.flags, req.exptime)
        {
            Ok(())
        } else {
            Err(CacheError::KeyNotFound)
        }
    }

    fn append(&self, req: &SetRequest) -> Result<(), CacheError> {
        if self.engine.append(&req.key, &req.data) {
            Ok(())
        } else {
            Err(CacheError::ItemNotStored)
        }
    }

    fn prepend(&self, req: &SetRequest) -> Result<(), CacheError> {
        if self.engine.prepend(&req.key, &req.data) {
            Ok(())
        } else {
            Err(CacheError::ItemNotStored)
        }
    }

    fn delete(&self, req: &DeleteRequest) -> Result<(), CacheError> {
        if self.engine.delete(&req.key) {
            Ok(())
        } else {
            Err(CacheError::KeyNotFound)
        }
    }

    fn touch(&self, req: &TouchRequest) -> Result<(), CacheError> {
        if self.engine.touch(&req.key, req.exptime) {
            Ok(())
        } else {
            Err(CacheError::KeyNotFound)
        }
    }

    fn gat(&self, req: &GatRequest) -> Result<CacheEntry, CacheError> {
        self.engine
            .get_and_touch(&req.key, req.exptime)
            .ok_or(CacheError::KeyNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn handler() -> MemoryHandler {
        MemoryHandler::new(Arc::new(StorageEngine::new()))
    }

    fn set_req(key: &str, data: &str) -> SetRequest {
        SetRequest {
            key: Bytes::copy_from_slice(key.as_bytes()),
            data: Bytes::copy_from_slice(data.as_bytes()),
            ..Default::default()
        }
    }

    #[test]
    fn get_maps_miss_to_key_not_found() {
        let h = handler();
        assert_eq!(h.get(b"key"), Err(CacheError::KeyNotFound));

        h.set(&set_req("key", "foo")).unwrap();
        assert_eq!(h.get(b"key").unwrap().data, Bytes::from("foo"));
    }

    #[test]
    fn add_maps_conflict_to_not_stored() {
        let h = handler();
        h.add(&set_req("key", "v1")).unwrap();
        assert_eq!(h.add(&set_req("key", "v2")), Err(CacheError::ItemNotStored));
    }

    #[test]
    fn replace_maps_miss_to_key_not_found() {
        let h = handler();
        assert_eq!(
            h.replace(&set_req("key", "v")),
            Err(CacheError::KeyNotFound)
        );
        h.set(&set_req("key", "v")).unwrap();
        h.replace(&set_req("key", "v2")).unwrap();
        assert_eq!(h.get(b"key").unwrap().data, Bytes::from("v2"));
    }

    #[test]
    fn splices_map_miss_to_not_stored() {
        let h = handler();
        assert_eq!(
            h.append(&set_req("key", "x")),
            Err(CacheError::ItemNotStored)
        );
        assert_eq!(
            h.prepend(&set_req("key", "x")),
            Err(CacheError::ItemNotStored)
        );
    }

    #[test]
    fn delete_and_touch_map_miss_to_key_not_found() {
        let h = handler();
        assert_eq!(
            h.delete(&DeleteRequest {
                key: Bytes::from("key"),
                ..Default::default()
            }),
            Err(CacheError::KeyNotFound)
        );
        assert_eq!(
            h.touch(&TouchRequest {
                key: Bytes::from("key"),
                exptime: 60,
                ..Default::default()
            }),
            Err(CacheError::KeyNotFound)
        );
    }

    #[test]
    fn gat_reads_and_retimes() {
        let h = handler();
        let mut req = set_req("key", "v");
        req.exptime = 1;
        h.set(&req).unwrap();

        let entry = h
            .gat(&GatRequest {
                key: Bytes::from("key"),
                exptime: 600,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(entry.exptime, 600);
    }
}
