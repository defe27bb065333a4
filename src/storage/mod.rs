//! Storage Module: the Primary Tier
//!
//! The in-process cache that backs the proxy's primary ("fast") tier:
//! a sharded, thread-safe map with memcached entry semantics (client
//! flags, relative expiry) plus a background sweeper that reclaims
//! expired entries nobody asks for anymore.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use stratakv::storage::StorageEngine;
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//! engine.set(Bytes::from("name"), Bytes::from("Ada"), 0, 0);
//!
//! let entry = engine.get(b"name").unwrap();
//! assert_eq!(entry.data, Bytes::from("Ada"));
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
