//! # StrataKV - A Tiered Caching Proxy for the Memcached Text Protocol
//!
//! StrataKV is a caching proxy written in Rust. It speaks the memcached
//! text protocol on the front and routes each command through a pluggable
//! orchestration layer that decides which cache tier serves it.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: Speaks the text protocol for get/set/delete
//!   and friends
//! - **Pluggable Orchestration**: Per-connection strategy objects decide
//!   tier routing; the l1-only variant ships today
//! - **High Performance**: Sharded in-process storage with RwLock for
//!   concurrent access
//! - **TTL Support**: Entries can have expiry times with automatic cleanup
//! - **Async I/O**: Built on Tokio for handling thousands of concurrent
//!   connections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              StrataKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│    Orca     │                  │
//! │  │ (Listener)  │    │  Handler    │    │  (L1Only)   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │         ┌─────────────┐              ┌────────┴────────┐                │
//! │         │    Text     │              ▼                 ▼                │
//! │         │   Parser /  │      ┌─────────────┐   ┌─────────────┐         │
//! │         │  Responder  │      │ Handler (l1)│   │ Handler (l2)│         │
//! │         └─────────────┘      └──────┬──────┘   │   (null)    │         │
//! │                                     │          └─────────────┘         │
//! │                                     ▼                                   │
//! │                     ┌──────────────────────────────────────────────┐   │
//! │                     │              StorageEngine                   │   │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │                     │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │                     │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use stratakv::connection::{handle_connection, ConnectionStats};
//! use stratakv::handlers::MemoryHandler;
//! use stratakv::storage::{start_expiry_sweeper, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create the primary-tier storage engine
//!     let engine = Arc::new(StorageEngine::new());
//!
//!     // Start the background expiry sweeper
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&engine));
//!
//!     // Create connection statistics
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     // Start listening for connections
//!     let listener = TcpListener::bind("127.0.0.1:11211").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let l1 = MemoryHandler::new(Arc::clone(&engine));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, l1, stats));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! With the l1-only orchestrator active:
//!
//! ### Served by the primary tier
//! - `get key [key ...]`
//! - `set key flags exptime bytes [noreply]`
//! - `replace key flags exptime bytes [noreply]`
//! - `delete key [noreply]`
//!
//! ### Answered without touching any tier
//! - `noop`
//! - `version`
//! - `quit`
//!
//! ### Recognized but unsupported by this variant
//! - `add`, `append`, `prepend`, `touch`, `gete`, `gat`
//!   (each answers `ERROR` and performs zero backend calls)
//!
//! ## Module Overview
//!
//! - [`protocol`]: text-protocol parser, typed requests, response encoder
//! - [`handlers`]: the cache-tier capability and its implementations
//! - [`orca`]: orchestration variants that route commands across tiers
//! - [`storage`]: thread-safe storage engine with TTL support
//! - [`connection`]: client connection management
//!
//! ## Design Highlights
//!
//! ### Synchronous Core, Async Edges
//!
//! Orchestrators and tier handles are plain synchronous code; responses are
//! rendered into an in-memory buffer. Only the connection layer and the
//! expiry sweeper are async. This keeps the routing logic trivially
//! testable with scripted tiers and golden byte comparisons.
//!
//! ### Thread Safety
//!
//! The storage engine uses a sharded design with 64 independent RwLocks.
//! This allows multiple threads to read/write different keys concurrently
//! without blocking each other.
//!
//! ### Lazy + Active Expiry
//!
//! Entries with TTL are expired in two ways:
//! 1. **Lazy**: When an entry is accessed, we check if it's expired
//! 2. **Active**: A background task periodically scans for expired entries
//!
//! This ensures memory is reclaimed even for entries that are never
//! accessed again.

pub mod connection;
pub mod handlers;
pub mod orca;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, ConnectionStats};
pub use handlers::{Handler, MemoryHandler, NullHandler};
pub use orca::{dispatch, L1Only, Orca, OrcaError};
pub use protocol::{CacheError, Command, ParseError, Responder, TextResponder};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port StrataKV listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host StrataKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
