//! The tag storage engine.
//!
//! An [`Engine`] owns one bit-addressable store and everything placed in it:
//! the symbol table, the compound type registry, and the mappings that
//! replicate writes from one tag into others. All operations are
//! synchronous; [`SharedEngine`] puts one engine behind a single lock for
//! use from many threads.
//!
//! # Key Types
//!
//! - [`Engine`] owns tag lifecycle, bounds-checked reads and writes, and typed access
//! - [`AtomicOp`] names the read-modify-write operations of [`Engine::atomic_op`]
//! - [`TagAttributes`] reports read-only, mapping, and override state per tag
//! - [`EngineConfig`] sets store sizing, the hop limit, and byte order; loads from TOML
//! - [`EngineError`] covers every failure, classified by [`ErrorCategory`]
//! - [`SharedEngine`] is the thread-safe wrapper
//!
//! # Example
//!
//! ```
//! use tagdb_engine::{Engine, EngineConfig};
//! use tagdb_types::TypeCode;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let speed = engine.add_tag("speed", TypeCode::INT, 1).unwrap();
//! let mirror = engine.add_tag("mirror", TypeCode::INT, 1).unwrap();
//! engine.add_mapping(&speed, &mirror).unwrap();
//!
//! engine.write_typed(&speed, &1500i16.to_ne_bytes()).unwrap();
//! assert_eq!(engine.read_value(&mirror).unwrap(), 1500i16.to_ne_bytes());
//! ```

pub mod atomic;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod overrides;
pub mod shared;

pub use atomic::AtomicOp;
pub use config::EngineConfig;
pub use engine::{Engine, StoreStatus, TagAttributes, STATUS_TAG, STATUS_WORDS};
pub use error::{EngineError, EngineResult, ErrorCategory};
pub use shared::SharedEngine;
