//! # Vellum Core
//!
//! Embeddable, schemaless document store that keeps its working set in
//! memory and persists changes through a write-ahead log plus snapshot.
//!
//! This crate provides:
//! - A live map of entities with insert / update / partial update / delete
//! - Secondary indexes over dotted field paths (ordered and text)
//! - A filter language with index-backed evaluation
//! - Full per-entity version history with time-travel reads
//! - Crash-safe persistence: JSON-lines WAL and atomic snapshots
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vellum_core::{DocumentStore, Entity};
//! use serde_json::json;
//!
//! let mut store = DocumentStore::open("my_store")?;
//! let fields = json!({"name": "Alice", "age": 30});
//! store.insert(Entity::from_value("u1", fields)?)?;
//!
//! let filter = vellum_core::parse("age >= 30 and name contains \"ali\"")?;
//! for entity in store.query(&filter) {
//!     println!("{}", entity.id());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dir;
pub mod entity;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod store;
pub mod value;
pub mod version;

pub use config::Config;
pub use entity::Entity;
pub use error::{Error, Result};
pub use index::IndexManager;
pub use query::{parse, parse_value, CmpOp, Filter, ValueExpr};
pub use store::DocumentStore;
pub use value::{Fields, Value};
pub use version::VersionLog;
