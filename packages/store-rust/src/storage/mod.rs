//! Layered storage for the stuff database.
//!
//! Provides the trait hierarchy and shared types for the three-layer
//! storage architecture:
//!
//! - **Layer 1** ([`StorageEngine`]): Low-level in-memory key-value storage
//! - **Layer 2** ([`RecordStore`]): Per-table orchestration with metadata,
//!   uniqueness checks, write serialization, and mutation observation
//! - **Layer 3** ([`MapDataStore`]): External persistence backend
//!
//! Additionally defines [`MutationObserver`] for reacting to committed
//! mutations and [`CompositeMutationObserver`] for fan-out to multiple observers.

pub mod datastores;
pub mod engine;
pub mod engines;
pub mod factory;
pub mod impls;
pub mod map_data_store;
pub mod mutation_observer;
pub mod record;
pub mod record_store;

pub use engine::*;
pub use factory::RecordStoreFactory;
pub use map_data_store::*;
pub use mutation_observer::*;
pub use record::*;
pub use record_store::*;
