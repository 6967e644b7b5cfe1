//! Stuff core: entity model, row codec, and the watcher trait shared by
//! the store and its clients.

pub mod codec;
pub mod traits;
pub mod types;

pub use traits::Watcher;
pub use types::{
    Customer, CustomerDisplayTuple, CustomerStats, Location, VersionedThingy, CUSTOMER_TABLE,
    VERSIONED_THINGY_TABLE,
};
