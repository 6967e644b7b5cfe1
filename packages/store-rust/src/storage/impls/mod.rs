//! Concrete [`RecordStore`](super::RecordStore) implementations.

mod default_record_store;

pub use default_record_store::DefaultRecordStore;
