//! Persistence for media records and transcriptions.

pub mod media_store;

pub use media_store::{
    compute_file_hash, CreateOutcome, MediaEntry, MediaStore, StoreError, StoreSummary,
};
