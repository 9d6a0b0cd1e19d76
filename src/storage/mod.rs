mod blob;
mod counters;

pub use blob::{get_typed, put_typed, BlobStore, MemoryBlobStore, PgBlobStore};
pub use counters::{CounterStore, MemoryCounterStore, PgCounterStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer committed between our read and write; retry the
    /// whole read-modify-write.
    #[error("write conflict")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
