pub mod metrics;
pub mod providers;
pub mod sources;
pub mod speech;
pub mod storage;

pub use sources::dedupe;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
