//! Shared infrastructure utilities for QuickProxy.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename) used by
//!   the file-backed settings store and the host's live proxy document.

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options,
    read_recovering, recover_bak_file,
};
