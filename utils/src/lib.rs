//! Shared infrastructure utilities for briefwatch.
//!
//! - **`state_file`**: Crash-safe persistence of small state files (temp + rename)

pub mod state_file;

pub use state_file::{FileSyncPolicy, ensure_private_dir, read_state_file, write_state_file};
