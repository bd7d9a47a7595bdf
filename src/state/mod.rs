//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RecordStatus`: the final outcome of one listing (ok, failed, cancelled)
//! - `RunState`: per-run counters plus the accumulated records

mod record_status;
mod run_state;

pub use record_status::RecordStatus;
pub use run_state::RunState;
