//! Top-level handler and the manifest-driven `clasp` binary

pub mod app;

pub use app::{render_error, report_error, run, run_with_args};
