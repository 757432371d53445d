//! Reports over produced artifacts.

pub mod summary;

pub use summary::{collect_artifacts, summary_row, write_summary, COLUMNS};
