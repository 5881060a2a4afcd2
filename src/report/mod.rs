//! Dashboard rendering.

pub mod generator;

pub use generator::{
    build_dashboard, generate_console_summary, generate_json_report, generate_markdown_report,
};
