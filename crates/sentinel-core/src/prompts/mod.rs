//! Prompt templates for the grammar / fluency report.

pub mod grammar_report;

pub use grammar_report::{grammar_report_prompt, grammar_report_schema, GRAMMAR_REPORT_TEMPLATE};
