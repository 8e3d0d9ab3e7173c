//! Content guardrails for user input and synthesized output

pub mod pattern_filter;

pub use pattern_filter::PatternContentFilter;
