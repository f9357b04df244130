//! Analysis of the agent's terminal output.
//!
//! This module turns the free-form final text of the reasoning loop
//! into a structured verdict.

pub mod verdict;

pub use verdict::parse_verdict;
