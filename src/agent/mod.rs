//! LLM agent modules for package analysis.
//!
//! This module provides the bounded tool-calling loop and the
//! reasoning backends it can drive.

pub mod agent_loop;
pub mod backend;
pub mod prompts;

pub use agent_loop::{AgentConfig, PackageAnalysisAgent};
pub use backend::{OllamaBackend, OllamaConfig};
