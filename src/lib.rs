//! Reverse coverage library crate
//!
//! Measures coverage of a project, asks an LLM for unit tests targeting one
//! method, injects them, re-measures and reports the delta and token cost.
//! The binary is a thin wrapper over [`pipeline::Pipeline`].

pub mod config;
pub mod cost;
pub mod coverage;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod test_output;
pub mod toolchain;
pub mod util;
