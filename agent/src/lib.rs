//! Deterministic conversational checklist-building workflow engine.
//!
//! This crate turns a natural-language goal into a structured checklist
//! through a fixed phase machine, then tracks completion against it. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (phase transitions, coordination,
//!   memory application, tracking). No I/O, fully testable in isolation.
//! - **[`skills`]**: The closed capability registry: prompt templates, output
//!   schemas, and typed parsing for every skill.
//! - **[`io`]**: Side-effecting operations (config, capability backends,
//!   storage). Isolated so tests can script every external interaction.
//!
//! The orchestration module ([`run`]) coordinates core logic with the
//! capability providers to process one user turn per call.

pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod run;
pub mod skills;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
