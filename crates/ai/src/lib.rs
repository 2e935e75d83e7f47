//! `cifixer-ai`
//!
//! **Responsibility:** the analysis boundary.
//!
//! - [`AnalysisAgent`] is the seam to whatever performs the reasoning over an
//!   error log (an external process, or the offline [`RuleBasedAgent`]).
//! - [`ResponseInterpreter`] turns the agent's raw text into a [`Diagnosis`],
//!   falling back to a deterministic classifier when no structured output is
//!   usable. It never fails.
//!
//! This crate does not spawn processes, touch storage or change job state.
//!
//! [`Diagnosis`]: cifixer_core::Diagnosis

pub mod agent;
pub mod classifier;
pub mod interpreter;

pub use agent::{AgentError, AnalysisAgent, RuleBasedAgent};
pub use classifier::{classify, extract_line_number, ErrorCategory};
pub use interpreter::{extract_structured, ResponseInterpreter};
