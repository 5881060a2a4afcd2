//! Generative model collaborators.
//!
//! This module provides the Gemini client and the three calls made through
//! it: the OSINT sweep, the SITREP and the spoken briefing.

pub mod gemini;
pub mod speech;
pub mod sweep;

pub use gemini::{GeminiClient, GeminiConfig};
pub use speech::synthesize_briefing;
pub use sweep::{generate_sitrep, run_sweep, AnalysisOutcome, FAILED_SITREP};
