// src/session/mod.rs

//! Test-taking sessions: navigation, answer capture, countdown and scoring.

pub mod attempt;
pub mod registry;
pub mod scoring;

pub use attempt::{Attempt, Navigation, Phase, SessionError, SessionView};
pub use registry::{SessionRegistry, SubmissionReceipt, SubmitOutcome, SubmitTrigger};
pub use scoring::{Score, score};
