//! # EnvSense Fusion Engine (envsense-engine)
//!
//! Fuses visual scene labels, audio-event labels, activity updates and the
//! user's declared environment into rate-limited structured logs, and raises
//! a debounced alert when the automatically inferred environment disagrees
//! with the declaration for a sustained period.
//!
//! **Architecture:** producers write into [`SharedState`]; the
//! [`FusionEngine`] categorizes visual updates and runs the mismatch tracker
//! on each one; a [`Session`] drives the periodic sampler and producer loops.

pub mod categorizer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod mismatch;
pub mod producers;
pub mod record;
pub mod sampler;
pub mod session;
pub mod sinks;
pub mod state;

pub use engine::{EngineDeps, FusionEngine};
pub use error::{Error, Result};
pub use session::{Producers, Session};
pub use state::SharedState;
