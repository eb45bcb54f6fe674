// THEORY:
// This file is the entry point of the `pitch_vision` library crate. It exposes
// the `OverlayPipeline` together with its configuration and result types as the
// high-level interface of the positional analytics engine. The algorithmic units
// (`core_modules`) stay public for callers that want a single analytic, such as
// the zone binner alone, without scheduling or compositing.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::OverlayConfig;
pub use error::{OverlayError, OverlayResult};
pub use pipeline::{FrameOutcome, OverlayPipeline, RunSummary};
