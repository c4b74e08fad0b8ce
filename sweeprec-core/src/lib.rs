//! # Sweeprec Core
//!
//! Platform-independent pieces of the sweep recording tools.
//!
//! This crate owns the logic that does not touch a device or write files:
//!
//! - [`params`] - run parameters and the validation gate in front of a run
//! - [`sampling`] - the frame sampling loop and its source/sink traits
//! - [`cancel`] - cooperative cancellation token polled by the loop
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  sweeprec-core (no device I/O, no async)                   │
//! │  ├── params/    RunArgs ──validate──► RunParameters        │
//! │  ├── sampling/  FrameSource ─► sample_session ─► FrameSink │
//! │  └── cancel/    CancelToken (Arc<AtomicBool>)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  sweeprec               │
//!                 │  (clients, recorder,    │
//!                 │   record-data,          │
//!                 │   test-throughput)      │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Example: Bounded sampling
//!
//! ```rust
//! use std::num::NonZeroU64;
//! use sweeprec_core::{sample_session, CancelToken, FrameSink, FrameSource, NoProgress};
//! use sweeprec_core::TerminationReason;
//!
//! struct Counter(u32);
//!
//! impl FrameSource for Counter {
//!     type Info = ();
//!     type Frame = u32;
//!     type Error = std::convert::Infallible;
//!
//!     fn get_next(&mut self) -> Result<((), u32), Self::Error> {
//!         self.0 += 1;
//!         Ok(((), self.0))
//!     }
//! }
//!
//! struct Collect(Vec<u32>);
//!
//! impl FrameSink<(), u32> for Collect {
//!     fn sample(&mut self, _info: (), frame: u32) {
//!         self.0.push(frame);
//!     }
//! }
//!
//! let mut sink = Collect(Vec::new());
//! let summary = sample_session(
//!     &mut Counter(0),
//!     &mut sink,
//!     &CancelToken::new(),
//!     NonZeroU64::new(3),
//!     &mut NoProgress,
//! )
//! .unwrap();
//!
//! assert_eq!(summary.reason, TerminationReason::FrameLimitReached);
//! assert_eq!(sink.0, vec![1, 2, 3]);
//! ```

pub mod cancel;
pub mod error;
pub mod params;
pub mod sampling;

pub use cancel::CancelToken;
pub use error::ValidationError;
pub use params::{Label, RecordFormat, RunArgs, RunParameters};
pub use sampling::{
    sample_session, ConsoleProgress, FrameSink, FrameSource, NoProgress, Progress,
    SessionSummary, TerminationReason,
};
