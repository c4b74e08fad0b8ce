//! Session sampling loop.
//!
//! Pulls frames one at a time from a [`FrameSource`], hands each to a
//! [`FrameSink`] and reports progress, until the [`CancelToken`] is set or
//! the optional frame limit is reached.
//!
//! ```text
//!   ┌──────────────┐ cancelled? ──yes──► UserInterrupt
//!   │  iteration   │
//!   │              │ get_next() ──err──► propagate
//!   │              │ sink.sample()
//!   │              │ count += 1, progress
//!   └──────────────┘ count == limit? ──► FrameLimitReached
//! ```

use std::io::Write;
use std::num::NonZeroU64;

use crate::cancel::CancelToken;

/// Blocking, pull-based producer of `(metadata, frame)` pairs.
///
/// One call yields exactly one frame. Errors are transport failures and
/// are passed through the loop untouched.
pub trait FrameSource {
    type Info;
    type Frame;
    type Error;

    fn get_next(&mut self) -> Result<(Self::Info, Self::Frame), Self::Error>;
}

/// Consumer of frames, such as a recorder or a counter.
pub trait FrameSink<I, F> {
    fn sample(&mut self, info: I, frame: F);
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    UserInterrupt,
    FrameLimitReached,
}

/// Outcome of a finished loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames retrieved and forwarded to the sink
    pub frames: u64,
    pub reason: TerminationReason,
}

/// Receives the running frame count after every forwarded frame.
pub trait Progress {
    fn update(&mut self, count: u64, limit: Option<NonZeroU64>);

    /// Called once when the loop is done
    fn finish(&mut self) {}
}

/// Progress that reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _count: u64, _limit: Option<NonZeroU64>) {}
}

/// Single console line, redrawn in place with a carriage return.
///
/// Output errors are ignored; progress never affects the loop.
pub struct ConsoleProgress<W: Write> {
    out: W,
    verb: &'static str,
}

impl ConsoleProgress<std::io::Stdout> {
    pub fn stdout(verb: &'static str) -> Self {
        Self::new(std::io::stdout(), verb)
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W, verb: &'static str) -> Self {
        Self { out, verb }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Progress for ConsoleProgress<W> {
    fn update(&mut self, count: u64, limit: Option<NonZeroU64>) {
        let _ = match limit {
            Some(limit) => write!(self.out, "{} {:>4}/{}\r", self.verb, count, limit),
            None => write!(self.out, "{} {:>4}\r", self.verb, count),
        };
        let _ = self.out.flush();
    }

    fn finish(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}

/// Run the sampling loop until cancelled or `limit` frames were forwarded.
///
/// The cancel flag is checked before every retrieval, so a stop request is
/// honoured between frames only. A retrieval error ends the loop and is
/// returned as is; frames forwarded before it stay with the sink.
pub fn sample_session<S, K, P>(
    source: &mut S,
    sink: &mut K,
    cancel: &CancelToken,
    limit: Option<NonZeroU64>,
    progress: &mut P,
) -> Result<SessionSummary, S::Error>
where
    S: FrameSource + ?Sized,
    K: FrameSink<S::Info, S::Frame> + ?Sized,
    P: Progress + ?Sized,
{
    let mut count: u64 = 0;

    let reason = loop {
        if cancel.is_cancelled() {
            break TerminationReason::UserInterrupt;
        }

        let (info, frame) = source.get_next()?;
        sink.sample(info, frame);
        count += 1;
        progress.update(count, limit);

        if let Some(limit) = limit {
            if count >= limit.get() {
                break TerminationReason::FrameLimitReached;
            }
        }
    };
    progress.finish();

    Ok(SessionSummary {
        frames: count,
        reason,
    })
}
