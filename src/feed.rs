//! Batch feeder: drives many paths through admission.
//!
//! Admission happens as a side effect of pulling the [`Rejections`]
//! iterator; constructing it does nothing. Callers must drain it fully,
//! collecting the paths that did not make it into the archive.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::{AdmitError, TarSession};

/// When the feeder should stop attempting admission and start handing the
/// rest of the input straight back to the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedPolicy {
    /// Halt on the first file that would exceed the size limit. Leave off
    /// to keep scanning for smaller files that still fit.
    #[serde(default)]
    pub halt_on_size_limit: bool,
    /// Halt when the write queue drains faster than paths are admitted.
    #[serde(default)]
    pub halt_on_underrun: bool,
    /// Halt on the first path that fails to stat.
    #[serde(default)]
    pub halt_on_io_error: bool,
    /// Number of paths to process before the underrun heuristic arms.
    #[serde(default = "default_underrun_warmup")]
    pub underrun_warmup: usize,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            halt_on_size_limit: false,
            halt_on_underrun: false,
            halt_on_io_error: false,
            underrun_warmup: default_underrun_warmup(),
        }
    }
}

fn default_underrun_warmup() -> usize {
    10
}

/// Why a path was handed back instead of queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Admitting the file would exceed the archive size limit.
    SizeLimit,
    /// The write queue went empty mid-feed; the feeder cannot keep the
    /// writer busy. Advisory, raised only when the policy asks for it.
    Underrun,
    /// The path could not be statted or queued.
    Io(io::ErrorKind),
}

/// A path that was not admitted, with the reason.
#[derive(Debug)]
pub struct Rejection {
    pub path: PathBuf,
    pub reason: RejectReason,
}

/// Lazy stream of rejections produced while feeding paths into a session.
///
/// Once a halting condition fires, every remaining input path (starting
/// with the one that triggered it) is yielded untouched with the halting
/// reason, so the caller recovers an exact remaining worklist.
pub struct Rejections<'a, I> {
    session: &'a TarSession,
    paths: I,
    policy: FeedPolicy,
    halted: Option<RejectReason>,
    seen: usize,
}

impl<'a, I> Rejections<'a, I> {
    pub(crate) fn new(session: &'a TarSession, paths: I, policy: FeedPolicy) -> Self {
        Self {
            session,
            paths,
            policy,
            halted: None,
            seen: 0,
        }
    }
}

impl<I> Iterator for Rejections<'_, I>
where
    I: Iterator,
    I::Item: Into<PathBuf>,
{
    type Item = Rejection;

    fn next(&mut self) -> Option<Rejection> {
        loop {
            let path: PathBuf = self.paths.next()?.into();
            if path.as_os_str().is_empty() {
                continue;
            }
            self.seen += 1;

            if let Some(reason) = self.halted {
                self.session.metrics().path_rejected();
                return Some(Rejection { path, reason });
            }

            if self.policy.halt_on_underrun
                && self.seen > self.policy.underrun_warmup
                && self.session.queue_is_empty()
            {
                warn!(path = %path.display(), "write queue underrun, halting");
                self.halted = Some(RejectReason::Underrun);
                self.session.metrics().path_rejected();
                return Some(Rejection {
                    path,
                    reason: RejectReason::Underrun,
                });
            }

            match self.session.add_path(&path) {
                Ok(()) => continue,
                Err(AdmitError::SizeLimit) => {
                    if self.policy.halt_on_size_limit {
                        self.halted = Some(RejectReason::SizeLimit);
                    }
                    self.session.metrics().path_rejected();
                    return Some(Rejection {
                        path,
                        reason: RejectReason::SizeLimit,
                    });
                }
                Err(AdmitError::Io(e)) => {
                    warn!(path = %path.display(), error = %e, "path not admitted");
                    let reason = RejectReason::Io(e.kind());
                    if self.policy.halt_on_io_error {
                        self.halted = Some(reason);
                    }
                    self.session.metrics().path_rejected();
                    return Some(Rejection { path, reason });
                }
            }
        }
    }
}
