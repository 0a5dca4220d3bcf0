//! Archive writer worker.
//!
//! A single background thread drains the write queue and serializes each
//! admitted path into the tar stream, one non-recursive entry at a time.
//! The worker never looks at the size limit; everything it receives already
//! passed admission. Shutdown is a sentinel message, so finalization is
//! ordered strictly after the last entry.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, error, info};

use crate::observability::Metrics;

pub(crate) enum WriterMsg {
    Entry(PathBuf),
    Stop,
}

/// Counts bytes as they pass through to the sink, so the worker can pad the
/// finished archive to a whole number of blocks and report the exact total.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Member names in a tar archive are relative; drop the root the way GNU
/// tar does when handed an absolute path. File content is still read from
/// the original path.
fn member_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Worker loop: block on the queue, append entries until the stop sentinel
/// arrives, then finalize the archive.
///
/// A disconnected queue is treated as a stop, so a session dropped without
/// an explicit shutdown still produces a well-formed archive. Returns the
/// number of bytes physically written.
pub(crate) fn run<W: Write>(
    rx: Receiver<WriterMsg>,
    sink: W,
    block_len: u64,
    metrics: Arc<Metrics>,
) -> io::Result<u64> {
    let mut tar = tar::Builder::new(CountingWriter::new(sink));
    tar.follow_symlinks(false);

    while let Ok(WriterMsg::Entry(path)) = rx.recv() {
        debug!(path = %path.display(), "writing entry");
        if let Err(e) = tar.append_path_with_name(&path, member_name(&path)) {
            error!(path = %path.display(), error = %e, "failed to write entry");
            return Err(e);
        }
        metrics.entry_written();
    }

    // Writes the two zero end-marker records and hands the sink back.
    let mut out = tar.into_inner()?;
    let tail = out.written % block_len;
    if tail != 0 {
        out.write_all(&vec![0u8; (block_len - tail) as usize])?;
    }
    out.flush()?;
    info!(bytes = out.written, "archive finalized");
    Ok(out.written)
}
