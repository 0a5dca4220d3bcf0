//! Size-limited archive session.
//!
//! `TarSession` is the front end of the pipeline: it owns the predicted
//! size accumulator, decides whether each path still fits the configured
//! limit, and hands admitted paths to the background writer thread over
//! the write queue. The check-then-commit is done under a mutex so no two
//! admissions can interleave, even if several feeders share a session.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::estimate::{predict_archive_size, predict_entry_size};
use crate::feed::{FeedPolicy, Rejections};
use crate::observability::Metrics;
use crate::writer::{self, WriterMsg};

/// Why a path was refused admission.
#[derive(Debug, Error)]
pub enum AdmitError {
    /// The file would push the finished archive past its size limit. The
    /// accumulator is untouched; smaller files may still be admitted.
    #[error("file would push the archive past its size limit")]
    SizeLimit,

    /// The path could not be statted, or the writer has already shut down.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A tar archive being built under a size limit.
///
/// Dropping a session without calling [`close`](Self::close) disconnects
/// the queue; the worker drains what was admitted and finalizes the
/// archive, but errors from finalization are lost. Call `close` to observe
/// them.
pub struct TarSession {
    size_limit: Option<u64>,
    block_len: u64,
    /// Sum of predicted entry sizes for every admitted path.
    data_size: Mutex<u64>,
    tx: Sender<WriterMsg>,
    worker: Option<JoinHandle<io::Result<u64>>>,
    stopped: AtomicBool,
    metrics: Arc<Metrics>,
}

impl TarSession {
    /// Spawn the writer thread and return a session writing to `sink`.
    pub fn spawn<W: Write + Send + 'static>(sink: W, cfg: &ArchiveConfig) -> Self {
        let block_len = cfg.block_len.as_u64();
        let size_limit = cfg.size_limit.map(|s| s.as_u64());
        info!(?size_limit, block_len, "starting archive session");

        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = unbounded();
        let worker_metrics = Arc::clone(&metrics);
        let worker = thread::Builder::new()
            .name("tarcap-writer".into())
            .spawn(move || writer::run(rx, sink, block_len, worker_metrics))
            .expect("failed to spawn writer thread");

        Self {
            size_limit,
            block_len,
            data_size: Mutex::new(0),
            tx,
            worker: Some(worker),
            stopped: AtomicBool::new(false),
            metrics,
        }
    }

    /// Admit one path, or reject it without committing anything.
    ///
    /// On success the path's predicted size is added to the accumulator
    /// and the path is queued for the writer. On rejection the accumulator
    /// is exactly what it was before the attempt.
    pub fn add_path(&self, path: &Path) -> Result<(), AdmitError> {
        let entry_size = predict_entry_size(path)?;

        let mut data_size = self.data_size.lock().unwrap();
        let candidate = *data_size + entry_size;
        if let Some(limit) = self.size_limit {
            if predict_archive_size(candidate, self.block_len) > limit {
                return Err(AdmitError::SizeLimit);
            }
        }

        self.tx
            .send(WriterMsg::Entry(path.to_path_buf()))
            .map_err(|_| io::Error::other("archive writer has shut down"))?;
        *data_size = candidate;
        drop(data_size);

        self.metrics.path_admitted();
        debug!(path = %path.display(), entry_size, "path admitted");
        Ok(())
    }

    /// Feed many paths through admission, yielding every rejection.
    ///
    /// The returned iterator is lazy: constructing it processes nothing,
    /// and each pull admits (or rejects) exactly one input path. The caller
    /// must drain it for all paths to be processed.
    pub fn add_paths<I>(&self, paths: I, policy: FeedPolicy) -> Rejections<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Into<std::path::PathBuf>,
    {
        Rejections::new(self, paths.into_iter(), policy)
    }

    /// Predicted size of the finished archive if it were closed now.
    pub fn size(&self) -> u64 {
        predict_archive_size(*self.data_size.lock().unwrap(), self.block_len)
    }

    /// Sum of predicted entry sizes admitted so far.
    pub fn data_size(&self) -> u64 {
        *self.data_size.lock().unwrap()
    }

    /// Counters for this session.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// True if the write queue is currently drained. Racy by nature; used
    /// only as the underrun heuristic signal.
    pub(crate) fn queue_is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Tell the writer to finish after draining the queue. Idempotent; the
    /// sentinel is enqueued exactly once.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(WriterMsg::Stop);
        }
    }

    /// Stop accepting work, wait for the writer to drain and finalize, and
    /// return the number of bytes physically written.
    pub fn close(mut self) -> io::Result<u64> {
        self.stop();
        let worker = self.worker.take().expect("close called once");
        worker
            .join()
            .map_err(|_| io::Error::other("archive writer panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::predict_archive_size;
    use crate::humanize::ByteSize;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn config(size_limit: Option<u64>) -> ArchiveConfig {
        ArchiveConfig {
            size_limit: size_limit.map(ByteSize),
            block_len: ByteSize(10240),
        }
    }

    fn write_file(dir: &TempDir, name: &str, len: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![b'x'; len]).unwrap();
        path
    }

    #[test]
    fn admissions_accumulate_exact_predictions() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", 100);
        let b = write_file(&dir, "b.bin", 5000);

        let session = TarSession::spawn(Vec::new(), &config(None));
        session.add_path(&a).unwrap();
        session.add_path(&b).unwrap();

        let expected = crate::estimate::predict_entry_size(&a).unwrap()
            + crate::estimate::predict_entry_size(&b).unwrap();
        assert_eq!(session.data_size(), expected);
        assert_eq!(session.size(), predict_archive_size(expected, 10240));
        session.close().unwrap();
    }

    #[test]
    fn empty_file_fits_one_block_limit() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.bin", 0);

        let session = TarSession::spawn(Vec::new(), &config(Some(10240)));
        session.add_path(&path).unwrap();
        assert_eq!(session.size(), 10240);
        session.close().unwrap();
    }

    #[test]
    fn rejection_leaves_accumulator_untouched() {
        let dir = TempDir::new().unwrap();
        let small = write_file(&dir, "small.bin", 100);
        let big = write_file(&dir, "big.bin", 20_000);

        let session = TarSession::spawn(Vec::new(), &config(Some(10240)));
        session.add_path(&small).unwrap();
        let before = session.data_size();

        let err = session.add_path(&big).unwrap_err();
        assert!(matches!(err, AdmitError::SizeLimit));
        assert_eq!(session.data_size(), before);
        session.close().unwrap();
    }

    #[test]
    fn missing_path_is_an_io_rejection() {
        let dir = TempDir::new().unwrap();
        let session = TarSession::spawn(Vec::new(), &config(None));
        let err = session.add_path(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, AdmitError::Io(_)));
        assert_eq!(session.data_size(), 0);
        session.close().unwrap();
    }

    #[test]
    fn stop_is_idempotent() {
        let session = TarSession::spawn(Vec::new(), &config(None));
        session.stop();
        session.stop();
        assert_eq!(session.close().unwrap(), 10240);
    }

    #[test]
    fn written_archive_matches_predicted_size() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", 700);
        let b = write_file(&dir, "b.bin", 12_345);

        let out = dir.path().join("out.tar");
        let session = TarSession::spawn(fs::File::create(&out).unwrap(), &config(None));
        session.add_path(&a).unwrap();
        session.add_path(&b).unwrap();

        let predicted = session.size();
        let written = session.close().unwrap();
        assert_eq!(written, predicted);
        assert_eq!(fs::metadata(&out).unwrap().len(), predicted);

        let mut names = Vec::new();
        let mut archive = tar::Archive::new(fs::File::open(&out).unwrap());
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().into_owned());
            let mut sink = Vec::new();
            entry.read_to_end(&mut sink).unwrap();
        }
        assert_eq!(names.len(), 2);
    }
}
