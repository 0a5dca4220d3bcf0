//! File-list input and output.
//!
//! Path lists arrive as delimiter-separated records (newline by default,
//! NUL for robustness against names containing newlines) and rejected
//! paths leave the same way.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Lazy reader yielding one path per delimiter-separated record.
///
/// The final record may omit its trailing delimiter. Empty records are
/// yielded as empty paths; the feeder skips them.
pub struct PathReader<R> {
    inner: R,
    delimiter: u8,
}

impl<R: BufRead> PathReader<R> {
    pub fn new(inner: R, delimiter: u8) -> Self {
        Self { inner, delimiter }
    }
}

fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<R: BufRead> Iterator for PathReader<R> {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<io::Result<PathBuf>> {
        let mut record = Vec::new();
        match self.inner.read_until(self.delimiter, &mut record) {
            Ok(0) => None,
            Ok(_) => {
                if record.last() == Some(&self.delimiter) {
                    record.pop();
                }
                Some(Ok(bytes_to_path(record)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Destination for rejected paths.
///
/// The output file is only created once there is something to write, so a
/// run with no rejections leaves no file behind. Without a configured
/// path, rejections go to stderr.
pub enum RejectSink {
    File { path: PathBuf, file: Option<File> },
    Stderr,
}

impl RejectSink {
    pub fn file(path: PathBuf) -> Self {
        Self::File { path, file: None }
    }

    pub fn stderr() -> Self {
        Self::Stderr
    }

    pub fn write_path(&mut self, rejected: &Path, delimiter: u8) -> io::Result<()> {
        match self {
            Self::File { path, file } => {
                if file.is_none() {
                    *file = Some(File::create(&path)?);
                }
                let Some(file) = file else { unreachable!() };
                file.write_all(rejected.as_os_str().as_encoded_bytes())?;
                file.write_all(&[delimiter])
            }
            Self::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(rejected.as_os_str().as_encoded_bytes())?;
                err.write_all(&[delimiter])
            }
        }
    }

    pub fn finish(self) -> io::Result<()> {
        if let Self::File { file: Some(f), .. } = self {
            f.sync_all()?;
        }
        Ok(())
    }
}
