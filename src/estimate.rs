//! GNU tar size prediction.
//!
//! Pure arithmetic over the tar wire format: how many bytes a single entry
//! will occupy once serialized, and how large the finished archive will be
//! given the sum of its entry sizes. The admission controller relies on
//! these numbers being exact so the finished container never overshoots
//! its size limit.

use std::fs;
use std::io;
use std::path::Path;

/// Length of one tar record. Headers, payload padding and the end-of-archive
/// marker are all counted in units of this.
pub const RECORD_LEN: u64 = 512;

/// Default output blocking: 20 records, the same default GNU tar uses.
pub const DEFAULT_BLOCK_LEN: u64 = 20 * RECORD_LEN;

/// Longest entry name that still fits the fixed header name field.
pub const NAME_FIELD_LEN: usize = 100;

#[inline]
fn records(len: u64) -> u64 {
    len.div_ceil(RECORD_LEN)
}

/// Predicted size of a single entry from its parts.
///
/// `name` is the entry name in its archive byte encoding; the header field
/// threshold is a byte count, not a character count. `payload_len` is
/// `Some` for regular files and `None` for directories, symlinks and other
/// entries that carry no payload.
///
/// Cost model:
/// - one 512-byte header, always;
/// - names longer than 100 bytes add a GNU longname extension: one extra
///   header record plus the name padded up to full records;
/// - the payload is padded up to full records.
pub fn entry_size(name: &[u8], payload_len: Option<u64>) -> u64 {
    let mut size = RECORD_LEN;
    if name.len() > NAME_FIELD_LEN {
        size += RECORD_LEN + RECORD_LEN * records(name.len() as u64);
    }
    if let Some(len) = payload_len {
        size += RECORD_LEN * records(len);
    }
    size
}

/// Predicted size of the entry for `path`, statting the filesystem.
///
/// Stats with `symlink_metadata` so symlinks are classified as links (which
/// is how the writer stores them) rather than as their targets. A missing
/// or unreadable path surfaces as the stat error.
pub fn predict_entry_size(path: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(path)?;
    let payload_len = meta.is_file().then(|| meta.len());
    Ok(entry_size(path.as_os_str().as_encoded_bytes(), payload_len))
}

/// Predicted size of the finished archive given the sum of its entry sizes.
///
/// The archive ends with two zero-filled records and is flushed in whole
/// blocks, so the total is padded up to the next multiple of `block_len`.
pub fn predict_archive_size(data_size: u64, block_len: u64) -> u64 {
    block_len * (data_size + 2 * RECORD_LEN).div_ceil(block_len)
}
