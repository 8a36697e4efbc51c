//! A generic variable-length, checksummed append-only record log.
//! Frames arbitrary byte records rather than fixed-size
//! pager pages: each record carries its own length and CRC32 rather than
//! relying on a shared page size. Used as the backing log for both the
//! store's write-ahead log and the notifier queues' durable logs.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;

use crate::error::{PointError, Result};

const LOG_MAGIC: &[u8; 8] = b"PTFLOG\0\0";
const LOG_VERSION: u16 = 1;
const LOG_HEADER_SIZE: usize = 16;

/// An append-only file of length-prefixed, checksummed byte records.
#[derive(Debug)]
pub struct RecordLog {
    file: File,
}

impl RecordLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut log = RecordLog { file };
        if log.file.metadata()?.len() == 0 {
            log.write_header()?;
        } else {
            log.validate_header()?;
        }
        Ok(log)
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = [0u8; LOG_HEADER_SIZE];
        header[..8].copy_from_slice(LOG_MAGIC);
        header[8..10].copy_from_slice(&LOG_VERSION.to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn validate_header(&mut self) -> Result<()> {
        let mut header = [0u8; LOG_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;
        if &header[..8] != LOG_MAGIC {
            return Err(PointError::Corruption("invalid record log magic".into()));
        }
        if u16::from_le_bytes([header[8], header[9]]) != LOG_VERSION {
            return Err(PointError::Corruption(
                "unsupported record log version".into(),
            ));
        }
        Ok(())
    }

    pub fn append(&mut self, body: &[u8]) -> Result<()> {
        let mut hasher = Hasher::new();
        hasher.update(body);
        let checksum = hasher.finalize();
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&(body.len() as u32).to_le_bytes())?;
        self.file.write_all(&checksum.to_le_bytes())?;
        self.file.write_all(body)?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Truncates the log back to just its header, discarding every
    /// record. Used after a compaction pass has rewritten the surviving
    /// records elsewhere.
    pub fn reset(&mut self) -> Result<()> {
        self.file.set_len(LOG_HEADER_SIZE as u64)?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Replays every record in file order, oldest first.
    pub fn replay<F: FnMut(&[u8]) -> Result<()>>(&mut self, mut apply: F) -> Result<u64> {
        self.file.seek(SeekFrom::Start(LOG_HEADER_SIZE as u64))?;
        let mut count = 0u64;
        loop {
            let mut len_buf = [0u8; 4];
            if !read_exact_or_eof(&mut self.file, &mut len_buf)? {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut checksum_buf = [0u8; 4];
            if !read_exact_or_eof(&mut self.file, &mut checksum_buf)? {
                return Err(PointError::Corruption(
                    "record log truncated before checksum".into(),
                ));
            }
            let expected = u32::from_le_bytes(checksum_buf);
            let mut body = vec![0u8; len];
            if !read_exact_or_eof(&mut self.file, &mut body)? {
                return Err(PointError::Corruption(
                    "record log truncated record body".into(),
                ));
            }
            let mut hasher = Hasher::new();
            hasher.update(&body);
            if hasher.finalize() != expected {
                return Err(PointError::Corruption("record log checksum mismatch".into()));
            }
            apply(&body)?;
            count += 1;
        }
        Ok(count)
    }
}

fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> Result<bool> {
    let mut read = 0usize;
    while read < buf.len() {
        let n = file.read(&mut buf[read..])?;
        if n == 0 {
            if read == 0 {
                return Ok(false);
            }
            return Err(PointError::Corruption("record log partial record".into()));
        }
        read += n;
    }
    Ok(true)
}

/// The sidecar path convention: `<base>.<ext>`.
pub fn sidecar_path(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn replays_appended_records_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        {
            let mut log = RecordLog::open(&path).unwrap();
            log.append(b"one").unwrap();
            log.append(b"two").unwrap();
            log.sync().unwrap();
        }
        let mut log = RecordLog::open(&path).unwrap();
        let mut seen = Vec::new();
        let count = log
            .replay(|body| {
                seen.push(body.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn detects_checksum_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        {
            let mut log = RecordLog::open(&path).unwrap();
            log.append(b"payload").unwrap();
        }
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::End(-1)).unwrap();
        file.write_all(b"X").unwrap();

        let mut log = RecordLog::open(&path).unwrap();
        let err = log.replay(|_| Ok(())).unwrap_err();
        assert!(matches!(err, PointError::Corruption(_)));
    }

    #[test]
    fn reset_discards_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        let mut log = RecordLog::open(&path).unwrap();
        log.append(b"gone").unwrap();
        log.reset().unwrap();
        let count = log.replay(|_| Ok(())).unwrap();
        assert_eq!(count, 0);
    }
}
