use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use casefile_types::{AuditLogEntry, AuditRecord};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chain::next_entry;
use crate::error::LedgerResult;
use crate::traits::{AuditReader, AuditWriter};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct FileState {
    file: File,
    /// Length of the valid prefix; every frame is appended at this offset.
    len: u64,
    entries: Vec<AuditLogEntry>,
}

/// Append-only audit ledger backed by a single file.
///
/// On-disk format, repeated per entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-serialized AuditLogEntry)]
/// ```
///
/// The file is never rewritten in place. On open it is read front to back;
/// entries failing the CRC check are skipped with a warning, and a torn
/// tail left by a crash is cut off so later appends stay readable. A frame
/// whose write or sync fails is cut off the same way before the error is
/// returned, so a failed append never resurfaces later.
pub struct FileAuditLedger {
    path: PathBuf,
    state: Mutex<FileState>,
}

struct Recovered {
    entries: Vec<AuditLogEntry>,
    valid_len: u64,
}

impl FileAuditLedger {
    /// Open (or create) the ledger file at `path` and recover its entries.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let recovered = recover(&path)?;
        let file_len = file.metadata()?.len();
        if recovered.valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len = recovered.valid_len,
                file_len,
                "truncating torn ledger tail"
            );
            file.set_len(recovered.valid_len)?;
        }

        info!(path = %path.display(), entries = recovered.entries.len(), "audit ledger opened");
        Ok(Self {
            path,
            state: Mutex::new(FileState {
                file,
                len: recovered.valid_len,
                entries: recovered.entries,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn recover(path: &Path) -> LedgerResult<Recovered> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut entries = Vec::new();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid ledger entry length; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated ledger entry; stopping recovery");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let next_offset = offset + HEADER_SIZE as u64 + length as u64;
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping entry");
        } else {
            match serde_json::from_slice::<AuditLogEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(offset, error = %e, "failed to decode ledger entry; skipping"),
            }
        }
        offset = next_offset;
    }

    debug!(recovered = entries.len(), "ledger recovery complete");
    Ok(Recovered {
        entries,
        valid_len: offset,
    })
}

fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

impl FileState {
    /// Write one whole frame and sync it, or leave the file as it was.
    fn append_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let written = self
            .file
            .write_all(frame)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(trunc) = self.file.set_len(self.len) {
                warn!(len = self.len, error = %trunc, "could not roll back failed ledger append");
            }
            return Err(e);
        }
        self.len += frame.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl AuditWriter for FileAuditLedger {
    async fn append(&self, record: AuditRecord) -> LedgerResult<AuditLogEntry> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let entry = next_entry(state.entries.last(), record, Utc::now())?;
        let payload = serde_json::to_vec(&entry)?;

        state.append_frame(&encode_frame(&payload))?;
        state.entries.push(entry.clone());

        debug!(seq = entry.seq, len = payload.len(), "ledger append");
        Ok(entry)
    }
}

#[async_trait]
impl AuditReader for FileAuditLedger {
    async fn entries(&self) -> LedgerResult<Vec<AuditLogEntry>> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.entries.clone())
    }

    async fn count(&self) -> LedgerResult<u64> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.entries.len() as u64)
    }
}

impl std::fmt::Debug for FileAuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditLedger")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::record;
    use crate::validation::ChainValidator;
    use casefile_types::AuditAction;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        {
            let ledger = FileAuditLedger::open(&path).unwrap();
            ledger.append(record(AuditAction::Create, "one")).await.unwrap();
            ledger.append(record(AuditAction::Update, "two")).await.unwrap();
        }

        let ledger = FileAuditLedger::open(&path).unwrap();
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].details, "two");

        let third = ledger.append(record(AuditAction::Delete, "three")).await.unwrap();
        assert_eq!(third.seq, 3);
        assert!(ChainValidator::validate(&ledger).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn torn_tail_is_dropped_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        {
            let ledger = FileAuditLedger::open(&path).unwrap();
            ledger.append(record(AuditAction::Create, "kept")).await.unwrap();
        }
        // Simulate a crash mid-write: a header promising more bytes than exist.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&500u32.to_le_bytes()).unwrap();
            f.write_all(&0u32.to_le_bytes()).unwrap();
            f.write_all(b"{\"partial").unwrap();
        }

        let ledger = FileAuditLedger::open(&path).unwrap();
        assert_eq!(ledger.count().await.unwrap(), 1);
        ledger.append(record(AuditAction::Update, "after crash")).await.unwrap();
        drop(ledger);

        let ledger = FileAuditLedger::open(&path).unwrap();
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].details, "after crash");
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(b"{}");
        assert_eq!(frame.len(), HEADER_SIZE + 2);
        assert_eq!(&frame[..4], &2u32.to_le_bytes());
        assert_eq!(&frame[4..8], &crc32fast::hash(b"{}").to_le_bytes());
        assert_eq!(&frame[8..], b"{}");
    }

    #[tokio::test]
    async fn tracked_length_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let ledger = FileAuditLedger::open(&path).unwrap();
        ledger.append(record(AuditAction::Create, "one")).await.unwrap();
        ledger.append(record(AuditAction::Update, "two")).await.unwrap();

        let len = ledger.state.lock().unwrap().len;
        assert_eq!(len, std::fs::metadata(&path).unwrap().len());
    }

    // /dev/full accepts the open and fails every write with ENOSPC.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_append_is_not_kept() {
        let ledger = FileAuditLedger::open("/dev/full").unwrap();
        assert!(ledger.append(record(AuditAction::Create, "lost")).await.is_err());
        assert!(ledger.append(record(AuditAction::Update, "also lost")).await.is_err());
        assert_eq!(ledger.count().await.unwrap(), 0);
        assert_eq!(ledger.state.lock().unwrap().len, 0);
    }

    #[tokio::test]
    async fn corrupt_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        {
            let ledger = FileAuditLedger::open(&path).unwrap();
            ledger.append(record(AuditAction::Create, "first")).await.unwrap();
            ledger.append(record(AuditAction::Update, "second")).await.unwrap();
        }

        // Flip one payload byte of the first entry.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let ledger = FileAuditLedger::open(&path).unwrap();
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details, "second");

        let report = ChainValidator::validate(&ledger).await.unwrap();
        assert!(!report.is_valid());
    }
}
