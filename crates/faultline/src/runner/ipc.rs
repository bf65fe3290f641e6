//! The three IPC files shared with a controller.
//!
//! - `_state`: input buffer, written by the runner
//! - `_data`: output buffer, written by the controller
//! - `_flag`: zero-length sentinel; its existence is the only signal
//!
//! Buffers are plain files accessed with positioned reads and writes; the
//! controller maps them on its side.

use crate::codec::{encode_state_passthrough, VOTE_SIZE};
use crate::result::FaultlineResult;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "_state";
pub const DATA_FILE: &str = "_data";
pub const FLAG_FILE: &str = "_flag";

/// IPC files in one working directory
#[derive(Debug)]
pub struct IpcChannel {
    state_path: PathBuf,
    data_path: PathBuf,
    flag_path: PathBuf,
    state_len: usize,
}

impl IpcChannel {
    /// Create zero-filled buffers and clear any stale sentinel.
    ///
    /// The input buffer gets `state_len` bytes, the output buffer
    /// `VOTE_SIZE` bytes.
    pub fn create(workdir: &Path, state_len: usize) -> FaultlineResult<Self> {
        std::fs::create_dir_all(workdir)?;
        let channel = Self {
            state_path: workdir.join(STATE_FILE),
            data_path: workdir.join(DATA_FILE),
            flag_path: workdir.join(FLAG_FILE),
            state_len,
        };
        zero_fill(&channel.state_path, state_len)?;
        zero_fill(&channel.data_path, VOTE_SIZE)?;
        channel.clear_flag()?;
        tracing::debug!(
            state_bytes = state_len,
            data_bytes = VOTE_SIZE,
            "created IPC files"
        );
        Ok(channel)
    }

    #[must_use]
    pub const fn state_len(&self) -> usize {
        self.state_len
    }

    #[must_use]
    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    /// Whether the controller has signalled
    #[must_use]
    pub fn flag_exists(&self) -> bool {
        self.flag_path.exists()
    }

    /// Remove the sentinel, telling the controller to consume its input
    pub fn clear_flag(&self) -> FaultlineResult<()> {
        match std::fs::remove_file(&self.flag_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write one iteration's raw input into the input buffer and flush it
    pub fn write_state(&self, raw: &[u8]) -> FaultlineResult<()> {
        let buf = encode_state_passthrough(raw, self.state_len)?;
        let mut file = OpenOptions::new().write(true).open(&self.state_path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.sync_data()?;
        Ok(())
    }

    /// Read the controller's response buffer
    pub fn read_data(&self) -> FaultlineResult<Vec<u8>> {
        let mut file = File::open(&self.data_path)?;
        let mut buf = Vec::with_capacity(VOTE_SIZE);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Delete all three files, ignoring ones already gone
    pub fn remove(&self) {
        for path in [&self.state_path, &self.data_path, &self.flag_path] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove IPC file");
                }
            }
        }
    }
}

fn zero_fill(path: &Path, len: usize) -> FaultlineResult<()> {
    let mut file = File::create(path)?;
    file.write_all(&vec![0u8; len])?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sizes_buffers_and_clears_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FLAG_FILE), b"").unwrap();
        let channel = IpcChannel::create(dir.path(), 832_033).unwrap();
        assert!(!channel.flag_exists());
        let state_meta = std::fs::metadata(dir.path().join(STATE_FILE)).unwrap();
        let data_meta = std::fs::metadata(dir.path().join(DATA_FILE)).unwrap();
        assert_eq!(state_meta.len(), 832_033);
        assert_eq!(data_meta.len(), VOTE_SIZE as u64);
    }

    #[test]
    fn test_write_state_overwrites_previous_payload() {
        let dir = tempfile::tempdir().unwrap();
        let channel = IpcChannel::create(dir.path(), 8).unwrap();
        channel.write_state(&[9; 8]).unwrap();
        channel.write_state(&[1, 2]).unwrap();
        let bytes = std::fs::read(dir.path().join(STATE_FILE)).unwrap();
        assert_eq!(bytes, vec![1, 2, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_state_rejects_oversized_input() {
        let dir = tempfile::tempdir().unwrap();
        let channel = IpcChannel::create(dir.path(), 4).unwrap();
        assert!(channel.write_state(&[0; 5]).is_err());
    }

    #[test]
    fn test_flag_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let channel = IpcChannel::create(dir.path(), 4).unwrap();
        std::fs::write(channel.flag_path(), b"").unwrap();
        assert!(channel.flag_exists());
        channel.clear_flag().unwrap();
        channel.clear_flag().unwrap();
        assert!(!channel.flag_exists());

        channel.remove();
        assert!(!dir.path().join(STATE_FILE).exists());
        assert!(!dir.path().join(DATA_FILE).exists());
    }

    #[test]
    fn test_read_data() {
        let dir = tempfile::tempdir().unwrap();
        let channel = IpcChannel::create(dir.path(), 4).unwrap();
        let bytes = channel.read_data().unwrap();
        assert_eq!(bytes.len(), VOTE_SIZE);
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
