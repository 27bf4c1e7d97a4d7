//! Local binary snapshot cache.
//!
//! # Responsibility
//! - Persist an arbitrary serializable engine value to one file, whole.
//! - Load it back, distinguishing "no snapshot" from "broken snapshot".
//!
//! # Invariants
//! - Writes go to `<path>.tmp`, are synced, then renamed over the target, so a
//!   reader sees either the previous file or the new one.
//! - A file whose header, length or digest does not check out is a
//!   `CacheError::Decode`, never an empty value.
//!
//! # File layout
//! `magic (4) | version u32 LE | body_len u64 LE | sha256(body) (32) | bincode body`

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"NCSN";
const FORMAT_VERSION: u32 = 1;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 4 + 4 + 8 + DIGEST_LEN;

#[derive(Debug)]
pub enum CacheError {
    /// No snapshot file exists at the path.
    Miss(PathBuf),
    /// The file exists but is not a valid snapshot.
    Decode { path: PathBuf, reason: String },
    Encode(String),
    Io(std::io::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss(_))
    }

    fn decode(path: &Path, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Miss(path) => write!(f, "no snapshot at `{}`", path.display()),
            Self::Decode { path, reason } => {
                write!(f, "corrupt snapshot at `{}`: {reason}", path.display())
            }
            Self::Encode(reason) => write!(f, "failed to encode snapshot: {reason}"),
            Self::Io(err) => write!(f, "snapshot io error: {err}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Snapshot file bound to one path.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), CacheError> {
        save_snapshot(&self.path, value)
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        load_snapshot(&self.path)
    }

    /// Removes the snapshot file. A missing file is not an error.
    pub fn invalidate(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(
                    "event=snapshot_invalidate module=cache status=ok path={}",
                    self.path.display()
                );
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Serializes `value` and atomically replaces the file at `path`.
pub fn save_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let body = bincode::serialize(value).map_err(|err| CacheError::Encode(err.to_string()))?;
    let digest = Sha256::digest(&body);

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(body.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&digest);
    bytes.extend_from_slice(&body);

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    debug!(
        "event=snapshot_save module=cache status=ok bytes={} path={}",
        bytes.len(),
        path.display()
    );
    Ok(())
}

/// Loads a snapshot written by [`save_snapshot`].
///
/// # Errors
/// - `CacheError::Miss` when the file does not exist.
/// - `CacheError::Decode` when the file is truncated, tampered with, or holds
///   a value of a different shape.
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(CacheError::Miss(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };

    let body = match verify_frame(path, &bytes) {
        Ok(body) => body,
        Err(err) => {
            warn!(
                "event=snapshot_load module=cache status=error error_code=snapshot_corrupt path={}",
                path.display()
            );
            return Err(err);
        }
    };

    bincode::deserialize(body).map_err(|err| CacheError::decode(path, err.to_string()))
}

fn verify_frame<'a>(path: &Path, bytes: &'a [u8]) -> Result<&'a [u8], CacheError> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheError::decode(
            path,
            format!("file is {} bytes, shorter than header", bytes.len()),
        ));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);

    if &header[0..4] != MAGIC {
        return Err(CacheError::decode(path, "magic mismatch"));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(CacheError::decode(
            path,
            format!("unsupported format version {version}"),
        ));
    }

    let mut body_len = [0u8; 8];
    body_len.copy_from_slice(&header[8..16]);
    let body_len = u64::from_le_bytes(body_len);
    if body_len != body.len() as u64 {
        return Err(CacheError::decode(
            path,
            format!("body is {} bytes, header says {body_len}", body.len()),
        ));
    }

    if Sha256::digest(body).as_slice() != &header[16..HEADER_LEN] {
        return Err(CacheError::decode(path, "digest mismatch"));
    }

    Ok(body)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::{tmp_path_for, verify_frame, CacheError, HEADER_LEN};
    use std::path::Path;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path_for(Path::new("/tmp/cache.bin")),
            Path::new("/tmp/cache.bin.tmp")
        );
    }

    #[test]
    fn verify_frame_rejects_short_input() {
        let err = verify_frame(Path::new("x"), &[0u8; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }
}
