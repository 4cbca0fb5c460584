//! Session artifact persistence
//!
//! The capture list is snapshotted by copy under its lock before this
//! module runs, so file I/O happens lock-free. An empty capture produces
//! no file at all.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use pulse_core::{RecordedRequest, SessionDocument};
use tracing::info;

use crate::error::RecorderError;

/// Write the recorded session to `out_dir`, returning the artifact path,
/// or `None` when nothing was captured.
pub fn write_session(
    out_dir: &Path,
    records: &[RecordedRequest],
) -> Result<Option<PathBuf>, RecorderError> {
    if records.is_empty() {
        info!("no requests recorded; skipping artifact generation");
        return Ok(None);
    }

    fs::create_dir_all(out_dir)
        .map_err(|e| RecorderError::WriteArtifactFailed(format!("create {}: {e}", out_dir.display())))?;

    let filename = format!("recorded_{}.pulse.yaml", Local::now().format("%Y-%m-%d_%H%M%S"));
    let path = out_dir.join(filename);

    let document = SessionDocument::from_records(records);
    let yaml = document
        .emit()
        .map_err(|e| RecorderError::WriteArtifactFailed(e.to_string()))?;
    fs::write(&path, yaml)
        .map_err(|e| RecorderError::WriteArtifactFailed(format!("write {}: {e}", path.display())))?;

    info!(path = %path.display(), requests = records.len(), "session artifact written");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record() -> RecordedRequest {
        RecordedRequest {
            timestamp: Utc::now(),
            method: "GET".into(),
            url: "http://example.com/".into(),
            host: "example.com".into(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: String::new(),
            proto: "HTTP/1.1".into(),
            note: None,
        }
    }

    #[test]
    fn empty_capture_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_session(dir.path(), &[]).unwrap();
        assert!(path.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn artifact_file_is_timestamped_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_session(dir.path(), &[record()]).unwrap().unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("recorded_"));
        assert!(name.ends_with(".pulse.yaml"));

        let parsed: SessionDocument =
            serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.requests.len(), 1);
    }

    #[test]
    fn unwritable_directory_fails_with_artifact_error() {
        let err = write_session(Path::new("/proc/nonexistent/out"), &[record()]).unwrap_err();
        assert!(matches!(err, RecorderError::WriteArtifactFailed(_)));
    }
}
