//! Postmortem dumps for inference responses that could not be decoded.
//!
//! **Activation**:
//! - `REPLENISH_DUMP_DIR` env var, when set, always wins
//! - otherwise the configured debug directory (`--debug-dir`, default under app data)
//!
//! **Output**: one `debug_json_<millis>_<suffix>.txt` per failure holding the decode
//! error, the full model response and the extracted payload.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

/// Env var overriding the dump directory.
pub const DUMP_DIR_ENV: &str = "REPLENISH_DUMP_DIR";

/// Resolve the dump directory and create it.
///
/// Returns `None` (with a warning) if directory creation fails. Never panics,
/// never blocks the pipeline.
pub fn resolve_dump_dir(configured: Option<&Path>) -> Option<PathBuf> {
    let dir = pick_dir(std::env::var(DUMP_DIR_ENV).ok(), configured)?;

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

fn pick_dir(env_value: Option<String>, configured: Option<&Path>) -> Option<PathBuf> {
    match env_value {
        Some(v) if !v.trim().is_empty() => Some(PathBuf::from(v)),
        _ => configured.map(Path::to_path_buf),
    }
}

/// Write a text artifact. Returns the path on success. Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) -> Option<PathBuf> {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => {
            tracing::debug!(
                path = %path.display(),
                size = text.len(),
                "Diagnostic dump: text written"
            );
            Some(path)
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write text"
            );
            None
        }
    }
}

/// Dump a structured-block decode failure for later inspection.
pub fn dump_parse_failure(dir: &Path, error: &str, response: &str, payload: &str) -> Option<PathBuf> {
    // Concurrent families can fail within the same millisecond.
    let suffix = Uuid::new_v4().simple().to_string();
    let filename = format!(
        "debug_json_{}_{}.txt",
        Utc::now().timestamp_millis(),
        &suffix[..8]
    );
    let text = format!(
        "Error: {error}\n\nFull Response:\n{response}\n\nExtracted JSON:\n{payload}"
    );
    dump_text(dir, &filename, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_overrides_configured_dir() {
        let picked = pick_dir(Some("/tmp/from-env".into()), Some(Path::new("/tmp/configured")));
        assert_eq!(picked, Some(PathBuf::from("/tmp/from-env")));
    }

    #[test]
    fn blank_env_value_falls_back() {
        let picked = pick_dir(Some("  ".into()), Some(Path::new("/tmp/configured")));
        assert_eq!(picked, Some(PathBuf::from("/tmp/configured")));
        assert_eq!(pick_dir(None, None), None);
    }

    #[test]
    fn dump_text_writes_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = dump_text(tmp.path(), "response.txt", "raw model output").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "raw model output");
    }

    #[test]
    fn dump_text_handles_write_failure_gracefully() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        assert!(dump_text(bad_dir, "test.txt", "data").is_none());
    }

    #[test]
    fn parse_failure_dump_holds_all_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let path = dump_parse_failure(tmp.path(), "expected value", "full text", "{broken").unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("debug_json_"));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Error: expected value"));
        assert!(content.contains("Full Response:\nfull text"));
        assert!(content.contains("Extracted JSON:\n{broken"));
    }
}
