use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::AppResult;
use crate::models::SessionRecord;

pub const RECEIVED_AT_FIELD: &str = "receivedAt";

/// UTC timestamp with microseconds and a literal `Z`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Append one submitted session to the log.
/// Never rewrites existing lines; the payload is stored as submitted plus
/// `receivedAt`.
pub fn append_session(path: &Path, mut payload: Map<String, Value>) -> AppResult<()> {
    payload.insert(
        RECEIVED_AT_FIELD.to_string(),
        Value::String(timestamp(Utc::now())),
    );
    let line = format!("{}\n", serde_json::to_string(&payload)?);
    append_line(path, &line)
}

fn append_line(path: &Path, line: &str) -> AppResult<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    // one write per record keeps concurrent appends from interleaving
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Read every session in file order. Missing file reads as empty.
pub fn read_sessions(path: &Path) -> Vec<SessionRecord> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "cannot open results log");
            }
            return Vec::new();
        }
    };

    let reader = std::io::BufReader::new(file);
    let mut sessions = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            // invalid UTF-8: the bytes of that line are already consumed
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::debug!(line = idx + 1, "skipping non UTF-8 results line");
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "stopped reading results log");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(session) => sessions.push(session),
            None => {
                tracing::debug!(line = idx + 1, "skipping malformed results line");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "results log has unreadable lines");
    }
    sessions
}

fn parse_line(line: &str) -> Option<SessionRecord> {
    let value: Value = serde_json::from_str(line).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(timestamp(at), "2024-05-01T09:30:00.000000Z");
    }

    #[test]
    fn test_append_stamps_received_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.ndjson");

        append_session(&path, object(json!({"user": "aiko", "total": 3}))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let stored: Value = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(stored["user"], "aiko");
        assert_eq!(stored["total"], 3);

        let received = stored[RECEIVED_AT_FIELD].as_str().unwrap();
        assert!(received.ends_with('Z'));
        assert!(!received.contains("+00:00"));
    }

    #[test]
    fn test_append_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("results.ndjson");

        append_session(&path, Map::new()).unwrap();

        assert!(path.exists());
        assert_eq!(read_sessions(&path).len(), 1);
    }

    #[test]
    fn test_log_append_only() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        append_session(&path, object(json!({"user": "first"}))).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        append_session(&path, object(json!({"user": "second", "note": "日本語"}))).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();

        assert!(after.starts_with(&before));
        let lines: Vec<&str> = after.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("日本語"));

        let sessions = read_sessions(&path);
        assert_eq!(sessions[0].user(), "first");
        assert_eq!(sessions[1].user(), "second");
    }

    #[test]
    fn test_append_preserves_key_order() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        append_session(&path, object(json!({"zeta": 1, "alpha": 2}))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let zeta = content.find("zeta").unwrap();
        let alpha = content.find("alpha").unwrap();
        let received = content.find(RECEIVED_AT_FIELD).unwrap();
        assert!(zeta < alpha && alpha < received);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_sessions(&dir.path().join("results.ndjson")).is_empty());
    }

    #[test]
    fn test_read_skips_corrupt_line() {
        let mut temp_file = NamedTempFile::new().unwrap();
        for i in 0..10 {
            if i == 4 {
                writeln!(temp_file, "{{\"user\": \"broken\", ").unwrap();
            } else {
                writeln!(temp_file, "{{\"user\": \"u{i}\"}}").unwrap();
            }
        }
        writeln!(temp_file).unwrap();

        let sessions = read_sessions(temp_file.path());

        assert_eq!(sessions.len(), 9);
        assert_eq!(sessions[0].user(), "u0");
        assert_eq!(sessions[4].user(), "u5");
    }

    #[test]
    fn test_read_directory_path_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handle = std::thread::spawn(move || read_sessions(&path));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !handle.is_finished() {
            assert!(std::time::Instant::now() < deadline, "read_sessions did not return");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(handle.join().unwrap().is_empty());
    }

    #[test]
    fn test_read_skips_invalid_utf8_line() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{{\"user\": \"before\"}}").unwrap();
        temp_file.write_all(b"{\"user\": \"\xff\xfe\"}\n").unwrap();
        writeln!(temp_file, "{{\"user\": \"after\"}}").unwrap();

        let sessions = read_sessions(temp_file.path());

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].user(), "before");
        assert_eq!(sessions[1].user(), "after");
    }

    #[test]
    fn test_read_skips_non_object_lines() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[]").unwrap();
        writeln!(temp_file, "42").unwrap();
        writeln!(temp_file, "{{\"user\": \"kept\", \"total\": \"oops\"}}").unwrap();

        let sessions = read_sessions(temp_file.path());

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user(), "kept");
        assert_eq!(sessions[0].total, None);
    }
}
