//! JSONL trace sink for the script module (§5): one line per query call,
//! `{seq, action, args, result_count}`, `seq` drawn from a process-wide
//! monotonic counter so concurrent callers never collide.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::errors::Result;

#[derive(Debug, Serialize)]
struct TraceLine<'a> {
    seq: u64,
    action: &'a str,
    args: serde_json::Value,
    result_count: usize,
}

pub struct Trace {
    sink: Option<PathBuf>,
    seq: AtomicU64,
    file: Mutex<()>,
}

impl Trace {
    pub fn new(sink: Option<PathBuf>) -> Self {
        Self {
            sink,
            seq: AtomicU64::new(0),
            file: Mutex::new(()),
        }
    }

    pub fn record(&self, action: &str, args: serde_json::Value, result_count: usize) -> Result<()> {
        let Some(path) = &self.sink else {
            return Ok(());
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let line = TraceLine {
            seq,
            action,
            args,
            result_count,
        };
        let _guard = self.file.lock().unwrap();
        append_line(path, &line)?;
        Ok(())
    }
}

fn append_line(path: &Path, line: &TraceLine) -> Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(line).expect("trace line serializes");
    writeln!(file, "{}", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sink_is_a_no_op() {
        let trace = Trace::new(None);
        trace.record("query_files", serde_json::json!({}), 3).unwrap();
    }

    #[test]
    fn records_increasing_seq_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let trace = Trace::new(Some(path.clone()));
        trace.record("query_symbols", serde_json::json!({"pkg": "a"}), 2).unwrap();
        trace.record("query_files", serde_json::json!({}), 0).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["seq"], 0);
        assert_eq!(second["seq"], 1);
        assert_eq!(second["action"], "query_files");
    }
}
