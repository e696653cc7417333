//! Pure diff parsing (C2): name-status records and unified-diff text.
//!
//! Ported from `examples/original_source/pkg/refactorindex/diff_parse.go`;
//! no I/O, only byte/string parsing.

use crate::errors::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFileEntry {
    pub status: String,
    pub old_path: String,
    pub new_path: String,
}

impl DiffFileEntry {
    /// `new_path` when present, else `old_path` — matches the original's
    /// `PrimaryPath`.
    pub fn primary_path(&self) -> &str {
        if !self.new_path.is_empty() {
            &self.new_path
        } else {
            &self.old_path
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffLine {
    pub kind: char,
    pub old_line: Option<i64>,
    pub new_line: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffHunk {
    pub old_start: i64,
    pub old_lines: i64,
    pub new_start: i64,
    pub new_lines: i64,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePatch {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<DiffHunk>,
}

/// Strips a leading `a/`/`b/` prefix and maps `/dev/null` to empty, matching
/// the original's `normalizeDiffPath`.
fn normalize_diff_path(raw: &str) -> String {
    let value = raw.trim();
    if value == "/dev/null" {
        return String::new();
    }
    if let Some(stripped) = value.strip_prefix("a/").or_else(|| value.strip_prefix("b/")) {
        stripped.to_string()
    } else {
        value.to_string()
    }
}

/// Parses the NUL-separated output of `git diff --name-status -z`.
pub fn parse_name_status(data: &[u8]) -> Result<Vec<DiffFileEntry>> {
    let fields: Vec<&[u8]> = data.split(|&b| b == 0).collect();
    let mut entries = Vec::new();
    let mut i = 0;
    while i < fields.len() {
        let status = String::from_utf8_lossy(fields[i]).into_owned();
        i += 1;
        if status.is_empty() {
            break;
        }
        let status_type = &status[..1];
        match status_type {
            "R" | "C" => {
                if i + 1 >= fields.len() {
                    return Err(Error::parse("invalid name-status output for rename/copy"));
                }
                let old_path = String::from_utf8_lossy(fields[i]).into_owned();
                let new_path = String::from_utf8_lossy(fields[i + 1]).into_owned();
                i += 2;
                entries.push(DiffFileEntry {
                    status,
                    old_path: normalize_diff_path(&old_path),
                    new_path: normalize_diff_path(&new_path),
                });
            }
            "A" => {
                if i >= fields.len() {
                    return Err(Error::parse("invalid name-status output for add"));
                }
                let path = String::from_utf8_lossy(fields[i]).into_owned();
                i += 1;
                entries.push(DiffFileEntry {
                    status,
                    old_path: String::new(),
                    new_path: normalize_diff_path(&path),
                });
            }
            "D" => {
                if i >= fields.len() {
                    return Err(Error::parse("invalid name-status output for delete"));
                }
                let path = String::from_utf8_lossy(fields[i]).into_owned();
                i += 1;
                entries.push(DiffFileEntry {
                    status,
                    old_path: normalize_diff_path(&path),
                    new_path: String::new(),
                });
            }
            _ => {
                if i >= fields.len() {
                    return Err(Error::parse("invalid name-status output for path"));
                }
                let path = String::from_utf8_lossy(fields[i]).into_owned();
                i += 1;
                let normalized = normalize_diff_path(&path);
                entries.push(DiffFileEntry {
                    status,
                    old_path: normalized.clone(),
                    new_path: normalized,
                });
            }
        }
    }
    Ok(entries)
}

fn parse_range(part: &str, prefix: char) -> Result<(i64, i64)> {
    if !part.starts_with(prefix) {
        return Err(Error::parse("invalid range header"));
    }
    let part = &part[1..];
    let mut chunks = part.splitn(2, ',');
    let start: i64 = chunks
        .next()
        .unwrap()
        .parse()
        .map_err(|_| Error::parse("invalid hunk start"))?;
    let lines = match chunks.next() {
        Some("") | None => 1,
        Some(n) => n.parse().map_err(|_| Error::parse("invalid hunk length"))?,
    };
    Ok((start, lines))
}

fn parse_hunk_header(line: &str) -> Result<(i64, i64, i64, i64)> {
    let trimmed = line.trim();
    if !trimmed.starts_with("@@") {
        return Err(Error::parse("invalid hunk header"));
    }
    let trimmed = trimmed
        .trim_start_matches("@@")
        .trim_end_matches("@@")
        .trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(Error::parse("invalid hunk header fields"));
    }
    let (old_start, old_lines) = parse_range(parts[0], '-')?;
    let (new_start, new_lines) = parse_range(parts[1], '+')?;
    Ok((old_start, old_lines, new_start, new_lines))
}

/// Parses `git diff -U0 --no-color` output. Tracks the active file and hunk
/// across a streaming line scan; binary-diff markers yield a zero-hunk
/// `FilePatch` per §9's Open Question resolution.
pub fn parse_unified_diff(data: &[u8]) -> Result<Vec<FilePatch>> {
    let text = String::from_utf8_lossy(data);
    let mut patches: Vec<FilePatch> = Vec::new();
    let mut current: Option<usize> = None;
    let mut current_hunk: Option<usize> = None;
    let mut old_line: i64 = 0;
    let mut new_line: i64 = 0;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() >= 2 {
                let old_path = normalize_diff_path(parts[0]);
                let new_path = normalize_diff_path(parts[1]);
                patches.push(FilePatch {
                    old_path,
                    new_path,
                    hunks: Vec::new(),
                });
                current = Some(patches.len() - 1);
                current_hunk = None;
            }
            continue;
        }
        if line.starts_with("@@") {
            let Some(cur) = current else { continue };
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            patches[cur].hunks.push(DiffHunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                lines: Vec::new(),
            });
            current_hunk = Some(patches[cur].hunks.len() - 1);
            old_line = old_start;
            new_line = new_start;
            continue;
        }
        let (Some(cur), Some(hunk)) = (current, current_hunk) else {
            continue;
        };
        if line.is_empty() {
            continue;
        }
        match line.chars().next().unwrap() {
            '+' => {
                if line.starts_with("+++") {
                    continue;
                }
                let text = line.strip_prefix('+').unwrap_or(line).to_string();
                let line_no = new_line;
                new_line += 1;
                patches[cur].hunks[hunk].lines.push(DiffLine {
                    kind: '+',
                    old_line: None,
                    new_line: Some(line_no),
                    text,
                });
            }
            '-' => {
                if line.starts_with("---") {
                    continue;
                }
                let text = line.strip_prefix('-').unwrap_or(line).to_string();
                let line_no = old_line;
                old_line += 1;
                patches[cur].hunks[hunk].lines.push(DiffLine {
                    kind: '-',
                    old_line: Some(line_no),
                    new_line: None,
                    text,
                });
            }
            ' ' => {
                let text = line.strip_prefix(' ').unwrap_or(line).to_string();
                let old_no = old_line;
                let new_no = new_line;
                old_line += 1;
                new_line += 1;
                patches[cur].hunks[hunk].lines.push(DiffLine {
                    kind: ' ',
                    old_line: Some(old_no),
                    new_line: Some(new_no),
                    text,
                });
            }
            '\\' => continue,
            _ => continue,
        }
    }
    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_delete_modify_rename() {
        let data = b"A\0new.txt\0D\0gone.txt\0M\0changed.txt\0R100\0old.txt\0renamed.txt\0";
        let entries = parse_name_status(data).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].status, "A");
        assert_eq!(entries[0].primary_path(), "new.txt");
        assert_eq!(entries[3].status, "R100");
        assert_eq!(entries[3].old_path, "old.txt");
        assert_eq!(entries[3].new_path, "renamed.txt");
    }

    #[test]
    fn normalizes_dev_null_and_ab_prefixes() {
        let data = b"A\0a/new.txt\0";
        let entries = parse_name_status(data).unwrap();
        assert_eq!(entries[0].new_path, "new.txt");
    }

    #[test]
    fn parses_unified_diff_hunks_and_lines() {
        let patch = "diff --git a/foo.txt b/foo.txt\n@@ -1,2 +1,2 @@\n-old line\n+new line\n context\n";
        let patches = parse_unified_diff(patch.as_bytes()).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].hunks.len(), 1);
        let hunk = &patches[0].hunks[0];
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.lines.len(), 3);
        assert_eq!(hunk.lines[0].kind, '-');
        assert_eq!(hunk.lines[0].old_line, Some(1));
        assert_eq!(hunk.lines[1].kind, '+');
        assert_eq!(hunk.lines[1].new_line, Some(1));
    }

    #[test]
    fn hunk_header_without_length_defaults_to_one() {
        let patch = "diff --git a/foo.txt b/foo.txt\n@@ -5 +5 @@\n-x\n+y\n";
        let patches = parse_unified_diff(patch.as_bytes()).unwrap();
        assert_eq!(patches[0].hunks[0].old_lines, 1);
        assert_eq!(patches[0].hunks[0].new_lines, 1);
    }
}
