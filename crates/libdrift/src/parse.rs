use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ChangeKind, ChangeStats, FileChange};

/// Header form `diff --git a/old b/new` with unquoted paths.
static HEADER_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --git a/(.+) b/(.+)$"#).expect("static regex"));

/// Header form with both paths quoted.
static HEADER_BOTH_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --git "a/(.+)" "b/(.+)"$"#).expect("static regex"));

/// Header form with only the old path quoted.
static HEADER_OLD_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --git "a/(.+)" b/(.+)$"#).expect("static regex"));

/// Header form with only the new path quoted.
static HEADER_NEW_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --git a/(.+) "b/(.+)"$"#).expect("static regex"));

/// Last-resort header form: two whitespace-free tokens.
static HEADER_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --git (\S+) (\S+)$"#).expect("static regex"));

/// Combined-diff header emitted for merge commits: a single path.
static HEADER_COMBINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^diff --(?:cc|combined) (.+)$"#).expect("static regex"));

/// `N files changed` group of a diffstat summary line.
static STAT_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) files? changed").expect("static regex"));

/// `N insertions(+)` group of a diffstat summary line.
static STAT_INSERTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) insertions?\(\+\)").expect("static regex"));

/// `N deletions(-)` group of a diffstat summary line.
static STAT_DELETIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) deletions?\(-\)").expect("static regex"));

/// Result of parsing raw unified-diff text.
///
/// Parsing is best-effort and never fails: sections that cannot be
/// understood are dropped and described in `skipped`, the explicit
/// diagnostics channel that lets callers tell "no changes" apart from
/// "nothing parseable".
#[derive(Debug, Default)]
pub struct ParsedDiff {
    /// Per-file change records, in diff order.
    pub files: Vec<FileChange>,
    /// Diagnostics for sections that were dropped.
    pub skipped: Vec<String>,
}

impl ParsedDiff {
    /// Sum the per-file counts into aggregate stats.
    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            files_changed: self.files.len(),
            additions: self.files.iter().map(|f| f.additions).sum(),
            deletions: self.files.iter().map(|f| f.deletions).sum(),
        }
    }
}

/// Parse raw unified-diff text into per-file change records.
///
/// Sections whose text exceeds `max_file_bytes` are not materialized: only
/// their `+`/`-` line prefixes are counted and the content fields stay
/// empty. Empty input yields an empty result.
pub fn parse_diff(raw_text: &str, max_file_bytes: usize) -> ParsedDiff {
    let mut parsed = ParsedDiff::default();
    if raw_text.trim().is_empty() {
        return parsed;
    }

    for section in split_sections(raw_text) {
        match parse_section(section, max_file_bytes) {
            Ok(change) => parsed.files.push(change),
            Err(diagnostic) => parsed.skipped.push(diagnostic),
        }
    }

    parsed
}

/// Whether a line opens a new file section. Merge commits shown with
/// combined output use `diff --cc` (or `diff --combined`) headers instead
/// of `diff --git`.
fn is_section_header(line: &str) -> bool {
    line.starts_with("diff --git ")
        || line.starts_with("diff --cc ")
        || line.starts_with("diff --combined ")
}

/// Split diff text into per-file sections at header boundaries.
///
/// Text before the first header (if any) is not a file section and is
/// discarded.
fn split_sections(raw_text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in raw_text.split_inclusive('\n') {
        if is_section_header(line) {
            starts.push(offset);
        }
        offset += line.len();
    }
    // A final line without a trailing newline is covered by split_inclusive.

    let mut sections = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(raw_text.len());
        sections.push(&raw_text[start..end]);
    }
    sections
}

/// Parse one file section. Returns a diagnostic string on failure.
fn parse_section(section: &str, max_file_bytes: usize) -> Result<FileChange, String> {
    let mut lines = section.lines();
    let header = lines.next().unwrap_or_default();
    let combined = !header.starts_with("diff --git ");

    let (old_path, new_path) = extract_paths(header)
        .ok_or_else(|| format!("unparseable diff header: {header}"))?;

    let kind = classify_section(section);
    let canonical = if new_path.is_empty() {
        old_path.clone()
    } else {
        new_path.clone()
    };
    if canonical.is_empty() {
        return Err(format!("no usable path in diff header: {header}"));
    }

    let old_path = match kind {
        ChangeKind::Renamed => Some(old_path),
        _ => None,
    };
    let mut change = FileChange::new(canonical, old_path, kind);
    change.approx_size_bytes = section.len();

    if is_binary_section(section) {
        // Binary sections carry no line-level information.
        change.is_binary = true;
        return Ok(change);
    }

    if section.len() > max_file_bytes {
        change.too_large = true;
        let (additions, deletions) = if combined {
            count_combined_marker_lines(section)
        } else {
            count_marker_lines(section)
        };
        change.additions = additions;
        change.deletions = deletions;
        return Ok(change);
    }

    if combined {
        scan_combined_content(section, &mut change);
    } else {
        scan_content(section, &mut change);
    }
    Ok(change)
}

/// Extract the old/new path pair from a diff header line.
///
/// Combined headers carry one path, reported for both sides. `diff --git`
/// headers try, in order: plain, both-quoted, mixed-quoted, bare. First
/// match wins.
fn extract_paths(header: &str) -> Option<(String, String)> {
    if let Some(caps) = HEADER_COMBINED.captures(header) {
        let path = clean_path(&caps[1]);
        return Some((path.clone(), path));
    }

    let prefixed = [
        &*HEADER_PLAIN,
        &*HEADER_BOTH_QUOTED,
        &*HEADER_OLD_QUOTED,
        &*HEADER_NEW_QUOTED,
    ];
    for re in prefixed {
        if let Some(caps) = re.captures(header) {
            return Some((clean_path(&caps[1]), clean_path(&caps[2])));
        }
    }

    if let Some(caps) = HEADER_BARE.captures(header) {
        return Some((clean_bare_path(&caps[1]), clean_bare_path(&caps[2])));
    }

    None
}

/// Unescape, strip quotes, and normalize separators in an extracted path.
fn clean_path(path: &str) -> String {
    let trimmed = path.trim_matches('"');
    unescape(trimmed).replace('\\', "/")
}

/// Clean a path captured by the bare fallback: also strip the `a/`/`b/`
/// prefix when present and map `/dev/null` to empty.
fn clean_bare_path(path: &str) -> String {
    let cleaned = clean_path(path);
    let stripped = cleaned
        .strip_prefix("a/")
        .or_else(|| cleaned.strip_prefix("b/"))
        .unwrap_or(&cleaned);
    if stripped == "/dev/null" {
        return String::new();
    }
    stripped.to_string()
}

/// Resolve backslash escapes produced by git's path quoting.
fn unescape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(digit @ '0'..='7') => {
                // Octal escape, up to three digits.
                let mut value = digit as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            value = value * 8 + (*d as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('?'));
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Classify a section from its extended header lines.
fn classify_section(section: &str) -> ChangeKind {
    let mut rename_from = false;
    let mut rename_to = false;
    for line in section.lines().take_while(|l| !l.starts_with("@@")) {
        if line.starts_with("new file") {
            return ChangeKind::Added;
        }
        if line.starts_with("deleted file") {
            return ChangeKind::Deleted;
        }
        if line.starts_with("rename from ") {
            rename_from = true;
        }
        if line.starts_with("rename to ") {
            rename_to = true;
        }
    }
    if rename_from && rename_to {
        ChangeKind::Renamed
    } else {
        ChangeKind::Modified
    }
}

/// Whether the section carries a binary-content marker.
fn is_binary_section(section: &str) -> bool {
    section
        .lines()
        .any(|l| l.starts_with("Binary files ") || l == "GIT binary patch")
}

/// Count `+`/`-` marker lines after the first hunk without materializing
/// content. Used for sections over the size guard.
fn count_marker_lines(section: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    for line in hunk_lines(section) {
        if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}

/// Marker column count of a combined hunk header: one column per parent,
/// derived from the length of the leading `@` run (`@@@` means two).
fn combined_columns(hunk_header: &str) -> usize {
    hunk_header
        .chars()
        .take_while(|c| *c == '@')
        .count()
        .saturating_sub(1)
        .max(1)
}

/// Count `+`/`-` markers in combined hunk bodies without materializing
/// content. Used for combined sections over the size guard.
fn count_combined_marker_lines(section: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    let mut columns = 2;
    let mut in_hunk = false;
    for line in section.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            columns = combined_columns(line);
            continue;
        }
        if !in_hunk || line.starts_with('\\') {
            continue;
        }
        let markers: Vec<char> = line.chars().take(columns).collect();
        if markers.contains(&'+') {
            additions += 1;
        } else if markers.contains(&'-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}

/// Walk combined ("--cc") hunk bodies. Each content line carries one marker
/// column per parent; a `+` in any column is an addition, a `-` in any
/// column a deletion, and all-space markers are context on both sides.
fn scan_combined_content(section: &str, change: &mut FileChange) {
    let mut columns = 2;
    let mut in_hunk = false;
    for line in section.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            columns = combined_columns(line);
            continue;
        }
        if !in_hunk || line.starts_with('\\') {
            continue;
        }
        let markers: Vec<char> = line.chars().take(columns).collect();
        let rest: String = line.chars().skip(columns).collect();
        if markers.contains(&'+') {
            change.additions += 1;
            change.new_content.push_str(&rest);
            change.new_content.push('\n');
        } else if markers.contains(&'-') {
            change.deletions += 1;
            change.old_content.push_str(&rest);
            change.old_content.push('\n');
        } else {
            change.old_content.push_str(&rest);
            change.old_content.push('\n');
            change.new_content.push_str(&rest);
            change.new_content.push('\n');
        }
    }
}

/// Walk the hunk body, accumulating counts and old/new content.
fn scan_content(section: &str, change: &mut FileChange) {
    for line in hunk_lines(section) {
        if line.is_empty() {
            change.old_content.push('\n');
            change.new_content.push('\n');
        } else if let Some(rest) = line.strip_prefix('+') {
            change.additions += 1;
            change.new_content.push_str(rest);
            change.new_content.push('\n');
        } else if let Some(rest) = line.strip_prefix('-') {
            change.deletions += 1;
            change.old_content.push_str(rest);
            change.old_content.push('\n');
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else if line.starts_with("@@") {
            // Hunk locator; contributes nothing to either side.
        } else {
            // Context line: one leading space, present on both sides.
            let rest = line.strip_prefix(' ').unwrap_or(line);
            change.old_content.push_str(rest);
            change.old_content.push('\n');
            change.new_content.push_str(rest);
            change.new_content.push('\n');
        }
    }
}

/// Iterate the lines after the first hunk marker of a section.
fn hunk_lines(section: &str) -> impl Iterator<Item = &str> {
    section
        .lines()
        .skip_while(|l| !l.starts_with("@@"))
        .skip(1)
}

/// Parse a diffstat-style summary into aggregate stats.
///
/// Takes the last non-empty line and extracts up to three optional integer
/// groups (files changed, insertions, deletions); any absent group defaults
/// to zero. Never fails, even on empty or unexpected input.
pub fn parse_stat_summary(raw: &str) -> ChangeStats {
    let Some(line) = raw.lines().rev().find(|l| !l.trim().is_empty()) else {
        return ChangeStats::default();
    };

    let capture = |re: &Regex| {
        re.captures(line)
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(0)
    };

    ChangeStats {
        files_changed: capture(&STAT_FILES),
        additions: capture(&STAT_INSERTIONS),
        deletions: capture(&STAT_DELETIONS),
    }
}
