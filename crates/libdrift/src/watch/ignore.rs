use std::path::Path;

/// How a pattern is matched against an event path.
enum PatternKind {
    /// Matches any path component exactly.
    Component,
    /// Matches the end of the file name.
    Suffix,
    /// Matches the start of the file name.
    Prefix,
}

/// One entry in the fixed ignore table.
struct IgnorePattern {
    /// Match rule for this pattern.
    kind: PatternKind,
    /// Text the rule compares against.
    text: &'static str,
}

/// Paths whose events never trigger a refresh check: VCS internals,
/// dependency directories, OS metadata, and editor swap/backup/temp files.
const IGNORED: &[IgnorePattern] = &[
    IgnorePattern {
        kind: PatternKind::Component,
        text: ".git",
    },
    IgnorePattern {
        kind: PatternKind::Component,
        text: ".hg",
    },
    IgnorePattern {
        kind: PatternKind::Component,
        text: ".svn",
    },
    IgnorePattern {
        kind: PatternKind::Component,
        text: "node_modules",
    },
    IgnorePattern {
        kind: PatternKind::Component,
        text: ".DS_Store",
    },
    IgnorePattern {
        kind: PatternKind::Component,
        text: "Thumbs.db",
    },
    IgnorePattern {
        kind: PatternKind::Suffix,
        text: ".swp",
    },
    IgnorePattern {
        kind: PatternKind::Suffix,
        text: ".swo",
    },
    IgnorePattern {
        kind: PatternKind::Suffix,
        text: "~",
    },
    IgnorePattern {
        kind: PatternKind::Suffix,
        text: ".tmp",
    },
    IgnorePattern {
        kind: PatternKind::Suffix,
        text: ".bak",
    },
    IgnorePattern {
        kind: PatternKind::Prefix,
        text: ".#",
    },
];

/// Whether a filesystem event for `path` should be dropped without arming
/// the session.
pub(crate) fn is_ignored(path: &Path) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    IGNORED.iter().any(|pattern| match pattern.kind {
        PatternKind::Component => path
            .components()
            .any(|c| c.as_os_str().to_string_lossy() == pattern.text),
        PatternKind::Suffix => file_name.ends_with(pattern.text),
        PatternKind::Prefix => file_name.starts_with(pattern.text),
    })
}
