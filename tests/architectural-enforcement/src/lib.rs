//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No blocking sleeps in production code
//! - Filesystem access stays behind the persistence boundary
//! - Errors are propagated, not unwrapped
//!
//! These tests are designed to catch violations early in the development cycle.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A rule breach found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File, relative to the workspace root
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.line, self.text)
    }
}

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files under `dir`, relative to the workspace root
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files: Vec<PathBuf> = WalkDir::new(root.join(dir))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|e| e.path().strip_prefix(&root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Production lines of a source file.
///
/// Stops at the first `#[cfg(test)]` (test modules sit at the bottom of each
/// file) and skips comment lines.
#[must_use]
pub fn production_lines(source: &str) -> Vec<(usize, &str)> {
    source
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

/// Scan production lines of every file under `dir` for any of `patterns`,
/// skipping files whose relative path starts with an entry of `allowed`
#[must_use]
pub fn find_violations(dir: &str, patterns: &[&str], allowed: &[&str]) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for file in rust_sources(dir) {
        let relative = file.to_string_lossy().replace('\\', "/");
        if allowed.iter().any(|a| relative.starts_with(a)) {
            continue;
        }
        let Ok(source) = std::fs::read_to_string(root.join(&file)) else {
            continue;
        };
        for (line, text) in production_lines(&source) {
            if patterns.iter().any(|p| text.contains(p)) {
                violations.push(Violation {
                    file: file.clone(),
                    line,
                    text: text.trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Panic with a readable report if any violations were found
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
    panic!("{rule}:\n  {}", report.join("\n  "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_tests() {
        let source = "fn a() {}\n// x.unwrap()\nfn b() {}\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "fn b() {}")]);
    }

    #[test]
    fn test_sources_found() {
        assert!(!rust_sources("chatsync/core/src").is_empty());
    }
}
