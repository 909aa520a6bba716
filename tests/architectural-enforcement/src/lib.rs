//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the conductor core:
//! - No blocking I/O inside async code
//! - No sleep() calls in production code
//! - No UI framework dependencies
//!
//! The helpers here scan source text line by line. They are heuristics, tuned
//! to the way the core is formatted.

use std::fs;
use std::path::{Path, PathBuf};

/// Root of the conductor core crate
pub fn core_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../conductor/core")
}

/// A source line that broke a rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// What rule was broken
    pub kind: &'static str,
    /// The offending line, trimmed
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line_number,
            self.kind,
            self.line
        )
    }
}

/// Every `.rs` file under `dir`, with its contents
pub fn rust_sources(dir: &Path) -> Vec<(PathBuf, String)> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|e| {
            let content = fs::read_to_string(e.path()).ok()?;
            Some((e.path().to_path_buf(), content))
        })
        .collect()
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether the line at `current_idx` is inside a `#[cfg(test)]` module
pub fn is_in_test_module(lines: &[&str], current_idx: usize) -> bool {
    lines[..current_idx]
        .iter()
        .rposition(|l| l.trim().starts_with("#[cfg(test)]"))
        .is_some_and(|marker| {
            lines
                .get(marker + 1)
                .is_some_and(|l| l.trim_start().starts_with("mod "))
        })
}

/// Whether the line at `current_idx` is inside a test function
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    if is_in_test_module(lines, current_idx) {
        return true;
    }

    // Scan backwards to find the enclosing function
    let Some(fn_idx) = (0..current_idx).rev().find(|&i| declares_fn(lines[i])) else {
        return false;
    };

    // Scan backwards from the function to find test markers
    for line in lines[..fn_idx].iter().rev().map(|l| l.trim()) {
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !line.starts_with("#[") && !line.starts_with("///") {
            break;
        }
    }
    false
}

/// Whether the line at `current_idx` is inside an `async fn`
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    (0..current_idx)
        .rev()
        .find(|&i| declares_fn(lines[i]))
        .is_some_and(|i| lines[i].contains("async fn "))
}

fn declares_fn(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("fn ")
        || line.starts_with("async fn ")
        || line.starts_with("pub fn ")
        || line.starts_with("pub async fn ")
        || line.starts_with("pub(crate) fn ")
        || line.starts_with("pub(crate) async fn ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = [
            "pub async fn send(&mut self) {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_test_function(&code, 1));
    }

    #[test]
    fn test_sync_function_detection() {
        let code = [
            "fn read_file(path: &Path) {",
            "    let contents = std::fs::read_to_string(path)?;",
            "}",
        ];
        assert!(!is_in_async_function(&code, 1));
    }

    #[test]
    fn test_test_function_detection() {
        let code = [
            "#[tokio::test]",
            "async fn test_something() {",
            "    tokio::time::sleep(d).await;",
            "}",
        ];
        assert!(is_in_test_function(&code, 2));
    }

    #[test]
    fn test_test_module_detection() {
        let code = [
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() {",
            "        std::thread::sleep(d);",
            "    }",
            "}",
        ];
        assert!(is_in_test_function(&code, 3));
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // std::fs::read"), "let x = 1; ");
    }
}
