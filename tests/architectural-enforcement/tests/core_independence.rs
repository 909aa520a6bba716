//! Architectural Enforcement: Event-Driven, UI-Free Core
//!
//! The Conductor reacts to reply chunks and view events. It never waits on a
//! timer, and it never links a terminal or GUI toolkit.

use architectural_enforcement::{code_part, core_dir, is_in_test_function, rust_sources, Violation};

const SLEEP_PATTERNS: &[&str] = &["thread::sleep", "time::sleep", "sleep_until"];

const UI_CRATES: &[&str] = &["ratatui", "crossterm", "tui", "egui", "iced", "cursive"];

#[test]
fn test_no_sleep_in_conductor_core() {
    let src = core_dir().join("src");
    assert!(src.is_dir(), "conductor core sources not found at {}", src.display());

    let mut violations = Vec::new();
    for (path, content) in rust_sources(&src) {
        let lines: Vec<&str> = content.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if SLEEP_PATTERNS.iter().any(|p| code.contains(p)) && !is_in_test_function(&lines, idx) {
                violations.push(Violation {
                    path: path.clone(),
                    line_number: idx + 1,
                    kind: "sleep in production code",
                    line: line.trim().to_string(),
                });
            }
        }
    }

    if !violations.is_empty() {
        let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("Found sleep() calls:\n{}", report.join("\n"));
    }
}

#[test]
fn test_no_ui_framework_dependencies() {
    let manifest_path = core_dir().join("Cargo.toml");
    let manifest = std::fs::read_to_string(&manifest_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", manifest_path.display()));

    let offending: Vec<&str> = manifest
        .lines()
        .map(|l| code_part(l.split('#').next().unwrap_or(l)).trim())
        .filter_map(|l| l.split(['=', ' ']).next())
        .filter(|name| UI_CRATES.contains(name))
        .collect();

    assert!(
        offending.is_empty(),
        "conductor core must not depend on UI crates, found: {offending:?}"
    );
}

#[test]
fn test_core_denies_missing_docs() {
    let lib_path = core_dir().join("src/lib.rs");
    let lib = std::fs::read_to_string(&lib_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", lib_path.display()));

    assert!(
        lib.lines().any(|l| l.trim() == "#![deny(missing_docs)]"),
        "conductor core must deny undocumented public items"
    );
}
