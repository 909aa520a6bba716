//! Architectural Enforcement: No Blocking I/O in Async Code
//!
//! The Conductor runs on a tokio runtime. Blocking calls inside `async fn`
//! stall every task on the worker, including the reply stream.
//!
//! Allowed:
//! - `tokio::fs`, `tokio::io`, `reqwest` (async client)
//! - `std::fs` inside plain `fn` (config loading happens before the runtime
//!   does any real work)
//!
//! Prohibited:
//! - `reqwest::blocking` anywhere
//! - `std::net` sockets anywhere
//! - `std::process::Command` anywhere
//! - `std::fs` and std stdin/stdout handles inside `async fn`

use architectural_enforcement::{
    code_part, core_dir, is_in_async_function, is_in_test_function, rust_sources, Violation,
};

const ANYWHERE: &[(&str, &str)] = &[
    ("reqwest::blocking", "blocking HTTP client"),
    ("std::net::", "blocking socket"),
    ("std::process::Command", "blocking process spawn"),
];

const IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "blocking filesystem call in async fn"),
    ("std::io::stdin()", "blocking stdin in async fn"),
    ("std::io::stdout()", "blocking stdout in async fn"),
    ("std::thread::spawn", "thread spawn in async fn"),
];

fn scan(content: &str, path: &std::path::Path) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if is_in_test_function(&lines, idx) {
            continue;
        }

        let mut flag = |kind: &'static str| {
            violations.push(Violation {
                path: path.to_path_buf(),
                line_number: idx + 1,
                kind,
                line: line.trim().to_string(),
            });
        };

        for (pattern, kind) in ANYWHERE {
            if code.contains(pattern) {
                flag(kind);
            }
        }
        if is_in_async_function(&lines, idx) {
            for (pattern, kind) in IN_ASYNC {
                if code.contains(pattern) {
                    flag(kind);
                }
            }
        }
    }

    violations
}

#[test]
fn test_no_blocking_io_in_conductor_core() {
    let src = core_dir().join("src");
    assert!(src.is_dir(), "conductor core sources not found at {}", src.display());

    let sources = rust_sources(&src);
    assert!(!sources.is_empty(), "no Rust files under {}", src.display());

    let violations: Vec<Violation> = sources
        .iter()
        .flat_map(|(path, content)| scan(content, path))
        .collect();

    if !violations.is_empty() {
        let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!(
            "Found {} blocking I/O violation(s):\n{}",
            violations.len(),
            report.join("\n")
        );
    }
}

#[test]
fn test_detector_flags_fs_in_async_fn() {
    let code = "pub async fn load(&self) {\n    let s = std::fs::read_to_string(p)?;\n}\n";
    let found = scan(code, std::path::Path::new("x.rs"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].line_number, 2);
}

#[test]
fn test_detector_allows_fs_in_sync_fn() {
    let code = "fn read_file(path: &Path) {\n    let s = std::fs::read_to_string(path)?;\n}\n";
    assert!(scan(code, std::path::Path::new("x.rs")).is_empty());
}

#[test]
fn test_detector_ignores_comments() {
    let code = "async fn f() {\n    // never use reqwest::blocking here\n}\n";
    assert!(scan(code, std::path::Path::new("x.rs")).is_empty());
}
