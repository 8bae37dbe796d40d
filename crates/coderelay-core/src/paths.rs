//! Path helpers shared by the page side, the router and the receiver.

use once_cell::sync::Lazy;
use regex::Regex;

// `// src/a.ts` or `# pkg/mod.py`: a whitespace-free token with an extension.
static COMMENT_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?://|#)\s*(\S+\.[A-Za-z0-9_]+)$").unwrap());
// `C:\repo\a.ts` or `C:/repo/a.ts`, optionally behind a comment marker.
static DRIVE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?://|#)\s*)?([A-Za-z]:[\\/]\S+\.[A-Za-z0-9_]+)$").unwrap());
static DRIVE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]").unwrap());

/// Recover a file path from the first line of a snippet, if it names one.
pub fn extract_path(line: &str) -> Option<String> {
    let line = line.trim();
    if let Some(caps) = DRIVE_PATH_RE.captures(line) {
        return Some(caps[1].to_string());
    }
    COMMENT_PATH_RE
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// Split snippet text into `(file_path, body)`. Without a path header the
/// whole text is the body.
pub fn split_path_header(text: &str) -> (Option<String>, String) {
    let (head, body) = match text.split_once('\n') {
        Some(parts) => parts,
        None => return (None, text.to_string()),
    };
    match extract_path(head.trim_end_matches('\r')) {
        Some(path) => (Some(path), body.to_string()),
        None => (None, text.to_string()),
    }
}

/// Drive-letter (`C:\x`, `C:/x`) or rooted (`/x`) path.
pub fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || DRIVE_PREFIX_RE.is_match(path)
}

/// Normalize separators: backslashes become `/`, runs of `/` collapse, and a
/// leading `./` is dropped.
pub fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let mut out = String::with_capacity(forward.len());
    let mut prev_slash = false;
    for ch in forward.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    match out.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => out,
    }
}

/// Join a destination base path and a relative capture path with `/`.
pub fn join_destination(destination: &str, relative: &str) -> String {
    normalize_path(&format!("{}/{}", destination, relative))
}

/// Where a capture is written: absolute paths are kept as they are,
/// relative ones go under `destination`.
pub fn resolve_capture_path(destination: &str, path: &str) -> String {
    if is_absolute_path(path) {
        normalize_path(path)
    } else {
        join_destination(destination, path)
    }
}
