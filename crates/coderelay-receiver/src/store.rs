//! Filesystem side of the receiver: saving captures and listing the files a
//! SYNC request pushes back.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use coderelay_core::paths::extract_path;
use coderelay_core::{CaptureKind, FilePush, Result};

/// Binary and temporary file extensions never pushed on SYNC.
static IGNORED_EXTENSIONS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "pdf", "mp4", "avi", "mov", "mp3",
        "wav", "zip", "tar", "gz", "7z", "rar", "exe", "dll", "so", "a", "lib", "o", "obj",
        "class", "jar", "war", "ear", "swf", "flv", "psd", "ai", "eps", "ttf", "woff",
        "woff2", "eot", "otf", "db", "sqlite", "sqlite3", "db3", "sql", "bak", "log", "tmp",
        "temp", "cache", "backup", "old", "swp", "swo", "swn",
    ]
});

/// Drop a first line that names a file path, and the blank space around
/// the rest. Any other first line is content and stays.
pub fn strip_path_comment(content: &str) -> &str {
    let (head, rest) = content.split_once('\n').unwrap_or((content, ""));
    match extract_path(head.trim_end_matches('\r')) {
        Some(_) => rest.trim(),
        None => content,
    }
}

/// Write a capture to `path`, creating parent directories and overwriting
/// any existing file. Returns the path written.
pub fn save_capture(path: &str, content: &str, kind: CaptureKind) -> Result<PathBuf> {
    let target = PathBuf::from(path);
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            debug!("Created directory: {}", parent.display());
        }
    }

    let body = match kind {
        CaptureKind::Snippet => strip_path_comment(content),
        CaptureKind::Assistant => content,
    };
    std::fs::write(&target, body)?;
    info!("File saved: {}", target.display());
    Ok(target)
}

/// True if SYNC must skip this file.
pub fn is_ignored(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IGNORED_EXTENSIONS.iter().any(|i| *i == ext)
        })
        .unwrap_or(false)
}

/// Tracked and untracked-but-not-ignored files of the git work tree at
/// `destination`, relative to it. Empty when git fails.
pub fn list_repo_files(destination: &Path) -> Vec<String> {
    let output = Command::new("git")
        .current_dir(destination)
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let files: Vec<String> = String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            debug!("Tracked files in {}: {}", destination.display(), files.len());
            files
        }
        Ok(output) => {
            warn!(
                "git ls-files failed in {}: {}",
                destination.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Vec::new()
        }
        Err(e) => {
            warn!("Error retrieving tracked files: {}", e);
            Vec::new()
        }
    }
}

/// Build one `FILE_CONTENT` push per readable text file of `destination`.
pub fn collect_file_pushes(destination: &str) -> Vec<FilePush> {
    let root = Path::new(destination);
    let mut pushes = Vec::new();
    for file in list_repo_files(root) {
        if is_ignored(&file) {
            continue;
        }
        let full = root.join(&file);
        if !full.is_file() {
            continue;
        }
        match std::fs::read_to_string(&full) {
            Ok(content) => {
                pushes.push(FilePush::new(full.to_string_lossy(), content));
            }
            Err(e) => warn!("Error reading file {}: {}", full.display(), e),
        }
    }
    info!("Collected {} files from {}", pushes.len(), destination);
    pushes
}
