use anyhow::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "adoc", "rs", "py", "pyi", "js", "mjs", "cjs", "ts", "jsx",
    "tsx", "java", "c", "cpp", "cc", "h", "hpp", "go", "rb", "php", "swift", "kt", "kts", "scala",
    "hs", "ml", "html", "htm", "xml", "css", "scss", "sass", "less", "svg", "vue", "svelte",
    "json", "jsonl", "yaml", "yml", "toml", "ini", "cfg", "conf", "properties", "sql", "sh",
    "bash", "zsh", "fish", "ps1", "bat", "cmd", "dockerfile", "makefile", "cmake", "gradle",
    "tex", "r", "lua", "dart", "ex", "exs", "erl", "zig", "nix", "proto", "graphql", "gql",
    "csv", "tsv", "log", "diff", "patch", "lock", "env", "ipynb",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "app", "deb", "rpm", "msi", "zip", "tar", "gz", "bz2", "7z",
    "rar", "jar", "war", "mp3", "mp4", "avi", "mkv", "mov", "webm", "pdf", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "bin", "dat", "db", "sqlite", "sqlite3", "rlib", "rmeta", "pdb",
    "obj", "o", "a", "lib", "class", "pyc", "pyo", "whl", "egg", "crate", "jpg", "jpeg", "png",
    "gif", "bmp", "ico", "webp", "tiff", "tif", "heic", "avif",
];

/// Size above which files with unknown extensions are assumed binary.
const CONTENT_CHECK_LIMIT: u64 = 20 * 1024 * 1024;

/// Determines if a file is likely to be a text file.
pub fn is_text_file(path: &Path) -> Result<bool> {
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        let ext_lower = extension.to_lowercase();
        if TEXT_EXTENSIONS.contains(&ext_lower.as_str()) {
            return Ok(true);
        }
        if BINARY_EXTENSIONS.contains(&ext_lower.as_str()) {
            return Ok(false);
        }
    }

    if std::fs::metadata(path)?.len() > CONTENT_CHECK_LIMIT {
        return Ok(false);
    }

    check_file_content(path)
}

/// Sniffs the first KiB: null bytes or invalid UTF-8 mean binary.
fn check_file_content(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 1024];
    let bytes_read = file.read(&mut buffer)?;

    if bytes_read == 0 {
        return Ok(true);
    }
    if buffer[..bytes_read].contains(&0) {
        tracing::debug!("Binary (null bytes) detected in {}", path.display());
        return Ok(false);
    }
    // A multi-byte character may be cut at the buffer boundary.
    match std::str::from_utf8(&buffer[..bytes_read]) {
        Ok(_) => Ok(true),
        Err(e) => Ok(e.error_len().is_none()),
    }
}
