//! Raw text extraction for diary sources

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions read as plain UTF-8 text
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

/// Whether `path` looks like something [`extract_text`] can read
pub fn is_supported(path: &Path) -> bool {
    match extension(path).as_deref() {
        Some("pdf") => cfg!(feature = "pdf"),
        Some(ext) => TEXT_EXTENSIONS.contains(&ext),
        None => false,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Extract the full text of a file. Blank lines are preserved because the
/// chunker uses them as paragraph boundaries.
pub fn extract_text(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    extract_text_from_bytes(&path.display().to_string(), &data)
}

/// Extract text from in-memory file contents, dispatching on the extension
pub fn extract_text_from_bytes(filename: &str, data: &[u8]) -> Result<String> {
    let ext = extension(Path::new(filename));

    let text = match ext.as_deref() {
        Some("pdf") => extract_pdf(filename, data)?,
        _ => String::from_utf8(data.to_vec())
            .map_err(|e| Error::parse(filename, format!("Invalid UTF-8: {}", e)))?,
    };

    Ok(normalize_text(&text))
}

#[cfg(feature = "pdf")]
fn extract_pdf(filename: &str, data: &[u8]) -> Result<String> {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let data_vec = data.to_vec();
    let (tx, rx) = mpsc::channel();

    // pdf-extract can hang or panic on odd fonts
    let handle = thread::spawn(move || {
        let result = pdf_extract::extract_text_from_mem(&data_vec);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_secs(60)) {
        Ok(Ok(text)) => {
            let _ = handle.join();
            if text.trim().is_empty() {
                return Err(Error::parse(filename, "No text content could be extracted from PDF"));
            }
            Ok(text)
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(Error::parse(filename, e.to_string()))
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("PDF extraction timeout after 60s for {}", filename);
            Err(Error::parse(filename, "PDF extraction timed out"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("PDF extraction thread crashed for {}", filename);
            Err(Error::parse(filename, "PDF extraction crashed"))
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(filename: &str, _data: &[u8]) -> Result<String> {
    Err(Error::parse(
        filename,
        "PDF support is disabled. Rebuild with --features pdf",
    ))
}

/// Normalize line endings and common PDF typography without touching
/// paragraph structure
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Collect supported files under `root` (or `root` itself), sorted by path
pub fn collect_sources(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.exists() {
        return Err(Error::parse(root.display().to_string(), "Path does not exist"));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    Ok(files)
}
