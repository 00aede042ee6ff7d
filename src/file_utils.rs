use anyhow::{Context, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

// @module: File and directory utilities

// @const: Runs of characters not allowed in generated file names
static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Name used when sanitizing leaves nothing
pub const DEFAULT_FILE_STEM: &str = "subtitle";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    /// Read a file to string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Write UTF-8 text to a file, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir(parent)?;
            }
        }
        fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
    }

    // @sanitizes: Any text into a portable file stem
    pub fn safe_filename(name: &str) -> String {
        let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
        let cleaned = cleaned.trim_matches('_');
        if cleaned.is_empty() {
            DEFAULT_FILE_STEM.to_string()
        } else {
            cleaned.to_string()
        }
    }

    // @generates: Output path `<dir>/<safe name>.<language>.srt`
    pub fn subtitle_output_path<P: AsRef<Path>>(storage_dir: P, name: &str, language: &str) -> PathBuf {
        storage_dir
            .as_ref()
            .join(format!("{}.{}.srt", Self::safe_filename(name), language))
    }

    /// Decode downloaded subtitle bytes to text.
    ///
    /// Order: byte order mark, strict UTF-8, the declared encoding label,
    /// then Windows-1252 which accepts any byte sequence.
    pub fn decode_bytes(bytes: &[u8], declared_encoding: Option<&str>) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            debug!("Decoding subtitle as {} (BOM)", encoding.name());
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            return text.into_owned();
        }

        if let Ok(text) = std::str::from_utf8(bytes) {
            return text.to_string();
        }

        if let Some(encoding) = declared_encoding.and_then(|label| Encoding::for_label(label.trim().as_bytes())) {
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            if !had_errors {
                debug!("Decoding subtitle as declared {}", encoding.name());
                return text.into_owned();
            }
        }

        debug!("Decoding subtitle as windows-1252 fallback");
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}
