//! Transparent decompression for saved authentication log exports.
//!
//! Exports are often archived as `.gz` or `.zst`; both are read without
//! manual extraction. Anything else is treated as plain text.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Opens a log export, picking a decoder from the file extension.
pub fn open_file(path: impl AsRef<Path>) -> Result<Box<dyn Read + Send>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "gz" => Ok(Box::new(GzDecoder::new(file))),
        "zst" => {
            let decoder = zstd::Decoder::new(file).with_context(|| {
                format!("Failed to create zstd decoder for: {}", path.display())
            })?;
            Ok(Box::new(decoder))
        }
        _ => Ok(Box::new(file)),
    }
}

/// Reads a whole (possibly compressed) export into memory.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut contents = String::new();
    open_file(path)?
        .read_to_string(&mut contents)
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    Ok(contents)
}
