//! Output encoding and file writing.
//!
//! Every file the generator produces goes through [`write_text`]. CSV files
//! use the configured encoding (optionally behind a UTF-8 BOM); SQL scripts
//! are always plain UTF-8.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};

pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Encodes `text`, replacing characters the encoding cannot represent with `?`.
///
/// Returns the bytes and the number of replaced characters.
pub fn encode_text(text: &str, encoding: &'static Encoding) -> (Vec<u8>, usize) {
    if encoding == UTF_8 {
        return (text.as_bytes().to_vec(), 0);
    }
    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(text.len())
        .unwrap_or(text.len() * 4);
    let mut output = Vec::with_capacity(capacity);
    let mut buffer = vec![0u8; capacity.max(16)];
    let mut remaining = text;
    let mut replaced = 0usize;
    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(remaining, &mut buffer, true);
        output.extend_from_slice(&buffer[..written]);
        remaining = &remaining[read..];
        match result {
            encoding_rs::EncoderResult::InputEmpty => break,
            encoding_rs::EncoderResult::OutputFull => continue,
            encoding_rs::EncoderResult::Unmappable(_) => {
                output.push(b'?');
                replaced += 1;
            }
        }
    }
    (output, replaced)
}

/// Writes `content` to `path` in `encoding`, prefixed by a BOM when asked.
pub fn write_text(
    path: &Path,
    content: &str,
    encoding: &'static Encoding,
    write_bom: bool,
) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    let (bytes, replaced) = encode_text(content, encoding);
    if replaced > 0 {
        warn!(
            "{replaced} character(s) in {path:?} cannot be represented in {} and were replaced by '?'",
            encoding.name()
        );
    }
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    if write_bom && encoding == UTF_8 {
        writer
            .write_all(UTF8_BOM)
            .with_context(|| format!("Writing BOM to {path:?}"))?;
    }
    writer
        .write_all(&bytes)
        .with_context(|| format!("Writing {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Flushing {path:?}"))?;
    info!("Finished creating {}", path.display());
    Ok(())
}
