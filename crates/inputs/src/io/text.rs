//! Tab-delimited node and connection files in the layout Conefor reads.

use std::fs;
use std::path::{Path, PathBuf};

use conefor_common::paths;
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

use crate::{error::Result, traits::TextRecord};

pub const TEXT_EXTENSION: &str = "txt";

/// Resolve a layer's declared encoding.
///
/// `"System"` and empty labels mean the platform default, which is UTF-8
/// here. Unknown labels fall back to UTF-8 with a warning.
pub fn resolve_encoding(label: &str) -> &'static Encoding {
    let label = label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("system") {
        return UTF_8;
    }
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!("Unknown encoding '{}', writing UTF-8", label);
            UTF_8
        }
    }
}

/// Render records sorted by their key, one tab-joined line each, followed by
/// the blank line Conefor expects at the end of the file.
pub fn render<R: TextRecord>(records: &[R]) -> String {
    let mut sorted: Vec<&R> = records.iter().collect();
    sorted.sort_by_key(|record| record.key());

    let mut out = String::new();
    for record in sorted {
        out.push_str(&record.columns().join("\t"));
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Write `records` into `dir` under `base_name` (`.txt` is added when the
/// name has no extension) and return the path actually used.
///
/// An existing file is never overwritten; a `_1`, `_2`, ... sibling is
/// created instead.
pub fn write<R: TextRecord>(
    records: &[R],
    dir: &Path,
    base_name: &str,
    encoding: &str,
) -> Result<PathBuf> {
    paths::ensure_dir(dir)?;
    let file_name = paths::with_default_extension(base_name, TEXT_EXTENSION);
    let path = paths::unique_path(dir, &file_name);

    let encoding = resolve_encoding(encoding);
    let text = render(records);
    let (bytes, used, lossy) = encoding.encode(&text);
    if lossy {
        warn!(
            "Some characters of {} cannot be represented in {}",
            path.display(),
            used.name()
        );
    }

    fs::write(&path, &bytes)?;
    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}
