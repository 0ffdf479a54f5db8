//! Upload filename handling: sanitizing what the browser sent and checking
//! it against the accepted extensions.

use thiserror::Error;
use uuid::Uuid;

/// Longest object name handed to the stores, in bytes. Leaves headroom
/// below the usual 255-byte filesystem component limit.
pub const MAX_FILENAME_LEN: usize = 200;

/// Reasons an uploaded file is turned away before anything is stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidUpload {
    #[error("no filename was supplied")]
    MissingFilename,
    #[error("filename `{0}` has no usable characters")]
    UnusableFilename(String),
    #[error("filename `{0}` has no extension")]
    MissingExtension(String),
    #[error("extension `{0}` is not accepted")]
    DisallowedExtension(String),
}

/// Clean one piece of a filename (stem or extension).
///
/// Maps whitespace runs to `_`, drops everything that is not alphanumeric
/// (any script) or one of `.-_`, and trims leading/trailing `.` and `_` so
/// the result is never hidden or a relative path.
fn clean_component(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(c.is_alphanumeric() || matches!(c, '.' | '-' | '_')) {
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push('_');
        }
        pending_space = false;
        cleaned.push(c);
    }

    cleaned.trim_matches(['.', '_']).to_string()
}

/// Cut `stem` to at most `max` bytes on a char boundary.
fn truncate_stem(stem: &str, max: usize) -> &str {
    if stem.len() <= max {
        return stem;
    }
    let mut end = max;
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    stem[..end].trim_end_matches(['.', '_'])
}

/// Sanitize `raw` and check its extension, case-insensitively, against
/// `allowed` (expected lowercase). Returns the name to store under.
///
/// Only the last path component (either separator style) is kept. A stem
/// with nothing usable left is replaced by a generated one, and long stems
/// are shortened so the whole name fits `MAX_FILENAME_LEN`.
pub fn accept_filename(raw: Option<&str>, allowed: &[String]) -> Result<String, InvalidUpload> {
    let raw = raw
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(InvalidUpload::MissingFilename)?;

    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    if clean_component(base).is_empty() {
        return Err(InvalidUpload::UnusableFilename(raw.to_string()));
    }

    let (raw_stem, raw_ext) = base
        .rsplit_once('.')
        .ok_or_else(|| InvalidUpload::MissingExtension(clean_component(base)))?;
    let ext = clean_component(raw_ext);
    if ext.is_empty() {
        return Err(InvalidUpload::MissingExtension(clean_component(base)));
    }
    let ext_lower = ext.to_lowercase();
    if !allowed.iter().any(|candidate| *candidate == ext_lower) {
        return Err(InvalidUpload::DisallowedExtension(ext_lower));
    }

    let stem = clean_component(raw_stem);
    let budget = MAX_FILENAME_LEN.saturating_sub(ext.len() + 1);
    let stem = match truncate_stem(&stem, budget) {
        "" => Uuid::new_v4().simple().to_string(),
        kept => kept.to_string(),
    };

    Ok(format!("{}.{}", stem, ext))
}
