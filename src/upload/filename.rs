//! Filename sanitizing and image id derivation.

use unicode_normalization::UnicodeNormalization;

/// Device names that cannot be used as file stems on Windows.
const RESERVED_STEMS: &[&str] = &[
    "CON", "AUX", "PRN", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a client-supplied filename to a safe, flat name.
///
/// - characters are NFKD-decomposed and what is left outside ASCII is
///   dropped, so accents fold away (`café` -> `cafe`)
/// - path separators become spaces, and whitespace runs become `_`
/// - only `[A-Za-z0-9_.-]` is kept
/// - leading and trailing `.` / `_` are stripped
/// - Windows device names get a `_` prefix
///
/// The result may be empty; callers must reject that.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or("");
    if RESERVED_STEMS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Lowercased extension after the last `.`, if any.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Image id for a stored file: the filename without its last extension.
pub fn image_id(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}
