//! Line-oriented key/value pair codec
//!
//! `/range` and `/all` responses carry entries as alternating lines:
//! `key\nvalue\n`. Keys never contain newlines (enforced at the write path),
//! so the framing is unambiguous.

/// Encode entries into the wire body.
pub fn encode_pairs(entries: &[(String, String)]) -> String {
    let mut body = String::new();
    for (key, value) in entries {
        body.push_str(key);
        body.push('\n');
        body.push_str(value);
        body.push('\n');
    }
    body
}

/// Decode a wire body back into entries.
///
/// A trailing key line without its value line is dropped, mirroring how a
/// truncated stream is treated by the migrator: an unpaired key cannot be
/// copied.
pub fn decode_pairs(body: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut lines = body.lines();
    while let Some(key) = lines.next() {
        match lines.next() {
            Some(value) => entries.push((key.to_string(), value.to_string())),
            None => break,
        }
    }
    entries
}
