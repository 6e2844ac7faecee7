//! Filename and clock helpers shared by the stores.

use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes kept verbatim in a file stem. Everything else becomes `%XX`.
const STEM_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// File stem for `name`.
///
/// Distinct names give distinct stems, and a stem never contains a path
/// separator or a dot, so it cannot escape its directory.
pub(crate) fn encode_filename(name: &str) -> String {
    utf8_percent_encode(name, STEM_SAFE).to_string()
}

/// Inverse of [`encode_filename`].
///
/// Returns `None` for stems it would never produce, such as foreign files.
pub(crate) fn decode_filename(stem: &str) -> Option<String> {
    let name = percent_decode_str(stem).decode_utf8().ok()?.into_owned();
    (encode_filename(&name) == stem).then_some(name)
}

/// Current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
