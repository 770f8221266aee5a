//! Shared validation helpers for the adapter layer and config checks.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used for the advertised device name and WiFi SSIDs.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Returns `true` if `s` contains CR or LF.  A mail header field with a
/// line break would let the value inject extra headers or commands.
pub(crate) fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}
