//! Status line synthesis.

/// Standard reason phrase for `code`, or `""` if the code has none.
pub fn status_text(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

/// `"<code> <reason phrase>"`, e.g. `"404 Not Found"`.
pub fn status_line(code: u16) -> String {
    format!("{code} {}", status_text(code))
}
