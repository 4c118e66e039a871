//! Magnet URI display-name extraction

/// Placeholder used when the magnet URI carries no `dn=` parameter
pub const UNKNOWN_NAME: &str = "Unknown";

/// Extract the percent-decoded display name from a magnet URI.
///
/// Looks for the `dn=` query parameter; if it is absent (or empty) the
/// fixed placeholder [`UNKNOWN_NAME`] is returned.
///
/// # Examples
///
/// ```
/// use magnet_mirror::transfer::magnet::extract_display_name;
///
/// let name = extract_display_name("magnet:?xt=urn:btih:ABC&dn=My%20Show%20S01");
/// assert_eq!(name, "My Show S01");
/// ```
pub fn extract_display_name(magnet: &str) -> String {
    for part in magnet.split(['?', '&']) {
        if let Some(value) = part.strip_prefix("dn=") {
            if value.is_empty() {
                continue;
            }
            return match urlencoding::decode(value) {
                Ok(decoded) => decoded.into_owned(),
                // Invalid percent escapes: fall back to the raw value
                Err(_) => value.to_string(),
            };
        }
    }
    UNKNOWN_NAME.to_string()
}
