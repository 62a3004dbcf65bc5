//! External tool discovery.

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Availability of every external tool sheetsort can use.
pub fn check_tools() -> Vec<(&'static str, bool)> {
    vec![("tesseract", check_binary("tesseract"))]
}
