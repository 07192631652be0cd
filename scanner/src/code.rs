//! The shape a payload must have to count as a code.

/// Exact number of characters in a code.
pub const CODE_LEN: usize = 13;

/// Interpret payload bytes as text. Payloads that are not valid UTF-8 are not codes.
pub fn payload_text(payload: &[u8]) -> Option<&str> {
    std::str::from_utf8(payload).ok()
}

/// True iff `text` is exactly [`CODE_LEN`] ASCII letters or digits.
pub fn is_valid_code(text: &str) -> bool {
    text.len() == CODE_LEN && text.bytes().all(|b| b.is_ascii_alphanumeric())
}
