//! E.164 phone number normalization.

/// Normalize a phone number into E.164 form.
///
/// Accepts spaces, dashes, and parentheses as cosmetic separators. Returns
/// `Err` with a short human-readable reason when the result is not a `+`
/// followed by 8 to 15 digits.
pub fn normalize(raw: &str) -> Result<String, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let Some(digits) = cleaned.strip_prefix('+') else {
        return Err("phone number must start with '+' and a country code".to_owned());
    };

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("phone number may contain only digits after '+'".to_owned());
    }

    if !(8..=15).contains(&digits.len()) {
        return Err("phone number must have 8 to 15 digits".to_owned());
    }

    Ok(cleaned)
}
