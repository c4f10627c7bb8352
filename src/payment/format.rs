//! Card form input formatting, applied on every keystroke.

const CARD_MAX_LEN: usize = 19;
const CVC_MAX_LEN: usize = 4;

pub fn digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// "4111111111111111" -> "4111 1111 1111 1111"
pub fn format_card_number(input: &str) -> String {
    let digits = digits(input);
    let grouped = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk))
        .collect::<Vec<_>>()
        .join(" ");
    grouped.chars().take(CARD_MAX_LEN).collect()
}

/// "1225" -> "12/25". No slash until a third digit is entered.
pub fn format_expiry(input: &str) -> String {
    let digits = digits(input);
    if digits.len() > 2 {
        let end = digits.len().min(4);
        format!("{}/{}", &digits[..2], &digits[2..end])
    } else {
        digits
    }
}

pub fn format_cvc(input: &str) -> String {
    digits(input).chars().take(CVC_MAX_LEN).collect()
}
