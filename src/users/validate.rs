use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    // Indian mobile numbers: optional +91/91/0 prefix, then 10 digits
    // starting with 6-9.
    static ref PHONE_RE: Regex = Regex::new(r"^(?:\+91|91|0)?[6-9]\d{9}$").unwrap();
}

/// Emails are stored and compared trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}
