use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TAGS: usize = 30;
pub const MAX_TAG_LEN: usize = 50;

/// Trims and lower-cases an email address. Rejects anything without a local
/// part and a domain around a single `@`.
pub fn email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(ApiError::validation("Invalid email address")),
    }
}

pub fn password(raw: &str) -> ApiResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Trims `raw` and checks its length in characters against `1..=max`.
pub fn required_text(raw: &str, field: &str, max: usize) -> ApiResult<String> {
    let value = raw.trim();
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(ApiError::validation(format!(
            "{} must be between 1 and {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Trims `raw`, mapping blank to `None`, and caps its length.
pub fn optional_text(raw: &str, field: &str, max: usize) -> ApiResult<Option<String>> {
    let value = raw.trim();
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Skill and interest lists: trimmed, blanks dropped, case-insensitive
/// duplicates removed keeping the first spelling.
pub fn tags(raw: &[String], field: &str) -> ApiResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ApiError::validation(format!(
                "Each {} entry must be at most {} characters",
                field, MAX_TAG_LEN
            )));
        }
        if !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(ApiError::validation(format!(
            "At most {} {} entries are allowed",
            MAX_TAGS, field
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert_eq!(email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(email("no-at-sign").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("a@b@c").is_err());
    }

    #[test]
    fn tags_are_cleaned() {
        let raw = vec![" Design ".into(), "".into(), "design".into(), "Music".into()];
        assert_eq!(tags(&raw, "skills").unwrap(), vec!["Design", "Music"]);
    }

    #[test]
    fn text_bounds() {
        assert!(required_text("   ", "Name", 10).is_err());
        assert_eq!(required_text(" Ana ", "Name", 10).unwrap(), "Ana");
        assert_eq!(optional_text("  ", "Bio", 10).unwrap(), None);
        assert!(optional_text("x".repeat(11).as_str(), "Bio", 10).is_err());
    }
}
