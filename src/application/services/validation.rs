use once_cell::sync::Lazy;
use regex::Regex;

use crate::application::error::ServiceError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("valid regex")
});
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

/// Trimmed, lowercased address, or a validation error.
pub fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(ServiceError::validation("Invalid email address"))
    }
}

pub fn normalize_slug(slug: &str) -> Result<String, ServiceError> {
    let slug = slug.trim().to_lowercase();
    if SLUG_RE.is_match(&slug) {
        Ok(slug)
    } else {
        Err(ServiceError::validation(
            "Slug must be 3-50 characters of lowercase letters, digits and hyphens",
        ))
    }
}

pub fn required(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Dr.Who@Clinic.Example ").unwrap(),
            "dr.who@clinic.example"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn slug_rules() {
        assert_eq!(normalize_slug("Bright-Smiles").unwrap(), "bright-smiles");
        assert!(normalize_slug("ab").is_err());
        assert!(normalize_slug("-leading").is_err());
        assert!(normalize_slug("trailing-").is_err());
        assert!(normalize_slug("under_score").is_err());
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("Title", "   ").is_err());
        assert!(required("Title", "X-ray").is_ok());
    }
}
