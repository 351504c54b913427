use std::collections::HashSet;

use once_cell::sync::Lazy;

pub const MIN_LENGTH: usize = 8;
pub const MIN_ENTROPY_BITS: f64 = 40.0;
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "password123", "admin", "qwerty", "letmein", "welcome", "monkey",
    "dragon", "master", "12345678", "123456789", "1234567890", "abc123", "password1", "123123",
    "000000", "iloveyou", "sunshine", "princess", "1234", "12345", "1234567", "111111",
    "photoshop", "123", "123abc", "aaa", "abc", "access", "adobe", "ashley", "azerty", "bailey",
    "baseball", "batman", "charlie", "donald", "flower", "football", "freedom", "hello", "hottie",
    "illustrator", "jesus", "login", "lovely", "michael", "mustang", "ninja", "passw0rd",
    "qazwsx", "qqww1122", "shadow", "solo", "starwars", "superman", "trustno1", "whatever",
    "zaq1zaq1",
];

// Base words plus the `123`, `!` and `1` suffix variants people reach for first.
static COMPROMISED: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut set = HashSet::new();
    for base in COMMON_PASSWORDS {
        set.insert(base.to_string());
        for suffix in ["123", "!", "1"] {
            set.insert(format!("{base}{suffix}"));
        }
    }
    set
});

pub fn is_common(password: &str) -> bool {
    COMPROMISED.contains(&password.to_lowercase())
}

/// `len × log2(pool)` where the pool sums the character classes present.
pub fn entropy_bits(password: &str) -> f64 {
    let mut pool = 0u32;
    if password.chars().any(|c| c.is_lowercase()) {
        pool += 26;
    }
    if password.chars().any(|c| c.is_uppercase()) {
        pool += 26;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        pool += 10;
    }
    if password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        pool += 22;
    }
    if pool == 0 {
        return 0.0;
    }
    password.chars().count() as f64 * f64::from(pool).log2()
}

/// Every rule the password breaks, in a fixed order. Empty means acceptable.
pub fn violations(password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_LENGTH} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".into());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".into());
    }
    if is_common(password) {
        errors.push("This password is too common. Please choose a more secure password.".into());
    }
    if entropy_bits(password) < MIN_ENTROPY_BITS {
        errors.push(
            "Password is not complex enough. Please use a more varied combination of characters."
                .into(),
        );
    }
    errors
}

pub fn validate(password: &str) -> Result<(), String> {
    let errors = violations(password);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(validate("Molar7Crown").is_ok());
    }

    #[test]
    fn short_password_reports_length_and_entropy() {
        let errs = violations("Ab1");
        assert!(errs.iter().any(|e| e.contains("at least 8 characters")));
        assert!(errs.iter().any(|e| e.contains("not complex enough")));
    }

    #[test]
    fn missing_classes_are_each_reported() {
        let errs = violations("alllowercase");
        assert!(errs.iter().any(|e| e.contains("uppercase")));
        assert!(errs.iter().any(|e| e.contains("number")));
        assert!(!errs.iter().any(|e| e.contains("lowercase")));
    }

    #[test]
    fn common_password_variants_are_rejected_case_insensitively() {
        assert!(is_common("Password1"));
        assert!(is_common("SUNSHINE!"));
        assert!(is_common("superman123"));
        assert!(!is_common("Molar7Crown"));
        assert!(validate("Password123").is_err());
    }

    #[test]
    fn entropy_counts_classes() {
        assert_eq!(entropy_bits(""), 0.0);
        let e = entropy_bits("abcdefgh");
        assert!((e - 8.0 * 26f64.log2()).abs() < 1e-9);
        assert!(entropy_bits("Abcdefg1") > MIN_ENTROPY_BITS);
    }

    #[test]
    fn messages_are_joined() {
        let err = validate("short").unwrap_err();
        assert!(err.contains("; "));
    }
}
