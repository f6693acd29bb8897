//! # Validation Module
//!
//! Input validation for request payloads.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json / Query)                           │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service (Rust)                                               │
//! │  └── THIS MODULE: field rules, lengths, ranges                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE indexes (username, phone, email)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lengths are counted in characters, not bytes, so CJK names are measured
//! the way users see them.

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks that a trimmed field is non-empty and at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Checks an optional field's length only.
pub fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a username.
///
/// ## Rules
/// - 3 to 50 characters
/// - Letters, digits, `_`, `-` and `.` only
///
/// ## Example
/// ```rust
/// use mall_core::validation::validate_username;
///
/// assert!(validate_username("alice_01").is_ok());
/// assert!(validate_username("al").is_err());
/// assert!(validate_username("has space").is_err());
/// ```
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let len = username.chars().count();

    if username.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if len < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if len > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, '_', '-' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates a plaintext password before hashing.
///
/// ## Rules
/// - 6 to 128 characters
pub fn validate_password(field: &str, password: &str) -> ValidationResult<()> {
    let len = password.chars().count();

    if password.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if len < 6 {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: 6,
        });
    }

    if len > 128 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 128,
        });
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Optional leading `+`, then 7 to 20 digits
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    if digits.len() < 7 || digits.len() > 20 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be 7 to 20 digits, optionally prefixed with '+'".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// ## Rules
/// - Exactly one `@` with a non-empty local part
/// - Domain contains a `.` that is not at either end
/// - At most 100 characters
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must be a valid email address".to_string(),
    };

    validate_max_len("email", email, 100)?;

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a product name (1 to 255 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 255)
}

/// Validates a category name (1 to 50 characters).
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 50)
}

/// Validates a search keyword.
///
/// ## Returns
/// The trimmed keyword, or `None` when empty.
pub fn validate_keyword(keyword: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(None);
    };

    validate_max_len("keyword", keyword, 100)?;
    Ok(Some(keyword.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - At least 1
/// - At most MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// Add to cart, quantity: 5
///      │
///      ▼
/// validate_quantity(5) ← THIS FUNCTION
///      │
///      ├── qty < 1?   → "quantity must be between 1 and 999"
///      ├── qty > 999? → "quantity must be between 1 and 999"
///      └── OK → merge into cart line
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that an amount or count is not negative.
///
/// ## Example
/// ```rust
/// use mall_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price", 0).is_ok());
/// assert!(validate_non_negative("stock", -1).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a list limit (`1..=100`), defaulting to 10.
pub fn normalize_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(limit) if (1..=100).contains(&limit) => limit,
        _ => 10,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("alice.w-01").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("semi;colon").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password", "secret").is_ok());
        assert!(matches!(
            validate_password("password", "12345"),
            Err(ValidationError::TooShort { min: 6, .. })
        ));
        assert!(validate_password("password", "").is_err());
    }

    #[test]
    fn test_validate_phone_and_email() {
        assert!(validate_phone("13800138000").is_ok());
        assert!(validate_phone("+8613800138000").is_ok());
        assert!(validate_phone("12-34").is_err());

        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at.example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a@@b.com").is_err());
    }

    #[test]
    fn test_text_lengths_count_characters() {
        // 50 CJK characters are 150 bytes but still fit
        assert!(validate_category_name(&"类".repeat(50)).is_ok());
        assert!(validate_category_name(&"类".repeat(51)).is_err());
        assert!(validate_product_name("   ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_keyword() {
        assert_eq!(validate_keyword(None).unwrap(), None);
        assert_eq!(validate_keyword(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_keyword(Some(" shirt ")).unwrap(),
            Some("shirt".to_string())
        );
        assert!(validate_keyword(Some(&"x".repeat(101))).is_err());
    }

    #[test]
    fn test_normalize_limit() {
        assert_eq!(normalize_limit(None), 10);
        assert_eq!(normalize_limit(Some(0)), 10);
        assert_eq!(normalize_limit(Some(25)), 25);
        assert_eq!(normalize_limit(Some(101)), 10);
    }
}
