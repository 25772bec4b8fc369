//! # Validation Module
//!
//! Input validation for catalog records (products, clients, categories,
//! nutrition facts). Cart validation lives in [`crate::cart`] because it
//! produces typed lines rather than a yes/no answer.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  └── Shape and types of the incoming JSON / CLI args                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths                                          │
//! │  └── Cross-field rules (min ≤ max, expiry ≥ elaboration)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_actual >= 0)                                         │
//! │  ├── UNIQUE (code)                                                     │
//! │  └── Foreign keys (RESTRICT / CASCADE)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use forneria_core::validation::{validate_product_code, validate_stock_quantity};
//!
//! assert!(validate_product_code("PAN-01").is_ok());
//! assert!(validate_stock_quantity(-1).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{NutritionInfo, ProductDraft};
use crate::MAX_STOCK_LEVEL;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CODE_LEN: usize = 50;
const MAX_TEXT_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
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

fn optional(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use forneria_core::validation::validate_product_code;
///
/// assert!(validate_product_code("HALLULLA_01").is_ok());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    required("code", code, MAX_CODE_LEN)?;

    if !code
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, client).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    required(field, name, MAX_NAME_LEN)
}

/// Validates a Chilean RUT in the usual `12345678-K` shape.
///
/// Dots are tolerated; the check digit itself is not verified.
pub fn validate_tax_id(tax_id: &str) -> ValidationResult<()> {
    let cleaned: String = tax_id.trim().chars().filter(|c| *c != '.').collect();
    let invalid = || ValidationError::InvalidFormat {
        field: "tax_id".to_string(),
        reason: "expected digits, a hyphen and a check digit (e.g. 12345678-5)".to_string(),
    };

    let (body, check) = cleaned.split_once('-').ok_or_else(invalid)?;
    let body_ok = (1..=8).contains(&body.len()) && body.chars().all(|c| c.is_ascii_digit());
    let check_ok =
        check.len() == 1 && check.chars().all(|c| c.is_ascii_digit() || c == 'k' || c == 'K');

    if body_ok && check_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Minimal email shape check: one `@` with text on both sides and a dot in
/// the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@domain.tld".to_string(),
        })
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents. Zero is allowed.
///
/// ```rust
/// use forneria_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock level or threshold.
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::Negative {
            field: "stock".to_string(),
        });
    }
    if qty > MAX_STOCK_LEVEL {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field of a product draft, including cross-field rules.
///
/// ## Rules
/// - name required; code (when given) well-formed
/// - price, stock and thresholds non-negative
/// - `stock_min <= stock_max` when both set
/// - `expires_on >= made_on` when elaboration date is set
pub fn validate_product_draft(draft: &ProductDraft) -> ValidationResult<()> {
    validate_name("name", &draft.name)?;
    if let Some(code) = &draft.code {
        validate_product_code(code)?;
    }
    optional("description", draft.description.as_deref(), MAX_TEXT_LEN)?;
    optional("brand", draft.brand.as_deref(), MAX_NAME_LEN)?;
    validate_price_cents(draft.price_cents)?;
    validate_stock_quantity(draft.stock_actual)?;

    for (field, value) in [("stock_min", draft.stock_min), ("stock_max", draft.stock_max)] {
        if value.is_some_and(|v| v < 0) {
            return Err(ValidationError::Negative {
                field: field.to_string(),
            });
        }
    }

    if let (Some(min), Some(max)) = (draft.stock_min, draft.stock_max) {
        if min > max {
            return Err(ValidationError::Inconsistent {
                field: "stock_max".to_string(),
                other: "stock_min".to_string(),
            });
        }
    }

    if let Some(made_on) = draft.made_on {
        if draft.expires_on < made_on {
            return Err(ValidationError::Inconsistent {
                field: "expires_on".to_string(),
                other: "made_on".to_string(),
            });
        }
    }

    if draft.category_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "category_id".to_string(),
        });
    }

    Ok(())
}

/// All nutrition amounts are optional but never negative.
pub fn validate_nutrition(info: &NutritionInfo) -> ValidationResult<()> {
    let fields = [
        ("calories", info.calories),
        ("proteins", info.proteins_centigrams),
        ("fats", info.fats_centigrams),
        ("carbohydrates", info.carbohydrates_centigrams),
        ("sugars", info.sugars_centigrams),
        ("sodium", info.sodium_centigrams),
    ];

    match fields.iter().find(|(_, v)| v.is_some_and(|v| v < 0)) {
        Some((field, _)) => Err(ValidationError::Negative {
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
