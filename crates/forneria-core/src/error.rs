//! # Error Types
//!
//! Domain-specific error types for forneria-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  forneria-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed field input                          │
//! │                                                                         │
//! │  forneria-db errors (separate crate)                                   │
//! │  ├── DbError          - Storage failures                               │
//! │  └── ServiceError     - Domain(CoreError) | Storage(DbError)           │
//! │                                                                         │
//! │  CLI errors (in app)                                                   │
//! │  └── ApiError         - { code, message } handed to callers            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries the identifiers needed to explain it; nothing here
//! renders text for a particular front end.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the sale and stock engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product reference (id or code) did not resolve.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Not enough units on hand to deduct.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line: 5 × Marraqueta
    ///      │
    ///      ▼
    /// Stock read under lock: available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Marraqueta", requested: 5, available: 3 }
    ///      │
    ///      ▼
    /// Whole sale rolled back, nothing written
    /// ```
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// A quantity or percentage is out of its allowed range.
    #[error("Invalid quantity for {field}: {reason}")]
    InvalidQuantity { field: String, reason: String },

    /// A money amount is negative, over-precise or too large.
    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    /// A stock or sale lock could not be acquired in time.
    #[error("Concurrent update in progress on {resource}, retry")]
    ConcurrencyConflict { resource: String },

    /// Product is still referenced by a sale line.
    #[error("Product {0} is referenced by existing sales")]
    ProductInUse(String),

    /// Category still has products.
    #[error("Category {0} still has products")]
    CategoryInUse(String),

    /// Client still has sales.
    #[error("Client {0} has recorded sales")]
    ClientInUse(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidQuantity`].
    pub fn invalid_quantity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidQuantity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CoreError::InvalidAmount`].
    pub fn invalid_amount(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for catalog records (products, clients...).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must not be negative")]
    Negative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields are inconsistent with each other (min > max, expiry before
    /// elaboration).
    #[error("{field} must not be before {other}")]
    Inconsistent { field: String, other: String },

    /// Duplicate value (e.g., duplicate product code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Marraqueta".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Marraqueta: requested 5, available 3"
        );
    }

    #[test]
    fn test_shorthand_constructors() {
        let err = CoreError::invalid_quantity("cart[0].quantity", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid quantity for cart[0].quantity: must be at least 1"
        );

        let err = CoreError::invalid_amount("amountPaid", "must not be negative");
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: name is required");
    }
}
