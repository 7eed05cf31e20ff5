//! Error types for the DSC engine.
//!
//! Errors are grouped by the stage at which an operation is rejected:
//! admissibility checks run before anything is staged, solvency and
//! liquidation checks run against staged state, and external faults come
//! from the token, collateral and oracle collaborators. Every error aborts
//! the whole operation.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the DSC engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Admissibility Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount must be more than zero")]
    ZeroAmount,

    /// Asset is not registered as collateral
    #[error("Asset {0} is not allowed as collateral")]
    AssetNotAllowed(String),

    /// Asset and oracle lists differ in length
    #[error("Collateral assets ({assets}) and price oracles ({oracles}) must be the same length")]
    ConfigLengthMismatch {
        /// Number of collateral assets supplied
        assets: usize,
        /// Number of oracles supplied
        oracles: usize,
    },

    /// Asset registered twice
    #[error("Asset {0} registered more than once")]
    DuplicateAsset(String),

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Solvency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Operation would leave an account below the minimum health factor
    #[error("Health factor {health_factor} is below the minimum {minimum}")]
    BreaksHealthFactor {
        /// Resulting health factor (18 decimals)
        health_factor: u128,
        /// Minimum health factor (18 decimals)
        minimum: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Target position is healthy and cannot be liquidated
    #[error("Position of {0} is healthy and cannot be liquidated")]
    HealthFactorOk(String),

    /// Liquidation did not improve the target's health factor
    #[error("Health factor not improved: started at {starting}, ended at {ending}")]
    HealthFactorNotImproved {
        /// Health factor before liquidation
        starting: u128,
        /// Health factor after liquidation
        ending: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Collateral decrement exceeds the recorded balance
    #[error("Insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral {
        /// Requested amount
        requested: u128,
        /// Recorded balance
        available: u128,
    },

    /// Debt decrement exceeds the recorded debt
    #[error("Insufficient debt: requested {requested}, outstanding {outstanding}")]
    InsufficientDebt {
        /// Requested amount
        requested: u128,
        /// Recorded debt
        outstanding: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // External Dependency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A collateral or stablecoin transfer reported failure
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The stablecoin refused to mint
    #[error("Mint failed: {0}")]
    MintFailed(String),

    /// Caller is not the token owner
    #[error("Caller {0} is not the owner")]
    NotOwner(String),

    /// Zero address used as a recipient
    #[error("Zero address is not a valid recipient")]
    ZeroAddress,

    /// Token balance too low for a transfer or burn
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: u128,
        /// Available balance
        available: u128,
    },

    /// Spender allowance too low
    #[error("Insufficient allowance: required {required}, approved {approved}")]
    InsufficientAllowance {
        /// Required amount
        required: u128,
        /// Approved amount
        approved: u128,
    },

    /// Price quote is stale
    #[error("Stale price for {0}")]
    StalePrice(String),

    /// Price quote is zero or negative
    #[error("Invalid price {price} for {asset}")]
    InvalidPrice {
        /// Asset the quote belongs to
        asset: String,
        /// Reported price
        price: i128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Division by zero
    #[error("Division by zero in {operation}")]
    DivisionByZero {
        /// Operation that divided by zero
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Concurrency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Engine entered again while an operation is in flight
    #[error("Reentrant call rejected")]
    ReentrantCall,

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    // ═══════════════════════════════════════════════════════════════════
    // Configuration & Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Configuration could not be loaded or saved
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Returns true if resubmitting a corrected call can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BreaksHealthFactor { .. }
                | Error::InsufficientCollateral { .. }
                | Error::InsufficientDebt { .. }
                | Error::InsufficientBalance { .. }
                | Error::InsufficientAllowance { .. }
                | Error::StalePrice(_)
                | Error::HealthFactorOk(_)
                | Error::ReentrantCall
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Overflow { .. } | Error::Underflow { .. }
        )
    }

    /// Returns true for faults raised before any state was staged
    pub fn is_admissibility(&self) -> bool {
        matches!(
            self,
            Error::ZeroAmount
                | Error::AssetNotAllowed(_)
                | Error::ConfigLengthMismatch { .. }
                | Error::DuplicateAsset(_)
                | Error::InvalidParameter { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Admissibility errors: 1xxx
            Error::ZeroAmount => 1001,
            Error::AssetNotAllowed(_) => 1002,
            Error::ConfigLengthMismatch { .. } => 1003,
            Error::DuplicateAsset(_) => 1004,
            Error::InvalidParameter { .. } => 1005,

            // Solvency errors: 2xxx
            Error::BreaksHealthFactor { .. } => 2001,

            // Liquidation errors: 3xxx
            Error::HealthFactorOk(_) => 3001,
            Error::HealthFactorNotImproved { .. } => 3002,

            // Ledger errors: 4xxx
            Error::InsufficientCollateral { .. } => 4001,
            Error::InsufficientDebt { .. } => 4002,

            // External dependency errors: 5xxx
            Error::TransferFailed(_) => 5001,
            Error::MintFailed(_) => 5002,
            Error::NotOwner(_) => 5003,
            Error::ZeroAddress => 5004,
            Error::InsufficientBalance { .. } => 5005,
            Error::InsufficientAllowance { .. } => 5006,
            Error::StalePrice(_) => 5007,
            Error::InvalidPrice { .. } => 5008,

            // Arithmetic errors: 6xxx
            Error::Overflow { .. } => 6001,
            Error::Underflow { .. } => 6002,
            Error::DivisionByZero { .. } => 6003,

            // Concurrency errors: 7xxx
            Error::ReentrantCall => 7001,
            Error::Lock => 7002,

            // Configuration & serialization errors: 8xxx
            Error::Config(_) => 8001,
            Error::Serialization(_) => 8002,
            Error::Deserialization(_) => 8003,

            // Internal errors: 9xxx
            Error::InvariantViolation(_) => 9001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::ZeroAmount.code(),
            Error::AssetNotAllowed("".into()).code(),
            Error::BreaksHealthFactor { health_factor: 0, minimum: 0 }.code(),
            Error::HealthFactorOk("".into()).code(),
            Error::HealthFactorNotImproved { starting: 0, ending: 0 }.code(),
            Error::InsufficientCollateral { requested: 0, available: 0 }.code(),
            Error::InsufficientDebt { requested: 0, outstanding: 0 }.code(),
            Error::TransferFailed("".into()).code(),
            Error::StalePrice("".into()).code(),
            Error::Overflow { operation: "".into() }.code(),
            Error::ReentrantCall.code(),
            Error::Config("".into()).code(),
            Error::InvariantViolation("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCollateral {
            requested: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::ZeroAmount.is_admissibility());
        assert!(!Error::ZeroAmount.is_critical());
        assert!(Error::BreaksHealthFactor { health_factor: 0, minimum: 1 }.is_recoverable());
        assert!(Error::Underflow { operation: "test".into() }.is_critical());
        assert!(!Error::HealthFactorOk("x".into()).is_critical());
    }
}
