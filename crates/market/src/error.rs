use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Not enough position to sell. Requested: {requested}, Available: {available}")]
    InsufficientPosition { requested: Decimal, available: Decimal },

    #[error("Not enough cash to cover margin. Required: {required}, Available: {available}")]
    InsufficientMargin { required: Decimal, available: Decimal },

    #[error("Order quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Cursor {index} is beyond the price series (length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

impl MarketError {
    /// Rejections are part of normal operation: the order is refused and nothing changes.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MarketError::InsufficientFunds { .. }
                | MarketError::InsufficientPosition { .. }
                | MarketError::InsufficientMargin { .. }
                | MarketError::InvalidQuantity(_)
        )
    }
}

/// Failures reported by a live venue client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Credentials(String),

    #[error("Venue rejected the request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn refused_orders_are_rejections_and_run_enders_are_not() {
        let refused = [
            MarketError::InsufficientFunds { required: dec!(10), available: dec!(1) },
            MarketError::InsufficientPosition { requested: dec!(2), available: dec!(1) },
            MarketError::InsufficientMargin { required: dec!(10), available: dec!(1) },
            MarketError::InvalidQuantity(dec!(-1)),
        ];
        assert!(refused.iter().all(MarketError::is_rejection));
        assert!(!MarketError::OutOfRange { index: 5, len: 5 }.is_rejection());
    }
}
