use thiserror::Error;

/// Pricing failures; all are fatal to the call that raised them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("pool reserve is zero or negative")]
    ZeroReserve,

    #[error("unsupported swap direction `{0}`")]
    UnsupportedDirection(String),

    #[error("unsupported price unit `{0}`")]
    UnsupportedUnit(String),

    #[error("swap amount must be positive")]
    NonPositiveAmount,
}
