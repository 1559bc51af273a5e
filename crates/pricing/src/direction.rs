//! Swap direction and price unit tags

use std::fmt;
use std::str::FromStr;

use crate::error::PricingError;

/// Which token the trader pays in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Pay base tokens, receive quote tokens (a sell)
    SpendBase,
    /// Pay quote tokens, receive base tokens (a buy)
    SpendQuote,
}

/// Denomination of a returned price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Base tokens per one quote token
    Base,
    /// Quote tokens per one base token
    Quote,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::SpendBase => write!(f, "spend-base"),
            Direction::SpendQuote => write!(f, "spend-quote"),
        }
    }
}

impl FromStr for Direction {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spend-base" | "spend_base" | "sell" => Ok(Direction::SpendBase),
            "spend-quote" | "spend_quote" | "buy" => Ok(Direction::SpendQuote),
            _ => Err(PricingError::UnsupportedDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Base => write!(f, "base"),
            Unit::Quote => write!(f, "quote"),
        }
    }
}

impl FromStr for Unit {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Unit::Base),
            "quote" => Ok(Unit::Quote),
            _ => Err(PricingError::UnsupportedUnit(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("buy".parse::<Direction>().unwrap(), Direction::SpendQuote);
        assert_eq!("Spend-Base".parse::<Direction>().unwrap(), Direction::SpendBase);
        assert_eq!("quote".parse::<Unit>().unwrap(), Unit::Quote);
    }

    #[test]
    fn test_unknown_tags_rejected() {
        assert_eq!(
            "sideways".parse::<Direction>(),
            Err(PricingError::UnsupportedDirection("sideways".to_string()))
        );
        assert_eq!(
            "lamports".parse::<Unit>(),
            Err(PricingError::UnsupportedUnit("lamports".to_string()))
        );
    }

    #[test]
    fn test_display_parses_back() {
        for d in [Direction::SpendBase, Direction::SpendQuote] {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
        for u in [Unit::Base, Unit::Quote] {
            assert_eq!(u.to_string().parse::<Unit>().unwrap(), u);
        }
    }
}
