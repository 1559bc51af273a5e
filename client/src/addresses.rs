//! Deployed program and mint addresses

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey, pubkey::Pubkey};

/// Addresses the client talks to, injected wherever they are needed
///
/// Swap a field to target another deployment or a test fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramAddresses {
    /// AMM v4 program
    #[serde(with = "base58")]
    pub amm_program: Pubkey,

    /// AMM v4 authority PDA
    #[serde(with = "base58")]
    pub amm_authority: Pubkey,

    /// The only supported quote asset (wrapped SOL on mainnet)
    #[serde(with = "base58")]
    pub settlement_mint: Pubkey,

    #[serde(with = "base58")]
    pub token_program: Pubkey,

    #[serde(with = "base58")]
    pub associated_token_program: Pubkey,
}

impl ProgramAddresses {
    pub fn mainnet() -> Self {
        Self {
            amm_program: pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8"),
            amm_authority: pubkey!("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1"),
            settlement_mint: spl_token::native_mint::id(),
            token_program: spl_token::id(),
            associated_token_program: spl_associated_token_account::id(),
        }
    }
}

impl Default for ProgramAddresses {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Serde adapter writing a [`Pubkey`] as its base58 string
pub mod base58 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(|e| D::Error::custom(format!("invalid address {s}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_addresses() {
        let programs = ProgramAddresses::mainnet();
        assert_eq!(
            programs.settlement_mint.to_string(),
            "So11111111111111111111111111111111111111112"
        );
        assert_eq!(
            programs.token_program.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
    }

    #[test]
    fn test_serializes_as_base58() {
        let programs = ProgramAddresses::mainnet();
        let text = toml::to_string(&programs).unwrap();
        assert!(text.contains("amm_program = \"675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8\""));

        let back: ProgramAddresses = toml::from_str(&text).unwrap();
        assert_eq!(back, programs);
    }
}
