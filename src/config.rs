//! Explicit configuration for [`RecoveryCoordinator`](crate::RecoveryCoordinator).

use serde::{Deserialize, Serialize};

use crate::{
    crypto::KdfParams,
    error::{Error, Result},
};

/// Default minimum passphrase length in bytes.
pub const DEFAULT_MIN_PASSPHRASE_LEN: usize = 8;

/// Cost parameters and policy for one coordinator.
///
/// Wallets are only reproducible under the same `wallet_kdf`, and v1
/// envelopes only open under the `backup_kdf` they were sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub wallet_kdf: KdfParams,
    pub backup_kdf: KdfParams,
    pub min_passphrase_len: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            wallet_kdf: KdfParams::default(),
            backup_kdf: KdfParams::default(),
            min_passphrase_len: DEFAULT_MIN_PASSPHRASE_LEN,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<()> {
        self.wallet_kdf.validate()?;
        self.backup_kdf.validate()?;
        if self.min_passphrase_len == 0 {
            return Err(Error::invalid_input("min_passphrase_len must be >= 1"));
        }
        Ok(())
    }

    /// Parses a JSON config; missing fields fall back to defaults.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| Error::invalid_input(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RecoveryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.min_passphrase_len, 8);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RecoveryConfig::from_json(r#"{"min_passphrase_len": 12}"#).unwrap();
        assert_eq!(config.min_passphrase_len, 12);
        assert_eq!(config.wallet_kdf, KdfParams::default());
    }

    #[test]
    fn json_kdf_params_are_validated() {
        let json = r#"{"backup_kdf": {"mem_cost_kib": 4, "time_cost": 1, "parallelism": 1}}"#;
        assert!(RecoveryConfig::from_json(json).is_err());
    }

    #[test]
    fn overflowing_parallelism_is_rejected() {
        let json = r#"{"wallet_kdf": {"mem_cost_kib": 8, "time_cost": 1, "parallelism": 1073741824}}"#;
        let err = RecoveryConfig::from_json(json).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_min_length_is_rejected() {
        assert!(RecoveryConfig::from_json(r#"{"min_passphrase_len": 0}"#).is_err());
    }
}
