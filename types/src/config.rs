use core::num::NonZeroU64;

use thiserror::Error;

use crate::phase0::primitives::{Gwei, UnixSeconds, Version};

/// Runtime-variable chain parameters.
///
/// Structural constants live in [`crate::preset`]; everything here may differ
/// between deployments of the same binary.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Config {
    pub config_name: String,
    pub seconds_per_slot: NonZeroU64,
    pub genesis_fork_version: Version,
    pub network_id: u8,
    pub chain_id: u64,
    pub min_genesis_time: UnixSeconds,
    pub min_genesis_active_validator_count: u64,
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: NonZeroU64,
    pub ejection_balance: Gwei,
    pub min_validator_withdrawability_delay: u64,
    pub persistent_committee_period: u64,
}

/// Field-wise overrides for [`Config`].
///
/// This replaces the reflective deep copying the protocol's reference stack
/// uses for configuration merging. Every field has documented merge
/// semantics: `Some` replaces, `None` keeps.
#[derive(Clone, Default, Debug)]
pub struct ConfigDelta {
    pub seconds_per_slot: Option<NonZeroU64>,
    pub genesis_fork_version: Option<Version>,
    pub network_id: Option<u8>,
    pub chain_id: Option<u64>,
    pub min_genesis_time: Option<UnixSeconds>,
    pub min_genesis_active_validator_count: Option<u64>,
    pub min_per_epoch_churn_limit: Option<u64>,
    pub churn_limit_quotient: Option<NonZeroU64>,
    pub ejection_balance: Option<Gwei>,
    pub min_validator_withdrawability_delay: Option<u64>,
    pub persistent_committee_period: Option<u64>,
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum OverrideError {
    #[error("{path} is not an overridable field")]
    UnknownPath { path: String },
    #[error("{path} must not be zero")]
    MustNotBeZero { path: String },
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: "mainnet".to_owned(),
            seconds_per_slot: NonZeroU64::new(6).expect("slot duration is nonzero"),
            genesis_fork_version: Version::zero(),
            network_id: 1,
            chain_id: 1,
            min_genesis_time: 1_578_009_600,
            min_genesis_active_validator_count: 1 << 16,
            min_per_epoch_churn_limit: 4,
            churn_limit_quotient: NonZeroU64::new(1 << 16)
                .expect("churn limit quotient is nonzero"),
            ejection_balance: 16_000_000_000,
            min_validator_withdrawability_delay: 256,
            persistent_committee_period: 2048,
        }
    }

    /// A configuration for tests and local interop runs.
    ///
    /// Identical to mainnet except for identifiers. The preset is fixed at
    /// compile time, so everything affecting state roots stays the same.
    #[must_use]
    pub fn interop() -> Self {
        Self {
            config_name: "interop".to_owned(),
            network_id: 0,
            chain_id: 0,
            min_genesis_time: 0,
            min_genesis_active_validator_count: 16,
            ..Self::mainnet()
        }
    }

    pub fn merge_from(&mut self, delta: &ConfigDelta) {
        let ConfigDelta {
            seconds_per_slot,
            genesis_fork_version,
            network_id,
            chain_id,
            min_genesis_time,
            min_genesis_active_validator_count,
            min_per_epoch_churn_limit,
            churn_limit_quotient,
            ejection_balance,
            min_validator_withdrawability_delay,
            persistent_committee_period,
        } = delta;

        if let Some(value) = seconds_per_slot {
            self.seconds_per_slot = *value;
        }
        if let Some(value) = genesis_fork_version {
            self.genesis_fork_version = *value;
        }
        if let Some(value) = network_id {
            self.network_id = *value;
        }
        if let Some(value) = chain_id {
            self.chain_id = *value;
        }
        if let Some(value) = min_genesis_time {
            self.min_genesis_time = *value;
        }
        if let Some(value) = min_genesis_active_validator_count {
            self.min_genesis_active_validator_count = *value;
        }
        if let Some(value) = min_per_epoch_churn_limit {
            self.min_per_epoch_churn_limit = *value;
        }
        if let Some(value) = churn_limit_quotient {
            self.churn_limit_quotient = *value;
        }
        if let Some(value) = ejection_balance {
            self.ejection_balance = *value;
        }
        if let Some(value) = min_validator_withdrawability_delay {
            self.min_validator_withdrawability_delay = *value;
        }
        if let Some(value) = persistent_committee_period {
            self.persistent_committee_period = *value;
        }
    }

    /// Applies a single override addressed by field name.
    ///
    /// Only integer-valued fields can be addressed this way; the fork version
    /// has no meaningful integer representation.
    pub fn apply_override(&mut self, path: &str, value: u64) -> Result<(), OverrideError> {
        let non_zero = |value: u64| {
            NonZeroU64::new(value).ok_or_else(|| OverrideError::MustNotBeZero {
                path: path.to_owned(),
            })
        };

        match path {
            "seconds_per_slot" => self.seconds_per_slot = non_zero(value)?,
            "network_id" => {
                self.network_id = value
                    .try_into()
                    .map_err(|_| OverrideError::UnknownPath {
                        path: path.to_owned(),
                    })?;
            }
            "chain_id" => self.chain_id = value,
            "min_genesis_time" => self.min_genesis_time = value,
            "min_genesis_active_validator_count" => {
                self.min_genesis_active_validator_count = value;
            }
            "min_per_epoch_churn_limit" => self.min_per_epoch_churn_limit = value,
            "churn_limit_quotient" => self.churn_limit_quotient = non_zero(value)?,
            "ejection_balance" => self.ejection_balance = value,
            "min_validator_withdrawability_delay" => {
                self.min_validator_withdrawability_delay = value;
            }
            "persistent_committee_period" => self.persistent_committee_period = value,
            _ => {
                return Err(OverrideError::UnknownPath {
                    path: path.to_owned(),
                })
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_only_present_fields() {
        let mut config = Config::mainnet();

        config.merge_from(&ConfigDelta {
            chain_id: Some(5),
            ejection_balance: Some(1),
            ..ConfigDelta::default()
        });

        assert_eq!(config.chain_id, 5);
        assert_eq!(config.ejection_balance, 1);
        assert_eq!(config.network_id, Config::mainnet().network_id);
    }

    #[test]
    fn overrides_are_addressed_by_field_name() {
        let mut config = Config::mainnet();

        config
            .apply_override("persistent_committee_period", 4)
            .expect("field exists");

        assert_eq!(config.persistent_committee_period, 4);

        config
            .apply_override("no_such_field", 4)
            .expect_err("field does not exist");

        config
            .apply_override("seconds_per_slot", 0)
            .expect_err("slot duration must not be zero");
    }
}
