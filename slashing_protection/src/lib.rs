//! Persistent refusal to sign slashable messages.
//!
//! The record kept per validator is the minimal one: the highest block slot
//! signed and the highest source and target epochs attested. Refusing
//! anything that does not strictly advance them rules out double proposals,
//! double votes, and surround votes in both directions, at the cost of
//! refusing some messages that would technically be safe.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use bls::PublicKeyBytes;
use database::Database;
use ssz::{Ssz, SszRead as _, SszWrite as _};
use thiserror::Error;
use types::phase0::primitives::{Epoch, Slot, H256};

const KEY_PREFIX: &[u8] = b"slashing_protection:";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum SlashingError {
    #[error("a different block was already signed at slot {last_slot} or later")]
    BlockSlotNotIncreasing { last_slot: Slot, slot: Slot },
    #[error("an attestation with target epoch {last_target} or later was already signed")]
    TargetEpochNotIncreasing { last_target: Epoch, target: Epoch },
    #[error("attestation source epoch {source_epoch} regresses the recorded {last_source}")]
    SourceEpochRegressed { last_source: Epoch, source_epoch: Epoch },
}

#[derive(Clone, Copy, Default, Debug, Ssz)]
struct ProtectionRecord {
    has_block: bool,
    last_block_slot: Slot,
    last_block_root: H256,
    has_attestation: bool,
    max_source_epoch: Epoch,
    max_target_epoch: Epoch,
}

pub struct SlashingProtector {
    database: Arc<Database>,
    records: HashMap<PublicKeyBytes, ProtectionRecord>,
}

impl SlashingProtector {
    /// Loads existing records from the `slashing_protection:` key space.
    pub fn load(database: Arc<Database>) -> Result<Self> {
        let mut records = HashMap::new();

        for (key, value) in database.iterate_prefix(KEY_PREFIX)? {
            let mut pubkey = PublicKeyBytes::default();
            pubkey.0.copy_from_slice(&key[KEY_PREFIX.len()..]);

            records.insert(pubkey, ProtectionRecord::from_ssz(value)?);
        }

        Ok(Self { database, records })
    }

    /// Refuses a second distinct block at the same or an earlier slot.
    /// Re-signing the exact same block is allowed.
    pub fn check_and_record_block(
        &mut self,
        pubkey: PublicKeyBytes,
        slot: Slot,
        signing_root: H256,
    ) -> Result<()> {
        let record = self.records.entry(pubkey).or_default();

        if record.has_block && slot <= record.last_block_slot {
            if slot == record.last_block_slot && signing_root == record.last_block_root {
                return Ok(());
            }

            return Err(SlashingError::BlockSlotNotIncreasing {
                last_slot: record.last_block_slot,
                slot,
            }
            .into());
        }

        record.has_block = true;
        record.last_block_slot = slot;
        record.last_block_root = signing_root;

        let record = *record;
        self.persist(pubkey, record)
    }

    /// Refuses double votes and surround votes in either direction.
    pub fn check_and_record_attestation(
        &mut self,
        pubkey: PublicKeyBytes,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<()> {
        let record = self.records.entry(pubkey).or_default();

        if record.has_attestation {
            if target_epoch <= record.max_target_epoch {
                return Err(SlashingError::TargetEpochNotIncreasing {
                    last_target: record.max_target_epoch,
                    target: target_epoch,
                }
                .into());
            }

            if source_epoch < record.max_source_epoch {
                return Err(SlashingError::SourceEpochRegressed {
                    last_source: record.max_source_epoch,
                    source_epoch,
                }
                .into());
            }
        }

        record.has_attestation = true;
        record.max_source_epoch = source_epoch.max(record.max_source_epoch);
        record.max_target_epoch = target_epoch;

        let record = *record;
        self.persist(pubkey, record)
    }

    fn persist(&self, pubkey: PublicKeyBytes, record: ProtectionRecord) -> Result<()> {
        let mut key = KEY_PREFIX.to_vec();
        key.extend_from_slice(pubkey.as_ref());

        self.database.put(key, record.to_ssz()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protector() -> SlashingProtector {
        SlashingProtector::load(Arc::new(Database::in_memory()))
            .expect("an empty database loads cleanly")
    }

    fn pubkey() -> PublicKeyBytes {
        PublicKeyBytes([3; 48])
    }

    #[test]
    fn a_second_block_at_the_same_slot_is_refused() {
        let mut protector = protector();

        protector
            .check_and_record_block(pubkey(), 5, H256::repeat_byte(1))
            .expect("the first block is signable");

        protector
            .check_and_record_block(pubkey(), 5, H256::repeat_byte(2))
            .expect_err("a conflicting block at the same slot is slashable");

        protector
            .check_and_record_block(pubkey(), 5, H256::repeat_byte(1))
            .expect("re-signing the identical block is harmless");

        protector
            .check_and_record_block(pubkey(), 6, H256::repeat_byte(3))
            .expect("a later slot is signable");
    }

    #[test]
    fn surround_votes_are_refused_in_both_directions() {
        let mut protector = protector();

        protector
            .check_and_record_attestation(pubkey(), 2, 3)
            .expect("the first attestation is signable");

        // Surrounding the previous vote: source below 2, target above 3.
        protector
            .check_and_record_attestation(pubkey(), 1, 5)
            .expect_err("a surrounding vote is slashable");

        // Surrounded by the previous vote is caught by the target check.
        protector
            .check_and_record_attestation(pubkey(), 3, 3)
            .expect_err("a repeated target is slashable");

        protector
            .check_and_record_attestation(pubkey(), 3, 4)
            .expect("a strictly advancing vote is signable");
    }

    #[test]
    fn records_survive_reloading() {
        let database = Arc::new(Database::in_memory());

        {
            let mut protector =
                SlashingProtector::load(database.clone()).expect("an empty database loads");

            protector
                .check_and_record_block(pubkey(), 5, H256::repeat_byte(1))
                .expect("the first block is signable");
        }

        let mut reloaded = SlashingProtector::load(database).expect("records load");

        reloaded
            .check_and_record_block(pubkey(), 4, H256::repeat_byte(2))
            .expect_err("the reloaded record still protects");
    }
}
