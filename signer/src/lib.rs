//! The abstract signing backend.
//!
//! Slashing protection is a prerequisite of this interface, not an optional
//! add-on: block and attestation signing consult the protector before any
//! key touches the message. A remote signer would slot in behind the same
//! surface.

use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;
use bls::{PublicKeyBytes, SecretKey, SignatureBytes};
use slashing_protection::SlashingProtector;
use thiserror::Error;
use types::phase0::primitives::{Epoch, Slot, H256};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("no key for {pubkey:?}")]
pub struct UnknownKey {
    pub pubkey: PublicKeyBytes,
}

pub struct Signer {
    keys: HashMap<PublicKeyBytes, SecretKey>,
    protector: Mutex<SlashingProtector>,
}

impl Signer {
    #[must_use]
    pub fn new(
        secret_keys: impl IntoIterator<Item = SecretKey>,
        protector: SlashingProtector,
    ) -> Self {
        let keys = secret_keys
            .into_iter()
            .map(|secret_key| (secret_key.to_public_key().to_bytes(), secret_key))
            .collect();

        Self {
            keys,
            protector: Mutex::new(protector),
        }
    }

    #[must_use]
    pub fn pubkeys(&self) -> Vec<PublicKeyBytes> {
        self.keys.keys().copied().collect()
    }

    #[must_use]
    pub fn has(&self, pubkey: PublicKeyBytes) -> bool {
        self.keys.contains_key(&pubkey)
    }

    /// Signs a block after recording it in the slashing protector.
    pub fn sign_block(
        &self,
        pubkey: PublicKeyBytes,
        slot: Slot,
        signing_root: H256,
    ) -> Result<SignatureBytes> {
        self.protector
            .lock()
            .expect("slashing protector is poisoned")
            .check_and_record_block(pubkey, slot, signing_root)?;

        self.sign(pubkey, signing_root)
    }

    /// Signs an attestation after recording its FFG vote.
    pub fn sign_attestation(
        &self,
        pubkey: PublicKeyBytes,
        source_epoch: Epoch,
        target_epoch: Epoch,
        signing_root: H256,
    ) -> Result<SignatureBytes> {
        self.protector
            .lock()
            .expect("slashing protector is poisoned")
            .check_and_record_attestation(pubkey, source_epoch, target_epoch)?;

        self.sign(pubkey, signing_root)
    }

    /// RANDAO reveals carry no slashing risk.
    pub fn sign_randao(&self, pubkey: PublicKeyBytes, signing_root: H256) -> Result<SignatureBytes> {
        self.sign(pubkey, signing_root)
    }

    fn sign(&self, pubkey: PublicKeyBytes, signing_root: H256) -> Result<SignatureBytes> {
        let secret_key = self.keys.get(&pubkey).ok_or(UnknownKey { pubkey })?;

        Ok(secret_key.sign(signing_root).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use database::Database;

    use super::*;

    fn signer() -> Signer {
        let protector = SlashingProtector::load(Arc::new(Database::in_memory()))
            .expect("an empty database loads cleanly");

        Signer::new([interop::secret_key(0)], protector)
    }

    #[test]
    fn signing_two_blocks_at_one_slot_is_refused() {
        let signer = signer();
        let pubkey = signer.pubkeys()[0];

        signer
            .sign_block(pubkey, 1, H256::repeat_byte(1))
            .expect("the first block is signable");

        signer
            .sign_block(pubkey, 1, H256::repeat_byte(2))
            .expect_err("equivocating is refused");
    }

    #[test]
    fn signing_a_surround_vote_is_refused() {
        let signer = signer();
        let pubkey = signer.pubkeys()[0];

        signer
            .sign_attestation(pubkey, 2, 3, H256::repeat_byte(1))
            .expect("the first attestation is signable");

        signer
            .sign_attestation(pubkey, 1, 4, H256::repeat_byte(2))
            .expect_err("a surround vote is refused");
    }

    #[test]
    fn unknown_keys_are_refused() {
        let signer = signer();

        signer
            .sign_randao(PublicKeyBytes([9; 48]), H256::zero())
            .expect_err("the key is not managed by this signer");
    }
}
