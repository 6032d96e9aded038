use anyhow::{ensure, Result};
use itertools::Itertools as _;
use ssz::SszHash as _;
use typenum::Unsigned as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        consts::{DOMAIN_ATTESTATION, FAR_FUTURE_EPOCH},
        containers::{AttestationData, IndexedAttestation, Validator},
        primitives::{Epoch, H256},
    },
    preset::{MaxValidatorsPerCommittee, MAX_EFFECTIVE_BALANCE},
};

use crate::{
    accessors, error::Error, misc,
    verifier::{SignatureKind, Verifier},
};

#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

#[must_use]
pub const fn is_slashable_validator(validator: &Validator, epoch: Epoch) -> bool {
    !validator.slashed
        && validator.activation_epoch <= epoch
        && epoch < validator.withdrawable_epoch
}

#[must_use]
pub const fn is_eligible_for_activation_queue(validator: &Validator) -> bool {
    validator.activation_eligibility_epoch == FAR_FUTURE_EPOCH
        && validator.effective_balance == MAX_EFFECTIVE_BALANCE
}

/// Double votes and surround votes are slashable.
#[must_use]
pub fn is_slashable_attestation_data(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    let double_vote = data_1 != data_2 && data_1.target.epoch == data_2.target.epoch;

    let surround_vote = data_1.source.epoch < data_2.source.epoch
        && data_2.target.epoch < data_1.target.epoch;

    double_vote || surround_vote
}

/// Checks the well-formedness and signature of an indexed attestation.
pub fn validate_indexed_attestation(
    state: &BeaconState,
    indexed_attestation: &IndexedAttestation,
    verifier: &mut impl Verifier,
) -> Result<()> {
    let indices = &indexed_attestation.attesting_indices;

    ensure!(
        indices.len() <= MaxValidatorsPerCommittee::USIZE,
        Error::BitsCommitteeMismatch {
            bits: indices.len(),
            committee: MaxValidatorsPerCommittee::USIZE,
        },
    );

    ensure!(
        indices
            .iter()
            .tuple_windows()
            .all(|(earlier, later)| earlier < later),
        Error::IndicesNotSortedAndUnique,
    );

    let message = misc::compute_signing_root(
        indexed_attestation.data.hash_tree_root(),
        accessors::get_domain(
            state,
            DOMAIN_ATTESTATION,
            Some(indexed_attestation.data.target.epoch),
        ),
    );

    let public_keys = indices
        .iter()
        .map(|index| accessors::public_key(state, *index))
        .collect::<Result<Vec<_>>>()?;

    verifier.verify_aggregate(
        message,
        indexed_attestation.signature,
        &public_keys,
        SignatureKind::Attestation,
    )
}

/// Verifies a Merkle branch of length `depth` for the leaf at `index`.
#[must_use]
pub fn is_valid_merkle_branch(
    leaf: H256,
    branch: impl IntoIterator<Item = H256>,
    depth: usize,
    index: u64,
    root: H256,
) -> bool {
    let mut value = leaf;
    let mut levels = 0;

    for (height, node) in branch.into_iter().enumerate().take(depth) {
        if index >> height & 1 == 1 {
            value = hashing::hash_256_256(node, value);
        } else {
            value = hashing::hash_256_256(value, node);
        }

        levels = height + 1;
    }

    levels == depth && value == root
}
