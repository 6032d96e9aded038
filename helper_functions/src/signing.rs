//! Signing roots for every signed object in the protocol.
//!
//! A signing root is `htr(SigningData { object_root, domain })` where
//! `object_root` is the hash tree root of the object with its trailing
//! signature field zeroed (for objects that embed their signature).

use ssz::SszHash as _;
use types::phase0::{
    beacon_state::BeaconState,
    consts::{
        DOMAIN_ATTESTATION, DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_RANDAO,
        DOMAIN_TRANSFER, DOMAIN_VOLUNTARY_EXIT,
    },
    containers::{
        AttestationData, BeaconBlock, BeaconBlockHeader, DepositData, Transfer, VoluntaryExit,
    },
    primitives::{Epoch, Version, H256},
};

use crate::{accessors, misc};

#[must_use]
pub fn block_signing_root(state: &BeaconState, block: &BeaconBlock) -> H256 {
    let epoch = misc::compute_epoch_at_slot(block.slot);
    let domain = accessors::get_domain(state, DOMAIN_BEACON_PROPOSER, Some(epoch));
    misc::compute_signing_root(block.signing_root(), domain)
}

#[must_use]
pub fn header_signing_root(state: &BeaconState, header: &BeaconBlockHeader) -> H256 {
    let epoch = misc::compute_epoch_at_slot(header.slot);
    let domain = accessors::get_domain(state, DOMAIN_BEACON_PROPOSER, Some(epoch));
    misc::compute_signing_root(header.signing_root(), domain)
}

/// What a proposer signs to reveal its RANDAO contribution: the epoch number.
#[must_use]
pub fn randao_signing_root(state: &BeaconState, epoch: Epoch) -> H256 {
    let domain = accessors::get_domain(state, DOMAIN_RANDAO, Some(epoch));
    misc::compute_signing_root(epoch.hash_tree_root(), domain)
}

#[must_use]
pub fn attestation_data_signing_root(state: &BeaconState, data: &AttestationData) -> H256 {
    let domain = accessors::get_domain(state, DOMAIN_ATTESTATION, Some(data.target.epoch));
    misc::compute_signing_root(data.hash_tree_root(), domain)
}

#[must_use]
pub fn exit_signing_root(state: &BeaconState, exit: &VoluntaryExit) -> H256 {
    let domain = accessors::get_domain(state, DOMAIN_VOLUNTARY_EXIT, Some(exit.epoch));
    misc::compute_signing_root(exit.signing_root(), domain)
}

#[must_use]
pub fn transfer_signing_root(state: &BeaconState, transfer: &Transfer) -> H256 {
    let epoch = misc::compute_epoch_at_slot(transfer.slot);
    let domain = accessors::get_domain(state, DOMAIN_TRANSFER, Some(epoch));
    misc::compute_signing_root(transfer.signing_root(), domain)
}

/// Deposit signing roots depend only on the fork version so that deposits
/// made before genesis remain valid.
#[must_use]
pub fn deposit_signing_root(data: &DepositData, fork_version: Version) -> H256 {
    let domain = misc::compute_domain(DOMAIN_DEPOSIT, fork_version);
    misc::compute_signing_root(data.signing_root(), domain)
}
