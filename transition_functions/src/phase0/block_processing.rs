use anyhow::{ensure, Result};
use bls::SignatureBytes;
use helper_functions::{
    accessors, misc, mutators, predicates, signing,
    verifier::{SignatureKind, SingleVerifier, Verifier},
};
use itertools::Itertools as _;
use ssz::SszHash as _;
use typenum::Unsigned as _;
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::FAR_FUTURE_EPOCH,
        containers::{
            Attestation, AttesterSlashing, BeaconBlock, BeaconBlockBody, BeaconBlockHeader,
            Deposit, DepositData, PendingAttestation, ProposerSlashing, Transfer, Validator,
            VoluntaryExit,
        },
        primitives::{ValidatorIndex, H256},
    },
    preset::{
        DepositProofLength, MaxDeposits, ShardCount, SlotsPerEpoch, SlotsPerEth1VotingPeriod,
        EFFECTIVE_BALANCE_INCREMENT, MAX_EFFECTIVE_BALANCE, MAX_EPOCHS_PER_CROSSLINK,
        MIN_ATTESTATION_INCLUSION_DELAY, MIN_DEPOSIT_AMOUNT,
    },
};

use crate::error::Error;

pub fn custom_process_block(
    config: &Config,
    state: &mut BeaconState,
    block: &BeaconBlock,
    mut verifier: impl Verifier,
) -> Result<()> {
    debug_assert_eq!(state.slot, block.slot);

    process_block_header(state, block)?;
    process_randao(state, &block.body, &mut verifier)?;
    process_eth1_data(state, &block.body)?;
    process_operations(config, state, &block.body, &mut verifier)
}

fn process_block_header(state: &mut BeaconState, block: &BeaconBlock) -> Result<()> {
    // > Verify that the slots match
    ensure!(
        block.slot == state.slot,
        Error::SlotMismatch {
            state_slot: state.slot,
            block_slot: block.slot,
        },
    );

    // > Verify that the parent matches
    let computed = state.latest_block_header.hash_tree_root();
    let in_block = block.parent_root;

    ensure!(
        computed == in_block,
        Error::ParentRootMismatch { computed, in_block },
    );

    // > Verify proposer is not slashed
    let proposer_index = accessors::get_beacon_proposer_index(state)?;
    let proposer = state.validators.get(proposer_index)?;

    ensure!(
        !proposer.slashed,
        Error::ProposerSlashed {
            index: proposer_index,
        },
    );

    // > Cache current block as the new latest block
    //
    // The signature stays zeroed so that the header root doubles as the
    // block's identifier.
    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        parent_root: block.parent_root,
        state_root: H256::zero(),
        body_root: block.body.hash_tree_root(),
        signature: SignatureBytes::zero(),
    };

    Ok(())
}

fn process_randao(
    state: &mut BeaconState,
    body: &BeaconBlockBody,
    verifier: &mut impl Verifier,
) -> Result<()> {
    let epoch = accessors::get_current_epoch(state);
    let proposer_index = accessors::get_beacon_proposer_index(state)?;

    // > Verify RANDAO reveal
    verifier.verify_singular(
        signing::randao_signing_root(state, epoch),
        body.randao_reveal,
        accessors::public_key(state, proposer_index)?,
        SignatureKind::Randao,
    )?;

    // > Mix in RANDAO reveal
    let mix = accessors::get_randao_mix(state, epoch)
        ^ hashing::hash_bytes(body.randao_reveal.as_ref());

    *state.randao_mixes.mod_index_mut(epoch) = mix;

    Ok(())
}

fn process_eth1_data(state: &mut BeaconState, body: &BeaconBlockBody) -> Result<()> {
    state.eth1_data_votes.push(body.eth1_data)?;

    let votes_for_new_data = state
        .eth1_data_votes
        .iter()
        .filter(|vote| **vote == body.eth1_data)
        .count();

    if votes_for_new_data * 2 > SlotsPerEth1VotingPeriod::USIZE {
        state.eth1_data = body.eth1_data;
    }

    Ok(())
}

fn process_operations(
    config: &Config,
    state: &mut BeaconState,
    body: &BeaconBlockBody,
    mut verifier: impl Verifier,
) -> Result<()> {
    // > Verify that outstanding deposits are processed up to
    // > the maximum number of deposits
    let computed =
        MaxDeposits::U64.min(state.eth1_data.deposit_count - state.eth1_deposit_index);
    let in_block = body.deposits.len_u64();

    ensure!(
        computed == in_block,
        Error::DepositCountMismatch { computed, in_block },
    );

    // > Verify that there are no duplicate transfers
    ensure!(
        body.transfers
            .iter()
            .tuple_combinations()
            .all(|(a, b)| a != b),
        Error::TransfersNotUnique,
    );

    for proposer_slashing in body.proposer_slashings.iter().copied() {
        process_proposer_slashing(config, state, proposer_slashing, &mut verifier)?;
    }

    for attester_slashing in &body.attester_slashings {
        process_attester_slashing(config, state, attester_slashing, &mut verifier)?;
    }

    for attestation in &body.attestations {
        process_attestation(state, attestation, &mut verifier)?;
    }

    for deposit in &body.deposits {
        process_deposit(state, deposit)?;
    }

    for voluntary_exit in body.voluntary_exits.iter().copied() {
        process_voluntary_exit(config, state, voluntary_exit, &mut verifier)?;
    }

    for transfer in body.transfers.iter().copied() {
        process_transfer(state, transfer, &mut verifier)?;
    }

    Ok(())
}

fn process_proposer_slashing(
    config: &Config,
    state: &mut BeaconState,
    proposer_slashing: ProposerSlashing,
    mut verifier: impl Verifier,
) -> Result<()> {
    let ProposerSlashing {
        proposer_index,
        header_1,
        header_2,
    } = proposer_slashing;

    // > Verify slots match
    ensure!(
        header_1.slot == header_2.slot,
        Error::ProposerSlashingSlotMismatch {
            slot_1: header_1.slot,
            slot_2: header_2.slot,
        },
    );

    // > But the headers are different
    ensure!(
        header_1 != header_2,
        Error::ProposerSlashingHeadersIdentical { header: header_1 },
    );

    // > Check proposer is slashable
    let proposer = state.validators.get(proposer_index)?;

    ensure!(
        predicates::is_slashable_validator(proposer, accessors::get_current_epoch(state)),
        Error::ProposerNotSlashable {
            index: proposer_index,
        },
    );

    // > Signatures are valid
    for header in [header_1, header_2] {
        verifier.verify_singular(
            signing::header_signing_root(state, &header),
            header.signature,
            proposer.pubkey,
            SignatureKind::Block,
        )?;
    }

    mutators::slash_validator(config, state, proposer_index, None)
}

fn process_attester_slashing(
    config: &Config,
    state: &mut BeaconState,
    attester_slashing: &AttesterSlashing,
    mut verifier: impl Verifier,
) -> Result<()> {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;

    ensure!(
        predicates::is_slashable_attestation_data(&attestation_1.data, &attestation_2.data),
        Error::AttestationDataNotSlashable,
    );

    predicates::validate_indexed_attestation(state, attestation_1, &mut verifier)?;
    predicates::validate_indexed_attestation(state, attestation_2, &mut verifier)?;

    let current_epoch = accessors::get_current_epoch(state);

    let indices_2 = attestation_2
        .attesting_indices
        .iter()
        .copied()
        .collect::<std::collections::BTreeSet<_>>();

    let mut slashed_any = false;

    for validator_index in attestation_1
        .attesting_indices
        .iter()
        .copied()
        .filter(|index| indices_2.contains(index))
    {
        let validator = state.validators.get(validator_index)?;

        if predicates::is_slashable_validator(validator, current_epoch) {
            mutators::slash_validator(config, state, validator_index, None)?;
            slashed_any = true;
        }
    }

    ensure!(slashed_any, Error::NoAttestersSlashed);

    Ok(())
}

fn process_attestation(
    state: &mut BeaconState,
    attestation: &Attestation,
    verifier: &mut impl Verifier,
) -> Result<()> {
    let data = attestation.data;
    let shard = data.crosslink.shard;

    ensure!(shard < ShardCount::U64, Error::ShardOutOfBounds { shard });

    let attestation_epoch = accessors::attestation_epoch(state, data.target.epoch)?;
    let attestation_slot = accessors::get_attestation_data_slot(state, &data)?;

    ensure!(
        attestation_slot + MIN_ATTESTATION_INCLUSION_DELAY <= state.slot
            && state.slot <= attestation_slot + SlotsPerEpoch::U64,
        Error::AttestationOutsideInclusionRange {
            state_slot: state.slot,
            attestation_slot,
        },
    );

    // > [To be removed in phase 1] custody bits carry no information yet
    ensure!(attestation.custody_bits.count_ones() == 0, Error::CustodyBitsSet);

    let committee =
        accessors::get_crosslink_committee(state, data.target.epoch, shard)?;

    ensure!(
        attestation.aggregation_bits.len() == committee.len()
            && attestation.custody_bits.len() == committee.len(),
        helper_functions::error::Error::BitsCommitteeMismatch {
            bits: attestation.aggregation_bits.len(),
            committee: committee.len(),
        },
    );

    let (justified_checkpoint, parent_crosslink) = match attestation_epoch {
        AttestationEpoch::Current => (
            state.current_justified_checkpoint,
            *state.current_crosslinks.mod_index(shard),
        ),
        AttestationEpoch::Previous => (
            state.previous_justified_checkpoint,
            *state.previous_crosslinks.mod_index(shard),
        ),
    };

    // > Check FFG data, crosslink data, and signature
    ensure!(
        data.source == justified_checkpoint,
        Error::AttestationSourceMismatch {
            in_state: justified_checkpoint,
            in_block: data.source,
        },
    );

    let computed_parent_root = parent_crosslink.hash_tree_root();

    ensure!(
        data.crosslink.parent_root == computed_parent_root,
        Error::CrosslinkParentMismatch {
            computed: computed_parent_root,
            in_block: data.crosslink.parent_root,
        },
    );

    ensure!(
        data.crosslink.start_epoch == parent_crosslink.end_epoch,
        Error::CrosslinkStartEpochMismatch {
            computed: parent_crosslink.end_epoch,
            in_block: data.crosslink.start_epoch,
        },
    );

    let computed_end_epoch = data
        .target
        .epoch
        .min(parent_crosslink.end_epoch + MAX_EPOCHS_PER_CROSSLINK);

    ensure!(
        data.crosslink.end_epoch == computed_end_epoch,
        Error::CrosslinkEndEpochMismatch {
            computed: computed_end_epoch,
            in_block: data.crosslink.end_epoch,
        },
    );

    ensure!(
        data.crosslink.data_root == H256::zero(),
        Error::CrosslinkDataRootNotZero,
    );

    predicates::validate_indexed_attestation(
        state,
        &accessors::get_indexed_attestation(state, attestation)?,
        verifier,
    )?;

    let pending_attestation = PendingAttestation {
        aggregation_bits: attestation.aggregation_bits.clone(),
        data,
        inclusion_delay: state.slot - attestation_slot,
        proposer_index: accessors::get_beacon_proposer_index(state)?,
    };

    match attestation_epoch {
        AttestationEpoch::Current => state
            .current_epoch_attestations
            .push(pending_attestation)?,
        AttestationEpoch::Previous => state
            .previous_epoch_attestations
            .push(pending_attestation)?,
    }

    Ok(())
}

fn process_deposit(state: &mut BeaconState, deposit: &Deposit) -> Result<()> {
    // > Verify the Merkle branch
    ensure!(
        predicates::is_valid_merkle_branch(
            deposit.data.hash_tree_root(),
            deposit.proof.iter().copied(),
            DepositProofLength::USIZE,
            state.eth1_deposit_index,
            state.eth1_data.deposit_root,
        ),
        Error::DepositProofInvalid,
    );

    // > Deposits must be processed in order
    state.eth1_deposit_index += 1;

    process_deposit_data(state, deposit.data)?;

    Ok(())
}

/// Applies deposit data without checking a Merkle branch.
///
/// Genesis construction uses this directly: the genesis builder is the one
/// constructing the deposit tree, so checking its own proofs is pointless.
pub fn process_deposit_data(
    state: &mut BeaconState,
    data: DepositData,
) -> Result<Option<ValidatorIndex>> {
    let DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        signature,
    } = data;

    if let Some(validator_index) = accessors::index_of_public_key(state, pubkey) {
        // > Increase balance by deposit amount
        mutators::increase_balance(mutators::balance(state, validator_index)?, amount);

        return Ok(Some(validator_index));
    }

    // > Verify the deposit signature (proof of possession)
    // > which is not checked by the deposit contract
    let signing_root = signing::deposit_signing_root(&data, state.fork.current_version);

    if SingleVerifier
        .verify_singular(signing_root, signature, pubkey, SignatureKind::Deposit)
        .is_err()
    {
        // An invalid proof of possession consumes the deposit without
        // creating a validator.
        return Ok(None);
    }

    // > Add validator and balance entries
    let validator_index = state.validators.len_u64();

    state.validators.push(Validator {
        pubkey,
        withdrawal_credentials,
        effective_balance: amount
            .saturating_sub(amount % EFFECTIVE_BALANCE_INCREMENT)
            .min(MAX_EFFECTIVE_BALANCE),
        slashed: false,
        activation_eligibility_epoch: FAR_FUTURE_EPOCH,
        activation_epoch: FAR_FUTURE_EPOCH,
        exit_epoch: FAR_FUTURE_EPOCH,
        withdrawable_epoch: FAR_FUTURE_EPOCH,
    })?;

    state.balances.push(amount)?;

    Ok(Some(validator_index))
}

fn process_voluntary_exit(
    config: &Config,
    state: &mut BeaconState,
    exit: VoluntaryExit,
    mut verifier: impl Verifier,
) -> Result<()> {
    let index = exit.validator_index;
    let current_epoch = accessors::get_current_epoch(state);
    let validator = state.validators.get(index)?;

    // > Verify the validator is active
    ensure!(
        predicates::is_active_validator(validator, current_epoch),
        Error::ValidatorNotActive {
            index,
            current_epoch,
        },
    );

    // > Verify the validator has not yet submitted an exit
    ensure!(
        validator.exit_epoch == FAR_FUTURE_EPOCH,
        Error::ValidatorAlreadyExited {
            index,
            exit_epoch: validator.exit_epoch,
        },
    );

    // > Exits must specify an epoch when they become valid; they are not valid before then
    ensure!(
        current_epoch >= exit.epoch,
        Error::VoluntaryExitNotYetValid {
            epoch: exit.epoch,
            current_epoch,
        },
    );

    // > Verify the validator has been active long enough
    ensure!(
        current_epoch >= validator.activation_epoch + config.persistent_committee_period,
        Error::ValidatorHasNotBeenActiveLongEnough {
            index,
            activation_epoch: validator.activation_epoch,
            current_epoch,
        },
    );

    // > Verify signature
    verifier.verify_singular(
        signing::exit_signing_root(state, &exit),
        exit.signature,
        validator.pubkey,
        SignatureKind::VoluntaryExit,
    )?;

    // > Initiate exit
    mutators::initiate_validator_exit(config, state, index)
}

fn process_transfer(
    state: &mut BeaconState,
    transfer: Transfer,
    mut verifier: impl Verifier,
) -> Result<()> {
    let sender_balance = *state.balances.get(transfer.sender)?;

    // > Verify the balance covers the amount and fee (with overflow protection)
    let amount_plus_fee = transfer
        .amount
        .checked_add(transfer.fee)
        .filter(|total| sender_balance >= *total)
        .ok_or(Error::TransferInsufficientBalance {
            sender: transfer.sender,
            balance: sender_balance,
        })?;

    // > A transfer is valid in only one slot
    ensure!(
        state.slot == transfer.slot,
        Error::TransferSlotMismatch {
            state_slot: state.slot,
            transfer_slot: transfer.slot,
        },
    );

    let current_epoch = accessors::get_current_epoch(state);
    let sender = state.validators.get(transfer.sender)?;

    // > Sender must be not yet eligible for activation, withdrawn,
    // > or transfer balance over MAX_EFFECTIVE_BALANCE
    ensure!(
        sender.activation_eligibility_epoch == FAR_FUTURE_EPOCH
            || current_epoch >= sender.withdrawable_epoch
            || sender_balance >= amount_plus_fee + MAX_EFFECTIVE_BALANCE,
        Error::TransferSenderNotWithdrawable {
            sender: transfer.sender,
        },
    );

    // > Verify that the pubkey is valid
    ensure!(
        sender.withdrawal_credentials == misc::bls_withdrawal_credentials(transfer.pubkey),
        Error::TransferWithdrawalCredentialsMismatch,
    );

    // > Verify that the signature is valid
    verifier.verify_singular(
        signing::transfer_signing_root(state, &transfer),
        transfer.signature,
        transfer.pubkey,
        SignatureKind::Transfer,
    )?;

    // > Process the transfer
    mutators::decrease_balance(mutators::balance(state, transfer.sender)?, amount_plus_fee);
    mutators::increase_balance(mutators::balance(state, transfer.recipient)?, transfer.amount);

    let proposer_index = accessors::get_beacon_proposer_index(state)?;
    mutators::increase_balance(mutators::balance(state, proposer_index)?, transfer.fee);

    // > Verify balances are not dust
    for index in [transfer.sender, transfer.recipient] {
        let balance = *state.balances.get(index)?;

        ensure!(
            balance == 0 || balance >= MIN_DEPOSIT_AMOUNT,
            Error::TransferCreatesDustBalance { index },
        );
    }

    Ok(())
}
