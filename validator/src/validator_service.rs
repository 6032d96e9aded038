use std::sync::Arc;

use anyhow::Result;
use clock::{Tick, TickKind};
use fork_choice_control::Controller;
use helper_functions::{accessors, misc, signing};
use log::{debug, info, warn};
use signer::Signer;
use ssz::BitList;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{Attestation, BeaconBlock},
        primitives::{Slot, H256},
    },
};

use crate::{attester, block_producer, duties};

/// Drives the duties of locally managed validators off the clock.
///
/// Proposals happen at the start of a slot, attestations at its middle.
/// Blocks and attestations produced here are both imported locally and
/// returned to the caller for broadcast.
pub struct ValidatorService {
    config: Arc<Config>,
    controller: Arc<Controller>,
    signer: Arc<Signer>,
    graffiti: H256,
}

/// What the caller must broadcast after a tick.
#[derive(Default)]
pub struct Produced {
    pub blocks: Vec<Arc<BeaconBlock>>,
    pub attestations: Vec<Arc<Attestation>>,
}

impl ValidatorService {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        controller: Arc<Controller>,
        signer: Arc<Signer>,
        graffiti: H256,
    ) -> Self {
        Self {
            config,
            controller,
            signer,
            graffiti,
        }
    }

    pub fn on_tick(&self, tick: Tick) -> Result<Produced> {
        let mut produced = Produced::default();

        match tick.kind {
            TickKind::Propose => {
                if let Some(block) = self.propose(tick.slot)? {
                    produced.blocks.push(block);
                }
            }
            TickKind::Attest => {
                produced.attestations = self.attest(tick.slot)?;
            }
        }

        Ok(produced)
    }

    fn propose(&self, slot: Slot) -> Result<Option<Arc<BeaconBlock>>> {
        // The genesis block is implied by the genesis state.
        if slot == 0 {
            return Ok(None);
        }

        let snapshot = self.controller.snapshot();

        let state = advanced_state(&self.config, &snapshot.head_state, slot)?;

        let proposer_index = accessors::beacon_proposer_index_at_slot(&state, slot)?;
        let pubkey = accessors::public_key(&state, proposer_index)?;

        if !self.signer.has(pubkey) {
            return Ok(None);
        }

        info!("proposing at slot {slot} as validator {proposer_index}");

        let epoch = misc::compute_epoch_at_slot(slot);
        let randao_reveal = self
            .signer
            .sign_randao(pubkey, signing::randao_signing_root(&state, epoch))?;

        let mut block = block_producer::produce_block_without_signature(
            &self.config,
            &state,
            snapshot.head_root,
            &self.controller.pools(),
            slot,
            randao_reveal,
            self.graffiti,
        )?;

        let signing_root = signing::block_signing_root(&state, &block);

        block.signature = self.signer.sign_block(pubkey, slot, signing_root)?;

        let block = Arc::new(block);

        self.controller.on_block(block.clone());

        Ok(Some(block))
    }

    fn attest(&self, slot: Slot) -> Result<Vec<Arc<Attestation>>> {
        let snapshot = self.controller.snapshot();

        let state = advanced_state(&self.config, &snapshot.head_state, slot)?;

        let epoch = misc::compute_epoch_at_slot(slot);
        let own_duties = duties::attester_duties(&state, epoch, &self.signer.pubkeys())?
            .into_iter()
            .filter(|duty| duty.slot == slot)
            .collect::<Vec<_>>();

        let mut attestations = vec![];

        for duty in own_duties {
            let pubkey = accessors::public_key(&state, duty.validator_index)?;

            let data = attester::build_attestation_data(
                &state,
                snapshot.head_root,
                slot,
                duty.committee_index,
            )?;

            let signing_root = signing::attestation_data_signing_root(&state, &data);

            let signature = match self.signer.sign_attestation(
                pubkey,
                data.source.epoch,
                data.target.epoch,
                signing_root,
            ) {
                Ok(signature) => signature,
                Err(error) => {
                    warn!("refusing to attest as validator {}: {error:#}", duty.validator_index);
                    continue;
                }
            };

            let mut aggregation_bits =
                BitList::with_length(duty.committee_length.try_into()?);
            aggregation_bits.set(duty.position_in_committee.try_into()?, true);

            let attestation = Arc::new(Attestation {
                aggregation_bits,
                data,
                custody_bits: BitList::with_length(duty.committee_length.try_into()?),
                signature,
            });

            debug!(
                "attesting at slot {slot} as validator {} (shard {})",
                duty.validator_index, data.crosslink.shard,
            );

            let attesting_balance = state
                .validators
                .get(duty.validator_index)
                .map(|validator| validator.effective_balance)
                .unwrap_or_default();

            let attestation_slot = accessors::get_attestation_data_slot(&state, &data)?;

            let _ = self.controller.pools().attestations.insert(
                &attestation,
                attestation_slot,
                attesting_balance,
            );

            self.controller.on_attestation(attestation.clone());

            attestations.push(attestation);
        }

        Ok(attestations)
    }
}

fn advanced_state(
    config: &Config,
    head_state: &ssz::Hc<BeaconState>,
    slot: Slot,
) -> Result<ssz::Hc<BeaconState>> {
    let mut state = head_state.clone();

    if state.slot < slot {
        transition_functions::phase0::process_slots(config, &mut state, slot)?;
    }

    Ok(state)
}
