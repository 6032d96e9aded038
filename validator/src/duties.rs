use anyhow::{ensure, Result};
use bls::PublicKeyBytes;
use helper_functions::{accessors, misc};
use typenum::Unsigned as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex},
    },
    preset::SlotsPerEpoch,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProposerDuty {
    pub slot: Slot,
    pub validator_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AttesterDuty {
    pub validator_index: ValidatorIndex,
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub committee_length: u64,
    pub position_in_committee: u64,
}

/// The proposer of every slot of `epoch`. `state` must be in `epoch`.
pub fn proposer_duties(state: &BeaconState, epoch: Epoch) -> Result<Vec<ProposerDuty>> {
    ensure_state_epoch(state, epoch)?;

    misc::slots_in_epoch(epoch)
        .map(|slot| {
            let validator_index = accessors::beacon_proposer_index_at_slot(state, slot)?;

            Ok(ProposerDuty {
                slot,
                validator_index,
            })
        })
        .collect()
}

/// One attestation duty per tracked validator active in `epoch`.
pub fn attester_duties(
    state: &BeaconState,
    epoch: Epoch,
    pubkeys: &[PublicKeyBytes],
) -> Result<Vec<AttesterDuty>> {
    ensure_state_epoch(state, epoch)?;

    let tracked = pubkeys
        .iter()
        .filter_map(|pubkey| accessors::index_of_public_key(state, *pubkey))
        .collect::<Vec<_>>();

    let committees_per_slot =
        accessors::get_committee_count(state, epoch).get() / SlotsPerEpoch::U64;

    let mut duties = vec![];

    for slot in misc::slots_in_epoch(epoch) {
        for committee_index in 0..committees_per_slot {
            let committee = accessors::get_beacon_committee(state, slot, committee_index)?;

            for (position, validator_index) in committee.iter().enumerate() {
                if tracked.contains(validator_index) {
                    duties.push(AttesterDuty {
                        validator_index: *validator_index,
                        slot,
                        committee_index,
                        committee_length: committee.len() as u64,
                        position_in_committee: position as u64,
                    });
                }
            }
        }
    }

    Ok(duties)
}

fn ensure_state_epoch(state: &BeaconState, epoch: Epoch) -> Result<()> {
    ensure!(
        accessors::get_current_epoch(state) == epoch,
        "the state must be advanced into the requested epoch",
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use types::config::Config;

    use super::*;

    const VALIDATOR_COUNT: u64 = 16;

    fn genesis_state() -> ssz::Hc<BeaconState> {
        let config = Config::interop();

        let (state, _) = interop::quick_start_beacon_state(
            &config,
            0,
            NonZeroU64::new(VALIDATOR_COUNT).expect("validator count is nonzero"),
        )
        .expect("quick-start genesis can be constructed");

        state
    }

    fn all_pubkeys() -> Vec<PublicKeyBytes> {
        (0..VALIDATOR_COUNT)
            .map(|index| interop::secret_key(index).to_public_key().to_bytes())
            .collect()
    }

    #[test]
    fn every_slot_has_exactly_one_proposer() {
        let state = genesis_state();

        let duties = proposer_duties(&state, 0).expect("duties are computable");

        assert_eq!(duties.len(), SlotsPerEpoch::USIZE);

        for (duty, slot) in duties.iter().zip(0..) {
            assert_eq!(duty.slot, slot);
            assert!(duty.validator_index < VALIDATOR_COUNT);
        }
    }

    #[test]
    fn every_active_validator_attests_once_per_epoch() {
        let state = genesis_state();

        let mut duties = attester_duties(&state, 0, &all_pubkeys())
            .expect("duties are computable");

        assert_eq!(duties.len() as u64, VALIDATOR_COUNT);

        duties.sort_by_key(|duty| duty.validator_index);

        for (duty, validator_index) in duties.iter().zip(0..) {
            assert_eq!(duty.validator_index, validator_index);
            assert!(duty.position_in_committee < duty.committee_length);
        }
    }

    #[test]
    fn duties_for_the_wrong_epoch_are_refused() {
        let state = genesis_state();

        proposer_duties(&state, 3).expect_err("the state is in epoch 0");
    }
}
