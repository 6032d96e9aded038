use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use bls::{PublicKeyBytes, SignatureBytes};
use fork_choice_control::BlockOutcome;
use helper_functions::{accessors, misc as helpers_misc};
use serde::{Deserialize, Serialize};
use ssz::{Hc, SszRead as _, SszWrite as _};
use types::phase0::{
    beacon_state::BeaconState,
    containers::BeaconBlock,
    primitives::{CommitteeIndex, Epoch, Slot},
};
use validator::{attester_duties, produce_block_without_signature, proposer_duties};

use crate::{context::ApiContext, error::ApiError, misc};

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
}

pub async fn node_version(State(context): State<ApiContext>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: context.version.clone(),
    })
}

#[derive(Serialize)]
pub struct GenesisTimeResponse {
    pub time: u64,
}

pub async fn node_genesis_time(State(context): State<ApiContext>) -> Json<GenesisTimeResponse> {
    Json(GenesisTimeResponse {
        time: context.controller.genesis_time(),
    })
}

#[derive(Serialize)]
pub struct SyncingResponse {
    pub syncing: bool,
}

pub async fn node_syncing(State(context): State<ApiContext>) -> Json<SyncingResponse> {
    Json(SyncingResponse {
        syncing: context.is_syncing(),
    })
}

#[derive(Deserialize)]
pub struct DutiesQuery {
    pub epoch: Epoch,
    /// Comma-separated hex public keys.
    pub pubkeys: String,
}

#[derive(Serialize)]
pub struct DutyResponse {
    pub pubkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_slot: Option<Slot>,
    pub attestation_slot: Slot,
    pub committee_index: CommitteeIndex,
}

pub async fn validator_duties(
    State(context): State<ApiContext>,
    Query(query): Query<DutiesQuery>,
) -> Result<Json<Vec<DutyResponse>>, ApiError> {
    if context.is_syncing() {
        return Err(ApiError::Syncing);
    }

    let pubkeys = query
        .pubkeys
        .split(',')
        .map(|pubkey| {
            misc::parse_hex::<48>(pubkey)
                .map(PublicKeyBytes)
                .ok_or_else(|| ApiError::BadRequest(format!("malformed pubkey: {pubkey}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if pubkeys.is_empty() {
        return Err(ApiError::BadRequest("no pubkeys given".to_owned()));
    }

    let state = state_in_epoch(&context, query.epoch)?;

    let proposers = proposer_duties(&state, query.epoch).map_err(ApiError::Internal)?;
    let attesters =
        attester_duties(&state, query.epoch, &pubkeys).map_err(ApiError::Internal)?;

    let duties = attesters
        .into_iter()
        .map(|duty| {
            let pubkey = accessors::public_key(&state, duty.validator_index)
                .map_err(ApiError::Internal)?;

            let proposal_slot = proposers
                .iter()
                .find(|proposer| proposer.validator_index == duty.validator_index)
                .map(|proposer| proposer.slot);

            Ok(DutyResponse {
                pubkey: misc::to_hex(pubkey),
                proposal_slot,
                attestation_slot: duty.slot,
                committee_index: duty.committee_index,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(duties))
}

#[derive(Deserialize)]
pub struct ProduceBlockQuery {
    pub slot: Slot,
    pub randao_reveal: String,
}

pub async fn produce_block(
    State(context): State<ApiContext>,
    Query(query): Query<ProduceBlockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if context.is_syncing() {
        return Err(ApiError::Syncing);
    }

    let randao_reveal = misc::parse_hex::<96>(&query.randao_reveal)
        .map(SignatureBytes)
        .ok_or_else(|| ApiError::BadRequest("malformed randao_reveal".to_owned()))?;

    let snapshot = context.controller.snapshot();

    if query.slot == 0 || query.slot < snapshot.head_state.slot {
        return Err(ApiError::BadRequest(format!(
            "cannot propose at slot {}",
            query.slot,
        )));
    }

    let mut state = snapshot.head_state.as_ref().clone();

    if state.slot < query.slot {
        transition_functions::phase0::process_slots(&context.config, &mut state, query.slot)
            .map_err(ApiError::Internal)?;
    }

    let block = produce_block_without_signature(
        &context.config,
        &state,
        snapshot.head_root,
        &context.controller.pools(),
        query.slot,
        randao_reveal,
        Default::default(),
    )
    .map_err(ApiError::Internal)?;

    let bytes = block
        .to_ssz()
        .map_err(|error| ApiError::Internal(error.into()))?;

    Ok(([(CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn publish_block(
    State(context): State<ApiContext>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if context.is_syncing() {
        return Err(ApiError::Syncing);
    }

    let block = BeaconBlock::from_ssz(&body)
        .map_err(|error| ApiError::BadRequest(format!("malformed block: {error}")))?;

    let outcome = context
        .controller
        .on_block_with_outcome(std::sync::Arc::new(block))
        .recv()
        .map_err(|_| ApiError::Syncing)?;

    match outcome {
        BlockOutcome::Accepted { .. } | BlockOutcome::Duplicate { .. } => Ok(StatusCode::OK),
        // Not importable yet, but worth broadcasting.
        BlockOutcome::DelayedUntilParent { .. } => Ok(StatusCode::ACCEPTED),
        BlockOutcome::Rejected { reason } => Err(ApiError::InvalidBlock(reason)),
    }
}

/// A copy of the head state advanced into `epoch`.
/// Past epochs cannot be addressed: their shufflings are gone.
fn state_in_epoch(context: &ApiContext, epoch: Epoch) -> Result<Hc<BeaconState>, ApiError> {
    let snapshot = context.controller.snapshot();
    let state_epoch = accessors::get_current_epoch(&snapshot.head_state);

    if epoch < state_epoch || epoch > state_epoch + 1 {
        return Err(ApiError::EpochUnavailable);
    }

    let mut state = snapshot.head_state.as_ref().clone();
    let start_slot = helpers_misc::compute_start_slot_at_epoch(epoch);

    if state.slot < start_slot {
        transition_functions::phase0::process_slots(&context.config, &mut state, start_slot)
            .map_err(ApiError::Internal)?;
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU64, sync::Arc};

    use database::Database;
    use fork_choice_control::{Controller, Storage};
    use types::config::Config;

    use super::*;

    fn context() -> ApiContext {
        let config = Arc::new(Config::interop());

        let (state, _) = interop::quick_start_beacon_state(
            &config,
            0,
            NonZeroU64::new(16).expect("validator count is nonzero"),
        )
        .expect("quick-start genesis can be constructed");

        let storage = Storage::new(Arc::new(Database::in_memory()));
        let controller = Controller::new(config.clone(), Arc::new(state), storage)
            .expect("controller can be started");

        ApiContext::new(config, controller)
    }

    #[tokio::test]
    async fn version_and_genesis_time_are_served() {
        let context = context();

        let version = node_version(State(context.clone())).await;
        assert!(version.version.starts_with("lantern/"));

        let time = node_genesis_time(State(context.clone())).await;
        assert_eq!(time.time, 0);

        context.controller.stop();
    }

    #[tokio::test]
    async fn duties_require_wellformed_pubkeys() {
        let context = context();

        let result = validator_duties(
            State(context.clone()),
            Query(DutiesQuery {
                epoch: 0,
                pubkeys: "0xnothex".to_owned(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        context.controller.stop();
    }

    #[tokio::test]
    async fn duties_for_a_far_future_epoch_are_unavailable() {
        let context = context();

        let pubkey = misc::to_hex(interop::secret_key(0).to_public_key().to_bytes());

        let result = validator_duties(
            State(context.clone()),
            Query(DutiesQuery {
                epoch: 10,
                pubkeys: pubkey,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::EpochUnavailable)));

        context.controller.stop();
    }

    #[tokio::test]
    async fn duties_cover_every_tracked_validator() {
        let context = context();

        let pubkeys = (0..16)
            .map(|index| misc::to_hex(interop::secret_key(index).to_public_key().to_bytes()))
            .collect::<Vec<_>>()
            .join(",");

        let Json(duties) = validator_duties(
            State(context.clone()),
            Query(DutiesQuery { epoch: 0, pubkeys }),
        )
        .await
        .expect("duties are computable for the current epoch");

        assert_eq!(duties.len(), 16);

        context.controller.stop();
    }

    #[tokio::test]
    async fn handlers_refuse_while_syncing() {
        let context = context();

        context
            .syncing
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let result = validator_duties(
            State(context.clone()),
            Query(DutiesQuery {
                epoch: 0,
                pubkeys: "0x00".to_owned(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Syncing)));

        context.controller.stop();
    }

    #[tokio::test]
    async fn malformed_published_blocks_are_rejected() {
        let context = context();

        let result = publish_block(State(context.clone()), Bytes::from_static(&[1, 2, 3])).await;

        assert!(matches!(result, Err(ApiError::InvalidBlock(_) | ApiError::BadRequest(_))));

        context.controller.stop();
    }
}
