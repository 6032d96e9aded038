//! A single-node interop chain: quick-start genesis, all validators local.
//!
//! The wire transport is an external collaborator; this binary drives the
//! consensus core against the clock and serves the validator REST API.

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use clap::Parser;
use database::Database;
use fork_choice_control::{Controller, Storage};
use http_api::ApiContext;
use log::{info, warn};
use signer::Signer;
use slashing_protection::SlashingProtector;
use types::{config::Config, phase0::primitives::H256};
use validator::ValidatorService;

#[derive(Parser)]
#[command(about = "a beacon chain consensus core")]
struct LanternArgs {
    /// Number of interop validators, all managed locally.
    #[arg(long, default_value_t = 16)]
    validator_count: u64,

    /// Unix timestamp of genesis. Defaults to now.
    #[arg(long)]
    genesis_time: Option<u64>,

    /// Address of the validator REST API.
    #[arg(long, default_value = "127.0.0.1:5052")]
    http_address: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = LanternArgs::parse();

    let config = Arc::new(Config::interop());

    let validator_count = NonZeroU64::new(args.validator_count)
        .ok_or_else(|| anyhow::anyhow!("at least one validator is required"))?;

    let genesis_time = match args.genesis_time {
        Some(genesis_time) => genesis_time,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };

    info!(
        "starting with {validator_count} validators, genesis at {genesis_time}",
    );

    let (genesis_state, _deposit_tree) =
        interop::quick_start_beacon_state(&config, genesis_time, validator_count)?;

    let database = Arc::new(Database::in_memory());
    let storage = Storage::new(database.clone());

    let controller = Controller::new(config.clone(), Arc::new(genesis_state), storage)?;

    let protector = SlashingProtector::load(database)?;
    let signer = Arc::new(Signer::new(
        (0..validator_count.get()).map(interop::secret_key),
        protector,
    ));

    let validator_service = Arc::new(ValidatorService::new(
        config.clone(),
        controller.clone(),
        signer,
        H256::zero(),
    ));

    let api_context = ApiContext::new(config.clone(), controller.clone());
    let listener = tokio::net::TcpListener::bind(args.http_address).await?;

    info!("validator API listening on {}", args.http_address);

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, http_api::routes(api_context)).await {
            warn!("validator API stopped: {error}");
        }
    });

    let ticks = async {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let mut tick = clock::tick_at(&config, genesis_time, now.max(genesis_time))?;

        controller.on_tick(tick.slot);

        loop {
            tick = clock::wait_for_tick_after(&config, genesis_time, tick).await?;

            if tick.is_start_of_slot() {
                controller.on_tick(tick.slot);
            }

            let service = validator_service.clone();

            match tokio::task::spawn_blocking(move || service.on_tick(tick)).await? {
                Ok(produced) => {
                    // With no transport attached there is nowhere to
                    // broadcast; everything produced was already imported
                    // locally.
                    for block in produced.blocks {
                        info!(
                            "produced block {:?} at slot {}",
                            block.signing_root(),
                            block.slot,
                        );
                    }
                }
                Err(error) => warn!("duties failed at slot {}: {error:#}", tick.slot),
            }
        }
    };

    tokio::select! {
        result = ticks => result,
        result = tokio::signal::ctrl_c() => {
            info!("shutting down");
            controller.stop();
            result.map_err(Into::into)
        }
    }
}
