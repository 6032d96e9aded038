pub use crate::{
    attester::build_attestation_data,
    block_producer::{produce_block_body, produce_block_without_signature},
    duties::{attester_duties, proposer_duties, AttesterDuty, ProposerDuty},
    validator_service::{Produced, ValidatorService},
};

mod attester;
mod block_producer;
mod duties;
mod validator_service;
