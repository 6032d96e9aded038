pub use crate::{
    attestation_pool::{AttestationPool, PoolError},
    bounded_pool::{BoundedPool, PoolOperation},
};

mod attestation_pool;
mod bounded_pool;

use types::phase0::containers::{AttesterSlashing, ProposerSlashing, Transfer, VoluntaryExit};

/// All pending-operation pools, shared behind one handle.
#[derive(Default)]
pub struct OperationPools {
    pub attestations: AttestationPool,
    pub proposer_slashings: BoundedPool<ProposerSlashing>,
    pub attester_slashings: BoundedPool<AttesterSlashing>,
    pub voluntary_exits: BoundedPool<VoluntaryExit>,
    pub transfers: BoundedPool<Transfer>,
}

impl OperationPools {
    /// Drops operations that finality has made useless.
    pub fn prune_below_epoch(&self, epoch: types::phase0::primitives::Epoch) {
        self.attestations.prune_below_epoch(epoch);
    }
}
