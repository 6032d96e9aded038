pub use self::{
    block_processing::{custom_process_block, process_deposit_data},
    epoch_processing::{compute_compact_committees_root, process_epoch},
    slot_processing::{process_slot, process_slots},
    state_transition::{
        state_transition, trusted_state_transition, untrusted_state_transition, StateRootPolicy,
    },
};

pub mod epoch_intermediates;

mod block_processing;
mod epoch_processing;
mod slot_processing;
mod state_transition;
