pub use crate::{
    block_sync_service::{BlockSyncService, P2pAction},
    messages::{frame, unframe, FrameError, HelloMessage, Request},
    misc::{GoodbyeReason, PeerId},
    sync_manager::{SyncManager, SyncMessage},
};

mod block_sync_service;
mod messages;
mod misc;
mod sync_manager;
