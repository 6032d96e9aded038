use std::sync::Arc;

use fork_choice_control::{BlockOutcome, Controller};
use log::debug;
use types::phase0::{containers::BeaconBlock, primitives::Slot};

use crate::{
    messages::{HelloMessage, Request},
    misc::{GoodbyeReason, PeerId},
    sync_manager::{SyncManager, SyncMessage},
};

/// What the transport must do after an event was handled.
#[derive(Debug)]
pub enum P2pAction {
    SendRequest {
        peer: PeerId,
        batch_id: u64,
        request: Request,
    },
    Disconnect {
        peer: PeerId,
        reason: GoodbyeReason,
    },
}

/// Glues the sync state machine to the single writer.
///
/// Accepted block batches are fed to the writer serially and in slot order;
/// rejections are attributed back to the originating peer.
pub struct BlockSyncService {
    controller: Arc<Controller>,
    manager: SyncManager,
}

impl BlockSyncService {
    #[must_use]
    pub fn new(controller: Arc<Controller>, local: HelloMessage) -> Self {
        Self {
            controller,
            manager: SyncManager::new(local),
        }
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.manager.is_syncing()
    }

    pub fn on_connect(&mut self, peer: PeerId) -> Vec<P2pAction> {
        let messages = self.manager.on_connect(peer);
        self.carry_out(messages)
    }

    pub fn on_status(&mut self, peer: PeerId, status: HelloMessage) -> Vec<P2pAction> {
        let messages = self.manager.on_status(peer, status);
        self.carry_out(messages)
    }

    pub fn on_disconnect(&mut self, peer: PeerId) -> Vec<P2pAction> {
        let messages = self.manager.on_disconnect(peer);
        self.carry_out(messages)
    }

    pub fn on_blocks_by_range_response(
        &mut self,
        peer: PeerId,
        batch_id: u64,
        blocks: Vec<Arc<BeaconBlock>>,
    ) -> Vec<P2pAction> {
        let messages = self
            .manager
            .on_blocks_by_range_response(peer, batch_id, blocks);
        self.carry_out(messages)
    }

    pub fn on_gossip_block(&mut self, block: Arc<BeaconBlock>) -> Vec<P2pAction> {
        let parent_known = self.parent_known(&block);

        let messages = self.manager.on_gossip_block(block, parent_known);
        self.carry_out(messages)
    }

    pub fn on_tick(&mut self, slot: Slot) -> Vec<P2pAction> {
        self.refresh_local_status();

        let messages = self.manager.on_tick(slot);
        self.carry_out(messages)
    }

    fn parent_known(&self, block: &BeaconBlock) -> bool {
        // The snapshot only exposes the head, but gossip blocks extend the
        // head in the overwhelming majority of cases. Anything else goes
        // through the orphan buffer and is retried on acceptance.
        self.controller.snapshot().head_root == block.parent_root
    }

    fn refresh_local_status(&mut self) {
        let snapshot = self.controller.snapshot();

        let local = HelloMessage {
            network_id: self.manager.local_status().network_id,
            chain_id: self.manager.local_status().chain_id,
            finalized_root: snapshot.finalized_checkpoint.root,
            finalized_epoch: snapshot.finalized_checkpoint.epoch,
            head_root: snapshot.head_root,
            head_slot: snapshot.head_block.slot,
        };

        self.manager.set_local_status(local);
    }

    fn carry_out(&mut self, messages: Vec<SyncMessage>) -> Vec<P2pAction> {
        let mut actions = vec![];

        for message in messages {
            match message {
                SyncMessage::SendRequest {
                    peer,
                    batch_id,
                    request,
                } => actions.push(P2pAction::SendRequest {
                    peer,
                    batch_id,
                    request,
                }),
                SyncMessage::Disconnect { peer, reason } => {
                    actions.push(P2pAction::Disconnect { peer, reason });
                }
                SyncMessage::AcceptBlocks { origin, blocks } => {
                    actions.extend(self.import_blocks(origin, blocks));
                }
            }
        }

        actions
    }

    /// Feeds blocks to the writer in order, waiting for each outcome so that
    /// a peer's blocks are applied in strictly increasing slot order.
    fn import_blocks(
        &mut self,
        origin: Option<PeerId>,
        blocks: Vec<Arc<BeaconBlock>>,
    ) -> Vec<P2pAction> {
        let mut actions = vec![];

        for block in blocks {
            let root = block.signing_root();
            let slot = block.slot;
            let outcome = self.controller.on_block_with_outcome(block).recv();

            match outcome {
                Ok(BlockOutcome::Accepted { root }) => {
                    let released = self.manager.on_block_accepted(root);
                    actions.extend(self.carry_out(released));
                }
                Ok(BlockOutcome::Duplicate { .. }) => {}
                Ok(BlockOutcome::DelayedUntilParent { parent_root }) => {
                    debug!("block {root:?} at slot {slot} waiting for {parent_root:?}");
                }
                Ok(BlockOutcome::Rejected { reason }) => {
                    debug!("block {root:?} at slot {slot} rejected: {reason}");

                    if let Some(peer) = origin {
                        let messages = self.manager.on_block_rejected(peer);
                        actions.extend(self.carry_out(messages));
                    }
                }
                Err(_) => {
                    // The writer is shutting down.
                    break;
                }
            }
        }

        actions
    }
}
