use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use itertools::Itertools as _;
use log::{debug, warn};
use types::phase0::{
    containers::BeaconBlock,
    primitives::{Slot, H256},
};

use crate::{
    messages::{BeaconBlocksByRangeRequest, HelloMessage, Request},
    misc::{GoodbyeReason, PeerId},
};

const BATCH_SIZE_SLOTS: u64 = 64;
const MAX_CONCURRENT_BATCHES: usize = 4;
const BACKFILL_THRESHOLD_SLOTS: u64 = 32;
const BATCH_TIMEOUT_SLOTS: u64 = 8;
const MAX_ORPHANS: usize = 1024;

const REJECTION_PENALTY: i64 = 10;
const TIMEOUT_PENALTY: i64 = 5;
const DISCONNECT_SCORE: i64 = -30;

/// Instructions for the caller, which owns the transport and the writer.
#[derive(Debug)]
pub enum SyncMessage {
    SendRequest {
        peer: PeerId,
        batch_id: u64,
        request: Request,
    },
    Disconnect {
        peer: PeerId,
        reason: GoodbyeReason,
    },
    /// Blocks in slot order, ready to be fed to the state transition
    /// serially. `origin` is attributed for downscoring.
    AcceptBlocks {
        origin: Option<PeerId>,
        blocks: Vec<Arc<BeaconBlock>>,
    },
}

struct Peer {
    status: Option<HelloMessage>,
    score: i64,
    in_flight: usize,
}

enum BatchStatus {
    Requested { peer: PeerId, issued_at: Slot },
    /// Waiting to be reissued after a timeout or disconnect.
    Unassigned,
    Complete { peer: PeerId, blocks: Vec<Arc<BeaconBlock>> },
}

struct Batch {
    id: u64,
    start_slot: Slot,
    count: u64,
    status: BatchStatus,
}

/// The per-peer status machine and batch scheduler.
///
/// Peers move `Disconnected → Handshaking → Active`; a peer is handshaking
/// while its entry has no status. All methods are synchronous and return the
/// actions the caller must carry out, which keeps the whole machine
/// deterministic and testable.
pub struct SyncManager {
    local: HelloMessage,
    peers: HashMap<PeerId, Peer>,
    /// Outstanding and completed long-sync batches by start slot.
    batches: BTreeMap<Slot, Batch>,
    next_batch_id: u64,
    /// The next slot not yet covered by any batch.
    request_cursor: Slot,
    /// Gossip blocks whose parents have not been accepted yet.
    orphans: HashMap<H256, Vec<Arc<BeaconBlock>>>,
    tick_slot: Slot,
}

impl SyncManager {
    #[must_use]
    pub fn new(local: HelloMessage) -> Self {
        let request_cursor = local.head_slot + 1;

        Self {
            local,
            peers: HashMap::new(),
            batches: BTreeMap::new(),
            next_batch_id: 0,
            request_cursor,
            orphans: HashMap::new(),
            tick_slot: local.head_slot,
        }
    }

    /// True while long-range sync is in progress.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        !self.batches.is_empty()
    }

    #[must_use]
    pub fn local_status(&self) -> HelloMessage {
        self.local
    }

    /// Called when the canonical head or finality advances.
    pub fn set_local_status(&mut self, local: HelloMessage) {
        self.local = local;
        self.request_cursor = self.request_cursor.max(local.head_slot + 1);
    }

    pub fn on_connect(&mut self, peer: PeerId) -> Vec<SyncMessage> {
        debug!("{peer} connected, handshaking");

        self.peers.insert(
            peer,
            Peer {
                status: None,
                score: 0,
                in_flight: 0,
            },
        );

        vec![SyncMessage::SendRequest {
            peer,
            batch_id: u64::MAX,
            request: Request::Status(self.local),
        }]
    }

    pub fn on_status(&mut self, peer: PeerId, status: HelloMessage) -> Vec<SyncMessage> {
        // A different fork version means a different chain entirely.
        if status.network_id != self.local.network_id || status.chain_id != self.local.chain_id {
            debug!("{peer} is on another network, dropping");

            self.peers.remove(&peer);

            return vec![SyncMessage::Disconnect {
                peer,
                reason: GoodbyeReason::IrrelevantNetwork,
            }];
        }

        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.status = Some(status);
        }

        self.dispatch_batches()
    }

    pub fn on_disconnect(&mut self, peer: PeerId) -> Vec<SyncMessage> {
        debug!("{peer} disconnected");

        self.peers.remove(&peer);

        // Outstanding requests of the peer are reissued; no partial batches
        // are ever accepted.
        for batch in self.batches.values_mut() {
            if let BatchStatus::Requested { peer: assigned, .. } = batch.status {
                if assigned == peer {
                    batch.status = BatchStatus::Unassigned;
                }
            }
        }

        self.reissue_unassigned()
    }

    /// A full response to a range request. Partial responses are allowed
    /// (slots may be empty), but the batch completes as a whole.
    pub fn on_blocks_by_range_response(
        &mut self,
        peer: PeerId,
        batch_id: u64,
        mut blocks: Vec<Arc<BeaconBlock>>,
    ) -> Vec<SyncMessage> {
        blocks.sort_by_key(|block| block.slot);

        let Some(batch) = self
            .batches
            .values_mut()
            .find(|batch| batch.id == batch_id)
        else {
            debug!("{peer} answered unknown batch {batch_id}");
            return vec![];
        };

        let in_range = |block: &Arc<BeaconBlock>| {
            batch.start_slot <= block.slot && block.slot < batch.start_slot + batch.count
        };

        if !blocks.iter().all(in_range) {
            warn!("{peer} returned blocks outside the requested range");
            return self.downscore(peer, REJECTION_PENALTY);
        }

        batch.status = BatchStatus::Complete { peer, blocks };

        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }

        let mut messages = self.flush_complete_batches();
        messages.extend(self.dispatch_batches());
        messages
    }

    /// A gossiped block. `parent_known` is answered by the store.
    pub fn on_gossip_block(
        &mut self,
        block: Arc<BeaconBlock>,
        parent_known: bool,
    ) -> Vec<SyncMessage> {
        if parent_known {
            return vec![SyncMessage::AcceptBlocks {
                origin: None,
                blocks: vec![block],
            }];
        }

        if self.orphans.len() >= MAX_ORPHANS {
            debug!("orphan buffer full, dropping block at slot {}", block.slot);
            return vec![];
        }

        self.orphans.entry(block.parent_root).or_default().push(block);

        vec![]
    }

    /// Releases gossip blocks that were waiting for `root`.
    pub fn on_block_accepted(&mut self, root: H256) -> Vec<SyncMessage> {
        match self.orphans.remove(&root) {
            Some(mut blocks) => {
                blocks.sort_by_key(|block| block.slot);

                vec![SyncMessage::AcceptBlocks {
                    origin: None,
                    blocks,
                }]
            }
            None => vec![],
        }
    }

    /// Called when the writer rejects a block attributed to `peer`.
    pub fn on_block_rejected(&mut self, peer: PeerId) -> Vec<SyncMessage> {
        self.downscore(peer, REJECTION_PENALTY)
    }

    /// Advances the clock; times out overdue batches.
    pub fn on_tick(&mut self, slot: Slot) -> Vec<SyncMessage> {
        self.tick_slot = self.tick_slot.max(slot);

        let mut messages = vec![];
        let mut overdue_peers = vec![];

        for batch in self.batches.values_mut() {
            if let BatchStatus::Requested { peer, issued_at } = batch.status {
                if issued_at + BATCH_TIMEOUT_SLOTS < self.tick_slot {
                    debug!("batch {} timed out on {peer}", batch.id);

                    overdue_peers.push(peer);
                    batch.status = BatchStatus::Unassigned;
                }
            }
        }

        for peer in overdue_peers {
            if let Some(entry) = self.peers.get_mut(&peer) {
                entry.in_flight = entry.in_flight.saturating_sub(1);
            }

            messages.extend(self.downscore(peer, TIMEOUT_PENALTY));
        }

        messages.extend(self.reissue_unassigned());
        messages
    }

    fn downscore(&mut self, peer: PeerId, penalty: i64) -> Vec<SyncMessage> {
        let Some(entry) = self.peers.get_mut(&peer) else {
            return vec![];
        };

        entry.score -= penalty;

        if entry.score <= DISCONNECT_SCORE {
            warn!("{peer} fell below the score threshold, dropping");

            let mut messages = vec![SyncMessage::Disconnect {
                peer,
                reason: GoodbyeReason::Fault,
            }];

            messages.extend(self.on_disconnect(peer));

            return messages;
        }

        vec![]
    }

    /// Issues new batches up to the concurrency limit while peers are far
    /// enough ahead.
    fn dispatch_batches(&mut self) -> Vec<SyncMessage> {
        let Some(remote_head) = self.remote_head() else {
            return vec![];
        };

        if remote_head <= self.local.head_slot + BACKFILL_THRESHOLD_SLOTS {
            return vec![];
        }

        let mut messages = vec![];

        while self.batches.len() < MAX_CONCURRENT_BATCHES && self.request_cursor <= remote_head {
            let start_slot = self.request_cursor;
            let count = BATCH_SIZE_SLOTS.min(remote_head - start_slot + 1);

            let Some(peer) = self.pick_peer(start_slot + count - 1) else {
                break;
            };

            let batch_id = self.next_batch_id;
            self.next_batch_id += 1;
            self.request_cursor = start_slot + count;

            self.batches.insert(
                start_slot,
                Batch {
                    id: batch_id,
                    start_slot,
                    count,
                    status: BatchStatus::Requested {
                        peer,
                        issued_at: self.tick_slot,
                    },
                },
            );

            if let Some(entry) = self.peers.get_mut(&peer) {
                entry.in_flight += 1;
            }

            messages.push(SyncMessage::SendRequest {
                peer,
                batch_id,
                request: Request::BeaconBlocksByRange(BeaconBlocksByRangeRequest {
                    start_slot,
                    count,
                    step: 1,
                }),
            });
        }

        messages
    }

    /// Hands batches that lost their peer to another one.
    fn reissue_unassigned(&mut self) -> Vec<SyncMessage> {
        let unassigned = self
            .batches
            .values()
            .filter(|batch| matches!(batch.status, BatchStatus::Unassigned))
            .map(|batch| (batch.start_slot, batch.id, batch.count))
            .collect_vec();

        let mut messages = vec![];

        for (start_slot, batch_id, count) in unassigned {
            let Some(peer) = self.pick_peer(start_slot + count - 1) else {
                continue;
            };

            if let Some(batch) = self.batches.get_mut(&start_slot) {
                batch.status = BatchStatus::Requested {
                    peer,
                    issued_at: self.tick_slot,
                };
            }

            if let Some(entry) = self.peers.get_mut(&peer) {
                entry.in_flight += 1;
            }

            messages.push(SyncMessage::SendRequest {
                peer,
                batch_id,
                request: Request::BeaconBlocksByRange(BeaconBlocksByRangeRequest {
                    start_slot,
                    count,
                    step: 1,
                }),
            });
        }

        messages
    }

    /// Emits completed batches in slot order, stopping at the first gap.
    fn flush_complete_batches(&mut self) -> Vec<SyncMessage> {
        let mut messages = vec![];

        while let Some(first_start) = self.batches.keys().next().copied() {
            let is_complete = matches!(
                self.batches[&first_start].status,
                BatchStatus::Complete { .. }
            );

            if !is_complete {
                break;
            }

            let batch = self
                .batches
                .remove(&first_start)
                .expect("the key was just observed");

            let BatchStatus::Complete { peer, blocks } = batch.status else {
                unreachable!("completeness was checked above");
            };

            if !blocks.is_empty() {
                messages.push(SyncMessage::AcceptBlocks {
                    origin: Some(peer),
                    blocks,
                });
            }
        }

        messages
    }

    fn remote_head(&self) -> Option<Slot> {
        self.peers
            .values()
            .filter_map(|peer| peer.status.as_ref())
            .map(|status| status.head_slot)
            .max()
    }

    /// The least-busy active peer whose head covers `needed_slot`.
    fn pick_peer(&self, needed_slot: Slot) -> Option<PeerId> {
        self.peers
            .iter()
            .filter_map(|(peer_id, peer)| {
                let status = peer.status.as_ref()?;
                (status.head_slot >= needed_slot).then_some((peer.in_flight, *peer_id))
            })
            .min()
            .map(|(_, peer_id)| peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_status() -> HelloMessage {
        HelloMessage {
            network_id: 1,
            chain_id: 1,
            ..HelloMessage::default()
        }
    }

    fn remote_status(head_slot: Slot) -> HelloMessage {
        HelloMessage {
            head_slot,
            ..local_status()
        }
    }

    fn block_at(slot: Slot) -> Arc<BeaconBlock> {
        Arc::new(BeaconBlock {
            slot,
            ..BeaconBlock::default()
        })
    }

    fn requests_in(messages: &[SyncMessage]) -> Vec<(PeerId, Slot, u64)> {
        messages
            .iter()
            .filter_map(|message| match message {
                SyncMessage::SendRequest {
                    peer,
                    request: Request::BeaconBlocksByRange(request),
                    ..
                } => Some((*peer, request.start_slot, request.count)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn handshake_starts_with_a_status_request()  {
        let mut manager = SyncManager::new(local_status());

        let messages = manager.on_connect(PeerId(1));

        assert!(matches!(
            messages.as_slice(),
            [SyncMessage::SendRequest {
                request: Request::Status(_),
                ..
            }],
        ));
    }

    #[test]
    fn mismatched_networks_are_dropped() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));

        let messages = manager.on_status(
            PeerId(1),
            HelloMessage {
                network_id: 9,
                ..remote_status(100)
            },
        );

        assert!(matches!(
            messages.as_slice(),
            [SyncMessage::Disconnect {
                reason: GoodbyeReason::IrrelevantNetwork,
                ..
            }],
        ));
    }

    #[test]
    fn far_ahead_peers_trigger_batched_range_requests() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));

        let messages = manager.on_status(PeerId(1), remote_status(400));
        let requests = requests_in(&messages);

        assert_eq!(requests.len(), MAX_CONCURRENT_BATCHES);
        assert_eq!(requests[0].1, 1);
        assert!(manager.is_syncing());
    }

    #[test]
    fn nearby_peers_do_not_trigger_long_sync() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));

        let messages = manager.on_status(PeerId(1), remote_status(10));

        assert!(requests_in(&messages).is_empty());
        assert!(!manager.is_syncing());
    }

    #[test]
    fn responses_are_released_in_slot_order() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));
        manager.on_connect(PeerId(2));

        let messages = manager.on_status(PeerId(1), remote_status(400));
        let mut requests = requests_in(&messages);
        manager.on_status(PeerId(2), remote_status(400));

        requests.sort_by_key(|(_, start_slot, _)| *start_slot);

        // Answer the second batch first; nothing can be released yet.
        let second = requests[1];
        let batch_id_of = |manager: &SyncManager, start: Slot| manager.batches[&start].id;

        let second_id = batch_id_of(&manager, second.1);
        let released = manager.on_blocks_by_range_response(
            second.0,
            second_id,
            vec![block_at(second.1)],
        );

        assert!(released
            .iter()
            .all(|message| !matches!(message, SyncMessage::AcceptBlocks { .. })));

        // Answering the first batch releases both, in order.
        let first = requests[0];
        let first_id = batch_id_of(&manager, first.1);
        let released = manager.on_blocks_by_range_response(
            first.0,
            first_id,
            vec![block_at(first.1)],
        );

        let accepted = released
            .iter()
            .filter_map(|message| match message {
                SyncMessage::AcceptBlocks { blocks, .. } => {
                    Some(blocks.iter().map(|block| block.slot).collect_vec())
                }
                _ => None,
            })
            .collect_vec();

        assert_eq!(accepted, [vec![first.1], vec![second.1]]);
    }

    #[test]
    fn disconnecting_a_peer_reissues_its_batches() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));
        manager.on_connect(PeerId(2));

        manager.on_status(PeerId(1), remote_status(400));
        manager.on_status(PeerId(2), remote_status(400));

        let messages = manager.on_disconnect(PeerId(1));
        let requests = requests_in(&messages);

        assert!(requests.iter().all(|(peer, ..)| *peer == PeerId(2)));
        assert!(!requests.is_empty());
    }

    #[test]
    fn orphaned_gossip_blocks_wait_for_their_parent() {
        let mut manager = SyncManager::new(local_status());

        let child = block_at(7);
        let parent_root = child.parent_root;

        assert!(manager.on_gossip_block(child, false).is_empty());

        let released = manager.on_block_accepted(parent_root);

        assert!(matches!(
            released.as_slice(),
            [SyncMessage::AcceptBlocks { blocks, .. }] if blocks.len() == 1,
        ));
    }

    #[test]
    fn repeated_rejections_disconnect_the_peer() {
        let mut manager = SyncManager::new(local_status());

        manager.on_connect(PeerId(1));
        manager.on_status(PeerId(1), remote_status(10));

        let mut disconnected = false;

        for _ in 0..4 {
            let messages = manager.on_block_rejected(PeerId(1));

            if messages
                .iter()
                .any(|message| matches!(message, SyncMessage::Disconnect { .. }))
            {
                disconnected = true;
            }
        }

        assert!(disconnected);
    }
}
