//! Slot timing.
//!
//! A slot has two ticks: one at its start, when proposals are due, and one at
//! its middle, when attestations are due. Tick computation is pure; only
//! waiting for the next tick touches the runtime.

use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use helper_functions::misc;
use thiserror::Error;
use types::{
    config::Config,
    phase0::primitives::{Epoch, Slot, UnixSeconds},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum TickKind {
    /// The start of a slot. Proposals are due.
    Propose,
    /// The middle of a slot. Attestations are due.
    Attest,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Tick {
    pub slot: Slot,
    pub kind: TickKind,
}

impl Tick {
    #[must_use]
    pub const fn start_of_slot(slot: Slot) -> Self {
        Self {
            slot,
            kind: TickKind::Propose,
        }
    }

    #[must_use]
    pub fn epoch(self) -> Epoch {
        misc::compute_epoch_at_slot(self.slot)
    }

    #[must_use]
    pub const fn is_start_of_slot(self) -> bool {
        matches!(self.kind, TickKind::Propose)
    }

    #[must_use]
    pub fn next(self) -> Self {
        match self.kind {
            TickKind::Propose => Self {
                slot: self.slot,
                kind: TickKind::Attest,
            },
            TickKind::Attest => Self::start_of_slot(self.slot + 1),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("genesis time {genesis_time} is in the future (now: {now})")]
pub struct BeforeGenesis {
    pub genesis_time: UnixSeconds,
    pub now: UnixSeconds,
}

/// The tick in effect at `now`.
pub fn tick_at(config: &Config, genesis_time: UnixSeconds, now: UnixSeconds) -> Result<Tick> {
    let elapsed = now
        .checked_sub(genesis_time)
        .ok_or(BeforeGenesis { genesis_time, now })?;

    let seconds_per_slot = config.seconds_per_slot.get();
    let slot = elapsed / seconds_per_slot;

    let kind = if elapsed % seconds_per_slot * 2 < seconds_per_slot {
        TickKind::Propose
    } else {
        TickKind::Attest
    };

    Ok(Tick { slot, kind })
}

/// The Unix time at which `tick` starts.
#[must_use]
pub fn instant_of_tick(config: &Config, genesis_time: UnixSeconds, tick: Tick) -> Duration {
    let seconds_per_slot = config.seconds_per_slot.get();
    let slot_start = genesis_time + tick.slot * seconds_per_slot;

    let offset_millis = match tick.kind {
        TickKind::Propose => 0,
        TickKind::Attest => seconds_per_slot * 1000 / 2,
    };

    Duration::from_secs(slot_start) + Duration::from_millis(offset_millis)
}

/// Sleeps until the tick after `current`, then returns it.
pub async fn wait_for_tick_after(
    config: &Config,
    genesis_time: UnixSeconds,
    current: Tick,
) -> Result<Tick> {
    let next = current.next();
    let due = instant_of_tick(config, genesis_time, next);

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;

    if let Some(remaining) = due.checked_sub(now) {
        tokio::time::sleep(remaining).await;
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, Tick { slot: 0, kind: TickKind::Propose })]
    #[test_case(2, Tick { slot: 0, kind: TickKind::Propose })]
    #[test_case(3, Tick { slot: 0, kind: TickKind::Attest })]
    #[test_case(6, Tick { slot: 1, kind: TickKind::Propose })]
    #[test_case(10, Tick { slot: 1, kind: TickKind::Attest })]
    fn ticks_partition_slots(elapsed: u64, expected: Tick) {
        let config = Config::mainnet();

        assert_eq!(
            tick_at(&config, 100, 100 + elapsed).expect("now is after genesis"),
            expected,
        );
    }

    #[test]
    fn time_before_genesis_is_an_error() {
        let config = Config::mainnet();

        assert!(tick_at(&config, 100, 99).is_err());
    }

    #[test]
    fn ticks_alternate_between_kinds() {
        let tick = Tick::start_of_slot(4);

        assert_eq!(tick.next(), Tick { slot: 4, kind: TickKind::Attest });
        assert_eq!(tick.next().next(), Tick::start_of_slot(5));
    }
}
