pub use crate::{
    controller::{Controller, Snapshot},
    events::{Observation, OverflowPolicy, Subscriber},
    messages::BlockOutcome,
    storage::Storage,
};

mod controller;
mod events;
mod messages;
mod mutator;
mod storage;
