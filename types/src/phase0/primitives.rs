pub use ethereum_types::{H256, H32};

pub type Slot = u64;
pub type Epoch = u64;
pub type ShardNumber = u64;
pub type CommitteeIndex = u64;
pub type ValidatorIndex = u64;
pub type Gwei = u64;
pub type DepositIndex = u64;
pub type UnixSeconds = u64;

pub type Version = H32;
pub type DomainType = u32;

/// `domain_type ∥ fork_version ∥ 0…`, mixed into signing roots.
pub type Domain = H256;
