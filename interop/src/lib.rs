//! Deterministic keys and deposits for coordinated test starts.
//!
//! <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start>

use core::num::NonZeroU64;

use anyhow::Result;
use bls::{SecretKey, SecretKeyBytes};
use genesis::{DepositTree, Incremental};
use hex_literal::hex;
use num_bigint::BigUint;
use ssz::{Hc, SszHash as _};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{DepositData, DepositMessage},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
    preset::MAX_EFFECTIVE_BALANCE,
};

const QUICK_START_ETH1_BLOCK_HASH: H256 = H256([0x42; 32]);

/// Effectively unused: the genesis time derived from this is replaced by the
/// one passed in as a parameter.
const QUICK_START_ETH1_BLOCK_TIMESTAMP: UnixSeconds = 1 << 40;

/// Encoded in binary to avoid parsing a decimal string at runtime.
const CURVE_ORDER: &[u8] =
    &hex!("73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001");

pub fn quick_start_beacon_state(
    config: &Config,
    genesis_time: UnixSeconds,
    validator_count: NonZeroU64,
) -> Result<(Hc<BeaconState>, DepositTree)> {
    let mut incremental = Incremental::new(config);

    incremental.set_eth1_timestamp(QUICK_START_ETH1_BLOCK_TIMESTAMP);

    for index in 0..validator_count.get() {
        let deposit_data = quick_start_deposit_data(config, &secret_key(index));
        incremental.add_deposit_data(deposit_data, index)?;
    }

    // > Clients must not run is_valid_genesis_state as this state is already considered valid.
    let (mut genesis_state, deposit_tree) = incremental.finish(QUICK_START_ETH1_BLOCK_HASH)?;

    genesis_state.genesis_time = genesis_time;

    Ok((genesis_state, deposit_tree))
}

#[must_use]
pub fn secret_key(validator_index: ValidatorIndex) -> SecretKey {
    let index_hash = hashing::hash_bytes(validator_index.hash_tree_root().as_bytes());
    let curve_order = BigUint::from_bytes_be(CURVE_ORDER);
    let secret_key_uint = BigUint::from_bytes_le(index_hash.as_bytes()) % curve_order;
    let unpadded = secret_key_uint.to_bytes_be();

    let mut padded = SecretKeyBytes::default();
    padded.as_mut()[SecretKeyBytes::SIZE_IN_BYTES - unpadded.len()..]
        .copy_from_slice(&unpadded);

    padded
        .try_into()
        .expect("the algorithm given in the standard produces valid secret keys")
}

#[must_use]
pub fn quick_start_deposit_data(config: &Config, secret_key: &SecretKey) -> DepositData {
    let pubkey = secret_key.to_public_key().to_bytes();
    let withdrawal_credentials = helper_functions::misc::bls_withdrawal_credentials(pubkey);
    let amount = MAX_EFFECTIVE_BALANCE;

    let mut data = DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        ..DepositData::default()
    };

    let signing_root =
        helper_functions::signing::deposit_signing_root(&data, config.genesis_fork_version);

    data.signature = secret_key.sign(signing_root).to_bytes();

    data
}

/// The message a deposit signature commits to.
#[must_use]
pub fn quick_start_deposit_message(config: &Config, secret_key: &SecretKey) -> DepositMessage {
    let data = quick_start_deposit_data(config, secret_key);
    data.into()
}

#[cfg(test)]
mod tests {
    use bls::PublicKeyBytes;

    use super::*;

    #[test]
    fn curve_order_matches_the_standard() {
        assert_eq!(
            BigUint::from_bytes_be(CURVE_ORDER).to_string(),
            "52435875175126190479447740508185965837690552500527637822603658699938581184513",
        );
    }

    // <https://github.com/ethereum/eth2.0-pm/blob/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start/keygen_10_validators.yaml>
    #[test]
    fn keypairs_match_the_standard() {
        let expected_keypairs = [
            (
                hex!("25295f0d1d592a90b333e26e85149708208e9f8e8bc18f6c77bd62f8ad7a6866"),
                hex!("a99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c"),
            ),
            (
                hex!("51d0b65185db6989ab0b560d6deed19c7ead0e24b9b6372cbecb1f26bdfad000"),
                hex!("b89bebc699769726a318c8e9971bd3171297c61aea4a6578a7a4f94b547dcba5bac16a89108b6b6a1fe3695d1a874a0b"),
            ),
            (
                hex!("315ed405fafe339603932eebe8dbfd650ce5dafa561f6928664c75db85f97857"),
                hex!("a3a32b0f8b4ddb83f1a0a853d81dd725dfe577d4f4c3db8ece52ce2b026eca84815c1a7e8e92a4de3d755733bf7e4a9b"),
            ),
            (
                hex!("25b1166a43c109cb330af8945d364722757c65ed2bfed5444b5a2f057f82d391"),
                hex!("88c141df77cd9d8d7a71a75c826c41a9c9f03c6ee1b180f3e7852f6a280099ded351b58d66e653af8e42816a4d8f532e"),
            ),
        ];

        for ((secret_bytes, public_bytes), validator_index) in
            expected_keypairs.into_iter().zip(0..)
        {
            let expected_secret_key = SecretKeyBytes::from(secret_bytes)
                .try_into()
                .expect("every secret key given in the standard is valid");
            let expected_public_key = PublicKeyBytes::from(public_bytes);

            let actual_secret_key = secret_key(validator_index);

            assert_eq!(actual_secret_key, expected_secret_key);
            assert_eq!(actual_secret_key.to_public_key().to_bytes(), expected_public_key);
        }
    }
}
