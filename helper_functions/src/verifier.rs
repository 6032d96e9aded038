use anyhow::Result;
use bls::{PublicKey, PublicKeyBytes, Signature, SignatureBytes};
use thiserror::Error;
use types::phase0::primitives::H256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SignatureKind {
    Attestation,
    Block,
    Deposit,
    Randao,
    Transfer,
    VoluntaryExit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("{kind:?} signature is invalid")]
pub struct SignatureInvalid {
    pub kind: SignatureKind,
}

/// The seam through which the state transition verifies signatures.
///
/// Protocol-conformant paths use [`SingleVerifier`]. [`NullVerifier`] exists
/// for replaying blocks that were fully verified before being persisted; it
/// cannot affect state roots because signatures are never part of them.
pub trait Verifier {
    const IS_NULL: bool = false;

    fn verify_singular(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()>;

    fn verify_aggregate(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_keys: &[PublicKeyBytes],
        kind: SignatureKind,
    ) -> Result<()>;
}

impl<V: Verifier> Verifier for &mut V {
    const IS_NULL: bool = V::IS_NULL;

    fn verify_singular(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()> {
        V::verify_singular(self, message, signature, public_key, kind)
    }

    fn verify_aggregate(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_keys: &[PublicKeyBytes],
        kind: SignatureKind,
    ) -> Result<()> {
        V::verify_aggregate(self, message, signature, public_keys, kind)
    }
}

pub struct SingleVerifier;

impl Verifier for SingleVerifier {
    fn verify_singular(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()> {
        let public_key =
            PublicKey::try_from(public_key).map_err(|_| SignatureInvalid { kind })?;
        let signature = Signature::try_from(signature).map_err(|_| SignatureInvalid { kind })?;

        signature
            .verify(message, &public_key)
            .map_err(|_| SignatureInvalid { kind })?;

        Ok(())
    }

    fn verify_aggregate(
        &mut self,
        message: H256,
        signature: SignatureBytes,
        public_keys: &[PublicKeyBytes],
        kind: SignatureKind,
    ) -> Result<()> {
        let public_keys = public_keys
            .iter()
            .map(|bytes| PublicKey::try_from(*bytes))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SignatureInvalid { kind })?;

        let signature = Signature::try_from(signature).map_err(|_| SignatureInvalid { kind })?;

        signature
            .fast_aggregate_verify(message, &public_keys)
            .map_err(|_| SignatureInvalid { kind })?;

        Ok(())
    }
}

pub struct NullVerifier;

impl Verifier for NullVerifier {
    const IS_NULL: bool = true;

    fn verify_singular(
        &mut self,
        _message: H256,
        _signature: SignatureBytes,
        _public_key: PublicKeyBytes,
        _kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }

    fn verify_aggregate(
        &mut self,
        _message: H256,
        _signature: SignatureBytes,
        _public_keys: &[PublicKeyBytes],
        _kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }
}
