use core::fmt::{Debug, Formatter, Result as FmtResult};

use blst::min_pk::{AggregateSignature, Signature as RawSignature};
use ethereum_types::H256;

use crate::{
    error::Error,
    public_key::{success, PublicKey},
    signature_bytes::SignatureBytes,
    DOMAIN_SEPARATION_TAG,
};

/// A decompressed signature.
///
/// Verification is delegated to `blst`, which runs in constant time with
/// respect to the signature bytes.
#[derive(Clone)]
pub struct Signature(RawSignature);

impl Debug for Signature {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        self.to_bytes().fmt(formatter)
    }
}

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        RawSignature::from_bytes(&bytes.0)
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl From<&Signature> for SignatureBytes {
    fn from(signature: &Signature) -> Self {
        Self(signature.0.compress())
    }
}

impl Signature {
    #[must_use]
    pub fn to_bytes(&self) -> SignatureBytes {
        self.into()
    }

    pub(crate) const fn from_raw(raw: RawSignature) -> Self {
        Self(raw)
    }

    pub fn verify(&self, message: H256, public_key: &PublicKey) -> Result<(), Error> {
        success(self.0.verify(
            true,
            message.as_bytes(),
            DOMAIN_SEPARATION_TAG,
            &[],
            public_key.as_raw(),
            false,
        ))
    }

    /// Verifies an aggregate signature over a single message.
    pub fn fast_aggregate_verify<'keys>(
        &self,
        message: H256,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
    ) -> Result<(), Error> {
        let raw_keys = public_keys
            .into_iter()
            .map(PublicKey::as_raw)
            .collect::<Vec<_>>();

        if raw_keys.is_empty() {
            return Err(Error::NoPublicKeysToAggregate);
        }

        success(self.0.fast_aggregate_verify(
            true,
            message.as_bytes(),
            DOMAIN_SEPARATION_TAG,
            &raw_keys,
        ))
    }

    /// Verifies an aggregate signature over one message per key.
    pub fn aggregate_verify<'keys>(
        &self,
        messages: impl IntoIterator<Item = H256>,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
    ) -> Result<(), Error> {
        let messages = messages.into_iter().collect::<Vec<_>>();

        let message_slices = messages
            .iter()
            .map(H256::as_bytes)
            .collect::<Vec<_>>();

        let raw_keys = public_keys
            .into_iter()
            .map(PublicKey::as_raw)
            .collect::<Vec<_>>();

        if raw_keys.is_empty() || raw_keys.len() != message_slices.len() {
            return Err(Error::VerificationFailed);
        }

        success(self.0.aggregate_verify(
            true,
            &message_slices,
            DOMAIN_SEPARATION_TAG,
            &raw_keys,
            false,
        ))
    }
}

pub fn aggregate_signatures<'signatures>(
    signatures: impl IntoIterator<Item = &'signatures Signature>,
) -> Result<Signature, Error> {
    let raw_signatures = signatures
        .into_iter()
        .map(|signature| &signature.0)
        .collect::<Vec<_>>();

    if raw_signatures.is_empty() {
        return Err(Error::NoSignaturesToAggregate);
    }

    AggregateSignature::aggregate(&raw_signatures, false)
        .map(|aggregate| Signature(aggregate.to_signature()))
        .map_err(|_| Error::InvalidSignature)
}
