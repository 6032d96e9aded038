use core::fmt::{Debug, Formatter, Result as FmtResult};

use blst::{
    min_pk::{AggregatePublicKey, PublicKey as RawPublicKey},
    BLST_ERROR,
};

use crate::{error::Error, public_key_bytes::PublicKeyBytes};

/// A decompressed, subgroup-checked public key.
#[derive(Clone)]
pub struct PublicKey(RawPublicKey);

impl Debug for PublicKey {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        self.to_bytes().fmt(formatter)
    }
}

impl TryFrom<PublicKeyBytes> for PublicKey {
    type Error = Error;

    fn try_from(bytes: PublicKeyBytes) -> Result<Self, Self::Error> {
        RawPublicKey::key_validate(&bytes.0)
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey)
    }
}

impl From<&PublicKey> for PublicKeyBytes {
    fn from(public_key: &PublicKey) -> Self {
        Self(public_key.0.compress())
    }
}

impl PublicKey {
    #[must_use]
    pub fn to_bytes(&self) -> PublicKeyBytes {
        self.into()
    }

    pub(crate) const fn as_raw(&self) -> &RawPublicKey {
        &self.0
    }

    pub(crate) const fn from_raw(raw: RawPublicKey) -> Self {
        Self(raw)
    }
}

pub fn aggregate_public_keys<'keys>(
    public_keys: impl IntoIterator<Item = &'keys PublicKey>,
) -> Result<PublicKey, Error> {
    let raw_keys = public_keys
        .into_iter()
        .map(PublicKey::as_raw)
        .collect::<Vec<_>>();

    if raw_keys.is_empty() {
        return Err(Error::NoPublicKeysToAggregate);
    }

    AggregatePublicKey::aggregate(&raw_keys, false)
        .map(|aggregate| PublicKey(aggregate.to_public_key()))
        .map_err(|_| Error::InvalidPublicKey)
}

pub(crate) fn success(error: BLST_ERROR) -> Result<(), Error> {
    if error == BLST_ERROR::BLST_SUCCESS {
        Ok(())
    } else {
        Err(Error::VerificationFailed)
    }
}
