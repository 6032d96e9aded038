use core::fmt::{Debug, Formatter, Result as FmtResult};

use blst::min_pk::SecretKey as RawSecretKey;
use ethereum_types::H256;

use crate::{
    error::Error, public_key::PublicKey, signature::Signature, DOMAIN_SEPARATION_TAG,
};

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct SecretKeyBytes(pub [u8; Self::SIZE_IN_BYTES]);

impl SecretKeyBytes {
    pub const SIZE_IN_BYTES: usize = 32;
}

impl AsMut<[u8]> for SecretKeyBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<[u8; Self::SIZE_IN_BYTES]> for SecretKeyBytes {
    fn from(bytes: [u8; Self::SIZE_IN_BYTES]) -> Self {
        Self(bytes)
    }
}

// Secret keys are deliberately not printable.
impl Debug for SecretKeyBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("SecretKeyBytes(…)")
    }
}

pub struct SecretKey(RawSecretKey);

impl TryFrom<SecretKeyBytes> for SecretKey {
    type Error = Error;

    fn try_from(bytes: SecretKeyBytes) -> Result<Self, Self::Error> {
        RawSecretKey::from_bytes(&bytes.0)
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for SecretKey {}

impl Debug for SecretKey {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("SecretKey(…)")
    }
}

impl SecretKey {
    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_raw(self.0.sk_to_pk())
    }

    #[must_use]
    pub fn sign(&self, message: H256) -> Signature {
        Signature::from_raw(self.0.sign(message.as_bytes(), DOMAIN_SEPARATION_TAG, &[]))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    // The first interop keypair from the coordinated-start standard.
    #[test]
    fn signing_and_verification_round_trip() {
        let secret_key = SecretKey::try_from(SecretKeyBytes(hex!(
            "25295f0d1d592a90b333e26e85149708208e9f8e8bc18f6c77bd62f8ad7a6866"
        )))
        .expect("secret key is valid");

        let public_key = secret_key.to_public_key();

        assert_eq!(
            public_key.to_bytes().0,
            hex!(
                "a99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4
                 bf2d153f649f7b53359fe8b94a38e44c"
            ),
        );

        let message = H256::repeat_byte(3);
        let signature = secret_key.sign(message);

        signature
            .verify(message, &public_key)
            .expect("signature was produced with the matching key");

        signature
            .verify(H256::repeat_byte(4), &public_key)
            .expect_err("message does not match");
    }

    #[test]
    fn zero_secret_keys_are_rejected() {
        assert_eq!(
            SecretKey::try_from(SecretKeyBytes::default()).map(|_| ()),
            Err(Error::InvalidSecretKey),
        );
    }
}
