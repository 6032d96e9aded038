use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("public key bytes do not represent a valid curve point")]
    InvalidPublicKey,
    #[error("secret key bytes are zero or out of range")]
    InvalidSecretKey,
    #[error("signature bytes do not represent a valid curve point")]
    InvalidSignature,
    #[error("no public keys to aggregate")]
    NoPublicKeysToAggregate,
    #[error("no signatures to aggregate")]
    NoSignaturesToAggregate,
    #[error("signature verification failed")]
    VerificationFailed,
}
