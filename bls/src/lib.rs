pub use crate::{
    error::Error,
    public_key::{aggregate_public_keys, PublicKey},
    public_key_bytes::PublicKeyBytes,
    secret_key::{SecretKey, SecretKeyBytes},
    signature::{aggregate_signatures, Signature},
    signature_bytes::SignatureBytes,
};

mod error;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod signature;
mod signature_bytes;

/// Domain separation tag for the proof-of-possession signature scheme.
const DOMAIN_SEPARATION_TAG: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";
