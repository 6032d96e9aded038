//! Types that do not appear in the protocol but are used across crates.

/// Which of the two attestation accumulation lists an attestation belongs in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttestationEpoch {
    Previous,
    Current,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlashingKind {
    Proposer,
    Attester,
}
