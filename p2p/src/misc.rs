use core::fmt::{Display, Formatter, Result as FmtResult};

/// An opaque peer identifier assigned by the transport.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PeerId(pub u64);

impl Display for PeerId {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "peer{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GoodbyeReason {
    ClientShutdown,
    IrrelevantNetwork,
    Fault,
}

impl From<GoodbyeReason> for u64 {
    fn from(reason: GoodbyeReason) -> Self {
        match reason {
            GoodbyeReason::ClientShutdown => 1,
            GoodbyeReason::IrrelevantNetwork => 2,
            GoodbyeReason::Fault => 3,
        }
    }
}
