//! Wire messages: raw SSZ bodies behind a 4-byte big-endian length prefix.

use ssz::{ContiguousList, ReadError, Ssz, SszRead as _, SszWrite as _, WriteError};
use thiserror::Error;
use typenum::U1024;
use types::phase0::primitives::{Epoch, Slot, H256};

/// The status exchanged during the handshake.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct HelloMessage {
    pub network_id: u8,
    pub chain_id: u64,
    pub finalized_root: H256,
    pub finalized_epoch: Epoch,
    pub head_root: H256,
    pub head_slot: Slot,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct GoodbyeMessage {
    pub reason: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct BeaconBlocksByRangeRequest {
    pub start_slot: Slot,
    pub count: u64,
    pub step: u64,
}

pub type BlockRootsRequest = ContiguousList<H256, U1024>;

/// A single request/response RPC call.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Request {
    Status(HelloMessage),
    Goodbye(u64),
    BeaconBlocksByRange(BeaconBlocksByRangeRequest),
    BeaconBlocksByRoot(BlockRootsRequest),
}

const STATUS_METHOD: u8 = 0;
const GOODBYE_METHOD: u8 = 1;
const BLOCKS_BY_RANGE_METHOD: u8 = 2;
const BLOCKS_BY_ROOT_METHOD: u8 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum FrameError {
    #[error("frame is shorter than its length prefix")]
    TooShort,
    #[error("frame length {length} exceeds the remaining {remaining} bytes")]
    LengthExceedsInput { length: usize, remaining: usize },
    #[error("unknown method {method}")]
    UnknownMethod { method: u8 },
    #[error("frame payload is empty")]
    EmptyPayload,
    #[error(transparent)]
    Read(#[from] ReadError),
}

impl Request {
    pub fn to_frame(&self) -> Result<Vec<u8>, WriteError> {
        let (method, body) = match self {
            Self::Status(status) => (STATUS_METHOD, status.to_ssz()?),
            Self::Goodbye(reason) => (GOODBYE_METHOD, GoodbyeMessage { reason: *reason }.to_ssz()?),
            Self::BeaconBlocksByRange(request) => (BLOCKS_BY_RANGE_METHOD, request.to_ssz()?),
            Self::BeaconBlocksByRoot(roots) => (BLOCKS_BY_ROOT_METHOD, roots.to_ssz()?),
        };

        let mut payload = Vec::with_capacity(1 + body.len());
        payload.push(method);
        payload.extend_from_slice(&body);

        Ok(frame(&payload))
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        let (method, body) = payload.split_first().ok_or(FrameError::EmptyPayload)?;

        match *method {
            STATUS_METHOD => Ok(Self::Status(HelloMessage::from_ssz(body)?)),
            GOODBYE_METHOD => Ok(Self::Goodbye(GoodbyeMessage::from_ssz(body)?.reason)),
            BLOCKS_BY_RANGE_METHOD => Ok(Self::BeaconBlocksByRange(
                BeaconBlocksByRangeRequest::from_ssz(body)?,
            )),
            BLOCKS_BY_ROOT_METHOD => {
                Ok(Self::BeaconBlocksByRoot(BlockRootsRequest::from_ssz(body)?))
            }
            method => Err(FrameError::UnknownMethod { method }),
        }
    }
}

/// Prepends the 4-byte big-endian length.
#[must_use]
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let length = u32::try_from(payload.len()).expect("payloads are far smaller than 4 GiB");

    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Splits one frame off the front of `bytes`.
/// Returns the payload and the remaining bytes.
pub fn unframe(bytes: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    let (length_bytes, rest) = bytes.split_at_checked(4).ok_or(FrameError::TooShort)?;

    let length = u32::from_be_bytes(
        length_bytes
            .try_into()
            .expect("the slice was split at 4 bytes"),
    ) as usize;

    if rest.len() < length {
        return Err(FrameError::LengthExceedsInput {
            length,
            remaining: rest.len(),
        });
    }

    Ok(rest.split_at(length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_through_frames() {
        let requests = [
            Request::Status(HelloMessage {
                network_id: 1,
                chain_id: 1,
                finalized_root: H256::repeat_byte(1),
                finalized_epoch: 2,
                head_root: H256::repeat_byte(3),
                head_slot: 95,
            }),
            Request::Goodbye(2),
            Request::BeaconBlocksByRange(BeaconBlocksByRangeRequest {
                start_slot: 32,
                count: 64,
                step: 1,
            }),
            Request::BeaconBlocksByRoot(
                [H256::repeat_byte(7)].try_into().expect("within bound"),
            ),
        ];

        for request in requests {
            let framed = request.to_frame().expect("request can be encoded");
            let (payload, rest) = unframe(&framed).expect("frame is valid");

            assert!(rest.is_empty());
            assert_eq!(Request::from_payload(payload).expect("payload is valid"), request);
        }
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let framed = frame(&[0xaa, 0xbb]);

        assert_eq!(framed, [0, 0, 0, 2, 0xaa, 0xbb]);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert_eq!(unframe(&[0, 0]), Err(FrameError::TooShort));
        assert_eq!(
            unframe(&[0, 0, 0, 5, 1]),
            Err(FrameError::LengthExceedsInput {
                length: 5,
                remaining: 1,
            }),
        );
    }
}
