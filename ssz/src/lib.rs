// These are re-exported primarily to make `ssz_derive` work without additional dependencies.
pub use ethereum_types::H256;
pub use typenum::U1;

pub use ssz_derive::Ssz;

pub use crate::{
    bit_list::BitList,
    bit_vector::BitVector,
    consts::{Endianness, Offset, BITS_PER_BYTE, BYTES_PER_CHUNK, BYTES_PER_LENGTH_OFFSET},
    contiguous_list::ContiguousList,
    contiguous_vector::ContiguousVector,
    error::{IndexError, PushError, ReadError, WriteError},
    hc::Hc,
    merkle_tree::{mix_in_length, MerkleTree},
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    shared::{read_offset, subslice, write_offset},
    size::Size,
};

mod arrays;
mod basic;
mod bit_list;
mod bit_vector;
mod consts;
mod contiguous_list;
mod contiguous_vector;
mod error;
mod hc;
mod merkle_tree;
mod porcelain;
mod shared;
mod size;
