// <https://notes.ethereum.org/ruKvDXl6QOW3gnqVYb8ezA> describes some of the validations that SSZ
// decoders need to perform.

use core::ops::Range;

use byteorder::ByteOrder as _;
use itertools::{Either, Itertools as _};

use crate::{
    consts::{Endianness, Offset, BYTES_PER_LENGTH_OFFSET},
    error::{ReadError, WriteError},
    porcelain::{SszRead, SszWrite},
    size::Size,
};

#[inline]
pub fn subslice(bytes: &[u8], range: Range<usize>) -> Result<&[u8], ReadError> {
    let Range { start, end } = range;
    bytes
        .get(start..end)
        .ok_or(ReadError::OffsetsNotValidSubsliceBounds {
            start,
            end,
            length: bytes.len(),
        })
}

#[inline]
pub fn read_offset(bytes: &[u8]) -> usize {
    Endianness::read_u32(bytes)
        .try_into()
        .expect("offsets fit in usize on all supported platforms")
}

#[inline]
pub fn write_offset(bytes: &mut [u8], destination: usize, offset: usize) -> Result<(), WriteError> {
    let offset = Offset::try_from(offset).map_err(|_| WriteError::OffsetTooBig { offset })?;
    Endianness::write_u32(
        &mut bytes[destination..destination + BYTES_PER_LENGTH_OFFSET],
        offset,
    );
    Ok(())
}

#[inline]
pub fn read_list<'all, T: SszRead + 'all>(
    bytes: &'all [u8],
) -> Result<impl Iterator<Item = Result<T, ReadError>> + 'all, ReadError> {
    if let Size::Fixed { size } = T::SIZE {
        let results = bytes.chunks(size).map(|chunk| T::from_ssz(chunk));

        Ok(Either::Left(results))
    } else if bytes.is_empty() {
        let results = read_variable_elements(bytes, 0)?;

        Ok(Either::Right(results))
    } else {
        let first_offset_subslice = subslice(bytes, 0..BYTES_PER_LENGTH_OFFSET)?;
        let first_offset = read_offset(first_offset_subslice);

        if first_offset % BYTES_PER_LENGTH_OFFSET != 0 {
            return Err(ReadError::ListFirstOffsetUnaligned { first_offset });
        }

        let results = read_variable_elements(bytes, first_offset)?;

        Ok(Either::Right(results))
    }
}

#[inline]
pub fn write_list<T: SszWrite>(
    bytes: &mut Vec<u8>,
    elements: impl IntoIterator<IntoIter = impl ExactSizeIterator<Item = T>>,
) -> Result<(), WriteError> {
    let elements = elements.into_iter();
    let element_count = elements.len();
    let length_before = bytes.len();

    if let Size::Fixed { size } = T::SIZE {
        let length_after = length_before + element_count * size;

        bytes.resize(length_after, 0);

        let new_bytes = &mut bytes[length_before..];

        for (element, subslice) in elements.zip(new_bytes.chunks_exact_mut(size)) {
            element.write_fixed(subslice);
        }
    } else {
        let length_with_offsets = length_before + element_count * BYTES_PER_LENGTH_OFFSET;

        bytes.resize(length_with_offsets, 0);

        for (index, element) in elements.enumerate() {
            let destination = length_before + index * BYTES_PER_LENGTH_OFFSET;
            let offset = bytes.len() - length_before;

            write_offset(bytes, destination, offset)?;

            element.write_variable(bytes)?;
        }
    }

    Ok(())
}

#[inline]
fn read_variable_elements<'all, T: SszRead + 'all>(
    bytes: &'all [u8],
    first_offset: usize,
) -> Result<impl Iterator<Item = Result<T, ReadError>> + 'all, ReadError> {
    let results = subslice(bytes, 0..first_offset)?
        .chunks_exact(BYTES_PER_LENGTH_OFFSET)
        .map(read_offset)
        .map(Ok::<_, ReadError>)
        .chain(core::iter::once(Ok(bytes.len())))
        .tuple_windows()
        .map(move |(start_result, end_result)| {
            let start: usize = start_result?;
            let end = end_result?;
            let subslice = subslice(bytes, start..end)?;
            T::from_ssz(subslice)
        });

    Ok(results)
}
