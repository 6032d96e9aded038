use core::num::NonZeroU64;

use easy_ext::ext;
use typenum::{NonZero, Unsigned};

#[ext(U64Ext)]
pub impl u64 {
    #[inline]
    #[must_use]
    fn prev_multiple_of(self, factor: NonZeroU64) -> Self {
        self - self % factor
    }

    #[inline]
    #[must_use]
    fn div_typenum<N: Unsigned + NonZero>(self) -> Self {
        self / N::U64
    }

    #[inline]
    #[must_use]
    fn mod_typenum<N: Unsigned + NonZero>(self) -> Self {
        self % N::U64
    }

    // `u64::isqrt` was stabilized after the toolchain this workspace pins.
    #[must_use]
    fn sqrt(self) -> Self {
        let mut candidate = self;
        let mut next = self.div_ceil(2);

        while next < candidate {
            candidate = next;
            next = (candidate + self / candidate) / 2;
        }

        candidate
    }
}

#[ext(UsizeExt)]
pub impl usize {
    #[inline]
    #[must_use]
    fn ilog2_ceil(self) -> u8 {
        self.checked_next_power_of_two()
            .map_or(Self::BITS, Self::trailing_zeros)
            .try_into()
            .expect("number of bits in usize should fit in u8")
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    #[test_case(3, 1)]
    #[test_case(4, 2)]
    #[test_case(24, 4)]
    #[test_case(25, 5)]
    #[test_case(u64::MAX, 4_294_967_295)]
    fn sqrt_rounds_down(value: u64, expected: u64) {
        assert_eq!(value.sqrt(), expected);
    }

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    #[test_case(2, 1)]
    #[test_case(3, 2)]
    #[test_case(4, 2)]
    fn ilog2_ceil_matches_next_power_of_two(value: usize, expected: u8) {
        assert_eq!(value.ilog2_ceil(), expected);
    }

    #[test_case(0, 8, 0)]
    #[test_case(7, 8, 0)]
    #[test_case(8, 8, 8)]
    #[test_case(17, 8, 16)]
    fn prev_multiple_rounds_down(value: u64, factor: u64, expected: u64) {
        let factor = NonZeroU64::new(factor).expect("factor is nonzero");
        assert_eq!(value.prev_multiple_of(factor), expected);
    }
}
