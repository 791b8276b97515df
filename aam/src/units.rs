//! Unit-typed sizes, adapted from `wee_alloc`'s `Bytes`/`Words` newtypes.
//!
//! `wee_alloc` additionally has a `Pages` unit for WebAssembly/OS page
//! granularity; this runtime grows its heap in word-granular chunks rather
//! than OS pages, so only `Words` and `Bytes` survive here.

use core::ops;

macro_rules! define_unit_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
        pub struct $name(pub usize);

        impl ops::Add for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self {
                $name(self.0 + rhs.0)
            }
        }

        impl ops::Sub for $name {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                $name(self.0 - rhs.0)
            }
        }

        impl ops::Mul<usize> for $name {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: usize) -> Self {
                $name(self.0 * rhs)
            }
        }
    };
}

define_unit_type!(Bytes);
define_unit_type!(Words);

impl From<Words> for Bytes {
    #[inline]
    fn from(words: Words) -> Bytes {
        Bytes(words.0 * core::mem::size_of::<i64>())
    }
}

impl From<Bytes> for Words {
    #[inline]
    fn from(bytes: Bytes) -> Words {
        Words(round_up_to(bytes.0, core::mem::size_of::<i64>()) / core::mem::size_of::<i64>())
    }
}

#[inline]
fn round_up_to(n: usize, divisor: usize) -> usize {
    debug_assert!(divisor > 0);
    ((n + divisor - 1) / divisor) * divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_bytes_round_trip_on_word_boundary() {
        let w = Words(4);
        let b: Bytes = w.into();
        assert_eq!(b, Bytes(32));
        let w2: Words = b.into();
        assert_eq!(w2, w);
    }

    #[test]
    fn bytes_to_words_rounds_up() {
        let b = Bytes(9);
        let w: Words = b.into();
        assert_eq!(w, Words(2));
    }
}
