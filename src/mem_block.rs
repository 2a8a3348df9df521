//! Fixed-size memory block storage shared by RAM, OAM, nametable, and
//! palette backing arrays.
//!
//! Uses a plain `[T; N]` by default; on targets where stack space is scarce
//! (wasm32, embedded `xtensa` builds) a boxed array is used instead so large
//! blocks (e.g. 8 KiB CHR RAM) don't blow the stack during construction.

use core::ops::{Deref, DerefMut};

#[cfg(any(feature = "boxed-memblock", target_arch = "wasm32", target_arch = "xtensa"))]
type Storage<T, const N: usize> = Box<[T; N]>;

#[cfg(not(any(feature = "boxed-memblock", target_arch = "wasm32", target_arch = "xtensa")))]
type Storage<T, const N: usize> = [T; N];

#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemBlock<T, const N: usize>(Storage<T, N>);

impl<T: Copy + Default, const N: usize> Default for MemBlock<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> MemBlock<T, N> {
    pub fn new() -> Self {
        #[cfg(any(feature = "boxed-memblock", target_arch = "wasm32", target_arch = "xtensa"))]
        {
            Self(Box::new([T::default(); N]))
        }
        #[cfg(not(any(feature = "boxed-memblock", target_arch = "wasm32", target_arch = "xtensa")))]
        {
            Self([T::default(); N])
        }
    }

    pub fn fill(&mut self, value: T) {
        self.0.fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0[..]
    }
}

impl<T: Copy + Default, const N: usize> Deref for MemBlock<T, N> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.0[..]
    }
}

impl<T: Copy + Default, const N: usize> DerefMut for MemBlock<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0[..]
    }
}

#[cfg(feature = "savestate-serde")]
impl<T, const N: usize> serde::Serialize for MemBlock<T, N>
where
    T: Copy + Default + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let slice = self.as_slice();
        let mut seq = serializer.serialize_seq(Some(slice.len()))?;
        for item in slice {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

#[cfg(feature = "savestate-serde")]
impl<'de, T, const N: usize> serde::Deserialize<'de> for MemBlock<T, N>
where
    T: Copy + Default + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor<T, const N: usize>(core::marker::PhantomData<T>);

        impl<'de, T, const N: usize> serde::de::Visitor<'de> for Visitor<T, N>
        where
            T: Copy + Default + serde::Deserialize<'de>,
        {
            type Value = MemBlock<T, N>;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "a sequence of length {N}")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut out = MemBlock::<T, N>::new();
                for idx in 0..N {
                    let Some(value) = seq.next_element::<T>()? else {
                        return Err(serde::de::Error::invalid_length(idx, &self));
                    };
                    out.as_mut_slice()[idx] = value;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(Visitor::<T, N>(core::marker::PhantomData))
    }
}

/// CPU-side fixed memory blocks.
pub mod cpu {
    use super::MemBlock;
    use crate::memory::cpu::INTERNAL_RAM_SIZE;

    pub type Ram = MemBlock<u8, INTERNAL_RAM_SIZE>;
}

/// PPU-side fixed memory blocks.
pub mod ppu {
    use super::MemBlock;
    use crate::memory::ppu::{OAM_SIZE, PALETTE_RAM_SIZE, SECONDARY_OAM_SIZE};

    /// 2 KiB of internal nametable RAM (CIRAM).
    pub type Ciram = MemBlock<u8, 0x0800>;
    pub type Oam = MemBlock<u8, OAM_SIZE>;
    pub type SecondaryOam = MemBlock<u8, SECONDARY_OAM_SIZE>;
    pub type PaletteRam = MemBlock<u8, PALETTE_RAM_SIZE>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_is_zeroed() {
        let block: MemBlock<u8, 16> = MemBlock::new();
        assert!(block.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn fill_sets_every_byte() {
        let mut block: MemBlock<u8, 16> = MemBlock::new();
        block.fill(0xAA);
        assert!(block.as_slice().iter().all(|&b| b == 0xAA));
    }
}
