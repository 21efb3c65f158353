// SPDX-License-Identifier: MIT

/// Implements little-endian read helpers for primitive types on BlockIO.
#[macro_export]
macro_rules! blockio_impl_primitive_read {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, offset: u64) -> BlockIOResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}

/// Implements little-endian field accessors on a byte-array wrapper.
#[macro_export]
macro_rules! sector_impl_le_fields {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[doc = concat!("Reads a little-endian `", stringify!($ty), "` starting at `pos`.")]
                #[inline(always)]
                pub fn [<$ty _at>](&self, pos: usize) -> $ty {
                    const N: usize = core::mem::size_of::<$ty>();
                    let mut raw = [0u8; N];
                    raw.copy_from_slice(&self.bytes[pos..pos + N]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )+
    };
}
