use crate::include::common::intops::bitdepth_from_max;
use std::fmt::Debug;

pub trait FromPrimitive<T> {
    fn from_prim(t: T) -> Self;
}

pub trait ToPrimitive<T> {
    fn to_prim(self) -> T;
}

impl<T, U> ToPrimitive<U> for T
where
    U: FromPrimitive<T>,
{
    #[inline(always)]
    fn to_prim(self) -> U {
        FromPrimitive::from_prim(self)
    }
}

macro_rules! impl_FromPrimitive {
    ($T:ty => $($U:ty),*) => {
        $(
            impl FromPrimitive<$T> for $U {
                #[inline(always)]
                fn from_prim(t: $T) -> Self {
                    t as $U
                }
            }
        )*
    };
}

impl_FromPrimitive!(u8 => u8, u16, i8, i16, i32, usize);
impl_FromPrimitive!(u16 => u8, u16, i8, i16, i32, usize);
impl_FromPrimitive!(i8 => u8, u16, i8, i16, i32, usize);
impl_FromPrimitive!(i16 => u8, u16, i8, i16, i32, usize);
impl_FromPrimitive!(i32 => u8, u16, i8, i16, i32, usize);

pub trait BitDepth: Clone + Copy + Send + Sync + Debug + 'static {
    type Pixel: Copy
        + Default
        + Ord
        + Send
        + Sync
        + Debug
        + FromPrimitive<i32>
        + ToPrimitive<i32>
        + ToPrimitive<usize>
        + 'static;

    /// Signed grain LUT entry.
    type Entry: Copy
        + Default
        + Send
        + Sync
        + Debug
        + FromPrimitive<i32>
        + ToPrimitive<i32>
        + 'static;

    fn bitdepth_max(&self) -> i32;

    fn bitdepth(&self) -> u8 {
        bitdepth_from_max(self.bitdepth_max())
    }

    /// `bitdepth - 8`, the shift between the sample domain and the 8-bit
    /// scaling/grain domain.
    fn bitdepth_min_8(&self) -> u8 {
        self.bitdepth() - 8
    }

    #[inline]
    fn iclip_pixel(&self, pixel: i32) -> Self::Pixel {
        Self::Pixel::from_prim(pixel.clamp(0, self.bitdepth_max()))
    }
}

#[cfg(feature = "bitdepth_8")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BitDepth8;

#[cfg(feature = "bitdepth_8")]
impl BitDepth for BitDepth8 {
    type Pixel = u8;

    type Entry = i8;

    fn bitdepth_max(&self) -> i32 {
        u8::MAX as i32
    }
}

/// 10 and 12-bit samples stored in `u16`.
#[cfg(feature = "bitdepth_16")]
#[derive(Clone, Copy, Debug)]
pub struct BitDepth16 {
    bitdepth_max: u16,
}

#[cfg(feature = "bitdepth_16")]
impl BitDepth16 {
    pub const fn new(bitdepth_max: u16) -> Self {
        debug_assert!(bitdepth_max == 0x3ff || bitdepth_max == 0xfff);
        Self { bitdepth_max }
    }
}

#[cfg(feature = "bitdepth_16")]
impl BitDepth for BitDepth16 {
    type Pixel = u16;

    type Entry = i16;

    fn bitdepth_max(&self) -> i32 {
        self.bitdepth_max as i32
    }
}
