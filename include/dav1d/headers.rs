use crate::include::common::validate::validate_input;
use crate::src::error::Rav1dError::EINVAL;
use crate::src::error::Rav1dError::ERANGE;
use crate::src::error::Rav1dResult;
use strum::EnumCount;
use strum::FromRepr;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, FromRepr, EnumCount)]
#[repr(u8)]
pub enum Rav1dPixelLayout {
    /// Monochrome
    #[default]
    I400 = 0,
    /// 4:2:0 planar
    I420 = 1,
    /// 4:2:2 planar
    I422 = 2,
    /// 4:4:4 planar
    I444 = 3,
}

impl Rav1dPixelLayout {
    pub const fn ss_hor(self) -> bool {
        matches!(self, Self::I420 | Self::I422)
    }

    pub const fn ss_ver(self) -> bool {
        matches!(self, Self::I420)
    }
}

/// A [`Rav1dPixelLayout`] that has chroma planes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromRepr, EnumCount)]
#[repr(u8)]
pub enum Rav1dPixelLayoutSubSampled {
    I420 = 0,
    I422 = 1,
    I444 = 2,
}

impl Rav1dPixelLayoutSubSampled {
    pub const fn ss_hor(self) -> bool {
        matches!(self, Self::I420 | Self::I422)
    }

    pub const fn ss_ver(self) -> bool {
        matches!(self, Self::I420)
    }
}

impl TryFrom<Rav1dPixelLayout> for Rav1dPixelLayoutSubSampled {
    type Error = ();

    fn try_from(value: Rav1dPixelLayout) -> Result<Self, Self::Error> {
        match value {
            Rav1dPixelLayout::I400 => Err(()),
            Rav1dPixelLayout::I420 => Ok(Self::I420),
            Rav1dPixelLayout::I422 => Ok(Self::I422),
            Rav1dPixelLayout::I444 => Ok(Self::I444),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rav1dMatrixCoefficients(pub u8);

impl Default for Rav1dMatrixCoefficients {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl Rav1dMatrixCoefficients {
    pub const IDENTITY: Self = Self(0);
    pub const BT709: Self = Self(1);
    pub const UNKNOWN: Self = Self(2);
    pub const BT601: Self = Self(6);
    pub const BT2020_NCL: Self = Self(9);
}

pub const RAV1D_MAX_Y_POINTS: usize = 14;
pub const RAV1D_MAX_UV_POINTS: usize = 10;

/// Film grain synthesis parameters for one frame, as decoded from the frame
/// header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rav1dFilmGrainData {
    pub seed: u32,
    pub num_y_points: u8,
    pub y_points: [[u8; 2]; RAV1D_MAX_Y_POINTS],
    pub chroma_scaling_from_luma: bool,
    pub num_uv_points: [u8; 2],
    pub uv_points: [[[u8; 2]; RAV1D_MAX_UV_POINTS]; 2],
    pub scaling_shift: u8,
    pub ar_coeff_lag: u8,
    pub ar_coeffs_y: [i8; 24],
    /// Trailing entries past the `2 * lag * (lag + 1) + 1` used ones are padding.
    pub ar_coeffs_uv: [[i8; 28]; 2],
    pub ar_coeff_shift: u8,
    pub grain_scale_shift: u8,
    pub uv_mult: [i32; 2],
    pub uv_luma_mult: [i32; 2],
    pub uv_offset: [i32; 2],
    pub overlap_flag: bool,
    pub clip_to_restricted_range: bool,
}

impl Default for Rav1dFilmGrainData {
    fn default() -> Self {
        Self {
            seed: 0,
            num_y_points: 0,
            y_points: Default::default(),
            chroma_scaling_from_luma: false,
            num_uv_points: [0; 2],
            uv_points: Default::default(),
            scaling_shift: 8,
            ar_coeff_lag: 0,
            ar_coeffs_y: [0; 24],
            ar_coeffs_uv: [[0; 28]; 2],
            ar_coeff_shift: 6,
            grain_scale_shift: 0,
            uv_mult: [0; 2],
            uv_luma_mult: [0; 2],
            uv_offset: [0; 2],
            overlap_flag: false,
            clip_to_restricted_range: false,
        }
    }
}

impl Rav1dFilmGrainData {
    /// Number of AR taps for the current lag, excluding the chroma luma tap.
    pub const fn num_pos_luma(&self) -> usize {
        let lag = self.ar_coeff_lag as usize;
        2 * lag * (lag + 1)
    }

    pub fn y_points(&self) -> &[[u8; 2]] {
        &self.y_points[..self.num_y_points as usize]
    }

    pub fn uv_points(&self, uv: usize) -> &[[u8; 2]] {
        &self.uv_points[uv][..self.num_uv_points[uv] as usize]
    }

    /// Checks the ranges the bitstream syntax guarantees.
    ///
    /// The kernels in [`crate::src::filmgrain`] assume these hold.
    pub fn validate(&self) -> Rav1dResult {
        validate_input!((self.seed <= u16::MAX as u32, ERANGE))?;
        validate_input!((self.ar_coeff_lag <= 3, EINVAL))?;
        validate_input!(((6..=9).contains(&self.ar_coeff_shift), EINVAL))?;
        validate_input!(((8..=11).contains(&self.scaling_shift), EINVAL))?;
        validate_input!((self.grain_scale_shift <= 3, EINVAL))?;
        validate_input!((self.num_y_points as usize <= RAV1D_MAX_Y_POINTS, ERANGE))?;
        validate_input!((points_increasing(self.y_points()), EINVAL))?;
        for uv in 0..2 {
            validate_input!((self.num_uv_points[uv] as usize <= RAV1D_MAX_UV_POINTS, ERANGE))?;
            validate_input!((points_increasing(self.uv_points(uv)), EINVAL))?;
            validate_input!(((-128..=127).contains(&self.uv_mult[uv]), ERANGE))?;
            validate_input!(((-128..=127).contains(&self.uv_luma_mult[uv]), ERANGE))?;
            validate_input!(((-256..=255).contains(&self.uv_offset[uv]), ERANGE))?;
        }
        Ok(())
    }
}

fn points_increasing(points: &[[u8; 2]]) -> bool {
    points.windows(2).all(|w| w[0][0] < w[1][0])
}
