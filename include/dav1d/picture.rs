use crate::include::common::bitdepth::BitDepth;
use crate::include::common::validate::validate_input;
use crate::include::dav1d::headers::Rav1dMatrixCoefficients;
use crate::include::dav1d::headers::Rav1dPixelLayout;
use crate::src::error::Rav1dError::EINVAL;
use crate::src::error::Rav1dResult;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rav1dPictureParameters {
    pub w: usize,
    pub h: usize,
    pub layout: Rav1dPixelLayout,
    /// Bits per component: 8, 10 or 12.
    pub bpc: u8,
    pub mtrx: Rav1dMatrixCoefficients,
}

impl Rav1dPictureParameters {
    /// Chroma plane dimensions, rounded up.
    pub fn chroma_size(&self) -> (usize, usize) {
        let ss_hor = self.layout.ss_hor() as usize;
        let ss_ver = self.layout.ss_ver() as usize;
        ((self.w + ss_hor) >> ss_hor, (self.h + ss_ver) >> ss_ver)
    }

    fn plane_size(&self, pl: usize) -> (usize, usize) {
        if pl == 0 {
            (self.w, self.h)
        } else {
            self.chroma_size()
        }
    }
}

/// Borrowed input planes of a picture.
///
/// Strides are in pixels; `stride[0]` is the luma stride and `stride[1]` is
/// shared by both chroma planes.
#[derive(Clone, Copy)]
pub struct Rav1dPictureData<'a, BD: BitDepth> {
    pub data: [&'a [BD::Pixel]; 3],
    pub stride: [usize; 2],
}

/// Borrowed output planes of a picture.
pub struct Rav1dPictureDataMut<'a, BD: BitDepth> {
    pub data: [&'a mut [BD::Pixel]; 3],
    pub stride: [usize; 2],
}

fn check_planes(lens: [usize; 3], stride: [usize; 2], p: &Rav1dPictureParameters) -> Rav1dResult {
    let num_planes = if p.layout == Rav1dPixelLayout::I400 { 1 } else { 3 };
    for pl in 0..num_planes {
        let (w, h) = p.plane_size(pl);
        let stride = stride[(pl != 0) as usize];
        validate_input!((stride >= w, EINVAL))?;
        let needed = if h == 0 { 0 } else { (h - 1) * stride + w };
        validate_input!((lens[pl] >= needed, EINVAL))?;
    }
    Ok(())
}

impl<'a, BD: BitDepth> Rav1dPictureData<'a, BD> {
    pub fn validate(&self, p: &Rav1dPictureParameters) -> Rav1dResult {
        check_planes(self.data.map(|d| d.len()), self.stride, p)
    }
}

impl<'a, BD: BitDepth> Rav1dPictureDataMut<'a, BD> {
    pub fn validate(&self, p: &Rav1dPictureParameters) -> Rav1dResult {
        check_planes(
            [self.data[0].len(), self.data[1].len(), self.data[2].len()],
            self.stride,
            p,
        )
    }
}
