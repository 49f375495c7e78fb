//! Frame-level film grain application on top of the kernels in
//! [`crate::src::filmgrain`].

#![forbid(unsafe_code)]

use crate::include::common::bitdepth::BitDepth;
use crate::include::common::validate::validate_input;
use crate::include::dav1d::headers::Rav1dFilmGrainData;
use crate::include::dav1d::headers::Rav1dMatrixCoefficients;
use crate::include::dav1d::headers::Rav1dPixelLayout;
use crate::include::dav1d::headers::Rav1dPixelLayoutSubSampled;
use crate::include::dav1d::picture::Rav1dPictureData;
use crate::include::dav1d::picture::Rav1dPictureDataMut;
use crate::include::dav1d::picture::Rav1dPictureParameters;
use crate::src::error::Rav1dError::EINVAL;
use crate::src::error::Rav1dError::ERANGE;
use crate::src::error::Rav1dResult;
use crate::src::filmgrain::GrainLut;
use crate::src::filmgrain::Rav1dFilmGrainDSPContext;
use crate::src::filmgrain::Scaling;
use crate::src::filmgrain::FG_BLOCK_SIZE;
use crate::src::filmgrain::GRAIN_HEIGHT;
use crate::src::filmgrain::GRAIN_WIDTH;
use crate::src::filmgrain::SCALING_SIZE;
use std::cmp;
use std::iter;
use std::num::NonZeroUsize;
use std::thread;
use std::thread::available_parallelism;

/// Builds the 256-entry scaling table for a piecewise-linear curve.
///
/// `points` are `(intensity, strength)` pairs with strictly increasing
/// intensities. Higher bit depths share the 8-bit table; see
/// [`crate::src::filmgrain::scale_lut`].
pub fn generate_scaling(bitdepth: u8, points: &[[u8; 2]]) -> Scaling {
    debug_assert!(matches!(bitdepth, 8 | 10 | 12));

    let mut scaling = [0; SCALING_SIZE];
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return scaling;
    };

    scaling[..first[0] as usize].fill(first[1]);

    for segment in points.windows(2) {
        let [bx, by] = segment[0].map(|v| v as i32);
        let [ex, ey] = segment[1].map(|v| v as i32);
        let dx = ex - bx;
        let dy = ey - by;
        debug_assert!(dx > 0);
        let delta = dy * ((0x10000 + (dx >> 1)) / dx);
        let mut d = 0x8000;
        for x in 0..dx {
            scaling[(bx + x) as usize] = (by + (d >> 16)) as u8;
            d += delta;
        }
    }

    scaling[last[0] as usize..].fill(last[1]);
    scaling
}

/// Per-frame grain state: scaling tables and grain LUTs for Y, U and V.
pub struct Grain<BD: BitDepth> {
    pub scaling: [Scaling; 3],
    pub grain_lut: [GrainLut<BD::Entry>; 3],
}

impl<BD: BitDepth> Grain<BD> {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            scaling: [[0; SCALING_SIZE]; 3],
            grain_lut: [[[Default::default(); GRAIN_WIDTH]; GRAIN_HEIGHT + 1]; 3],
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Rav1dGrainSettings {
    /// Worker threads for [`rav1d_apply_grain`]. 0 uses all logical
    /// processors.
    pub n_threads: u32,
}

impl Rav1dGrainSettings {
    fn num_threads(&self) -> usize {
        if self.n_threads != 0 {
            self.n_threads as usize
        } else {
            rav1d_num_logical_processors().get().clamp(1, 256)
        }
    }
}

#[cold]
fn rav1d_num_logical_processors() -> NonZeroUsize {
    available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Builds the grain LUTs and scaling tables a frame needs.
pub fn rav1d_prep_grain<BD: BitDepth>(
    dsp: &Rav1dFilmGrainDSPContext<BD>,
    data: &Rav1dFilmGrainData,
    p: &Rav1dPictureParameters,
    bd: BD,
) -> Box<Grain<BD>> {
    let mut grain = Grain::<BD>::new();
    let Grain { scaling, grain_lut } = &mut *grain;
    let bitdepth = bd.bitdepth();

    (dsp.generate_grain_y)(&mut grain_lut[0], data, bd);

    let layout = Rav1dPixelLayoutSubSampled::try_from(p.layout).ok();
    if let Some(layout) = layout {
        let (luma, chroma) = grain_lut.split_at_mut(1);
        for (pl, lut) in chroma.iter_mut().enumerate() {
            if data.num_uv_points[pl] != 0 || data.chroma_scaling_from_luma {
                (dsp.generate_grain_uv[layout as usize])(lut, &luma[0], data, pl != 0, bd);
            }
        }
    }

    if data.num_y_points != 0 || data.chroma_scaling_from_luma {
        scaling[0] = generate_scaling(bitdepth, data.y_points());
    }
    if layout.is_some() {
        for pl in 0..2 {
            if data.num_uv_points[pl] != 0 {
                scaling[1 + pl] = generate_scaling(bitdepth, data.uv_points(pl));
            }
        }
    }

    log::debug!(
        "film grain prep: seed={:#06x} lag={} y_points={} uv_points={:?} csfl={} overlap={}",
        data.seed,
        data.ar_coeff_lag,
        data.num_y_points,
        data.num_uv_points,
        data.chroma_scaling_from_luma,
        data.overlap_flag,
    );

    grain
}

fn copy_rows<P: Copy>(dst: &mut [P], src: &[P], stride: usize, w: usize, h: usize) {
    for y in 0..h {
        dst[y * stride..][..w].copy_from_slice(&src[y * stride..][..w]);
    }
}

/// Copies `h` rows of `w` luma pixels with the last column duplicated, for
/// odd widths under horizontal chroma subsampling.
fn pad_luma<P: Copy>(src: &[P], stride: usize, w: usize, h: usize) -> Vec<P> {
    let mut padded = Vec::with_capacity((w + 1) * h);
    for y in 0..h {
        let row = &src[y * stride..][..w];
        padded.extend_from_slice(row);
        padded.push(row[w - 1]);
    }
    padded
}

/// Applies grain to one 32-row luma band and its chroma band. `out` holds
/// the band's output planes, each starting at the band's first row.
fn apply_grain_band<BD: BitDepth>(
    dsp: &Rav1dFilmGrainDSPContext<BD>,
    out: &mut [&mut [BD::Pixel]; 3],
    in_: &Rav1dPictureData<BD>,
    data: &Rav1dFilmGrainData,
    p: &Rav1dPictureParameters,
    grain: &Grain<BD>,
    row: usize,
    bd: BD,
) {
    let [stride0, stride1] = in_.stride;
    let bh = cmp::min(p.h - row * FG_BLOCK_SIZE, FG_BLOCK_SIZE);
    let luma_src = &in_.data[0][row * FG_BLOCK_SIZE * stride0..];

    log::trace!("film grain band {row}: {}x{bh}", p.w);

    if data.num_y_points != 0 {
        (dsp.fgy_32x32xn)(
            &mut *out[0],
            luma_src,
            stride0,
            data,
            p.w,
            &grain.scaling[0],
            &grain.grain_lut[0],
            bh,
            row,
            bd,
        );
    } else {
        copy_rows(&mut *out[0], luma_src, stride0, p.w, bh);
    }

    let Ok(layout) = Rav1dPixelLayoutSubSampled::try_from(p.layout) else {
        return;
    };
    let ss_x = layout.ss_hor() as usize;
    let ss_y = layout.ss_ver() as usize;
    let cpw = (p.w + ss_x) >> ss_x;
    let cbh = (bh + ss_y) >> ss_y;
    let uv_off = row * FG_BLOCK_SIZE * stride1 >> ss_y;
    let is_id = p.mtrx == Rav1dMatrixCoefficients::IDENTITY;

    let padded;
    let (luma, luma_stride) = if p.w & ss_x != 0 {
        padded = pad_luma(luma_src, stride0, p.w, bh);
        (&padded[..], p.w + 1)
    } else {
        (luma_src, stride0)
    };

    for pl in 0..2 {
        let src = &in_.data[1 + pl][uv_off..];
        let scaling = if data.chroma_scaling_from_luma {
            Some(&grain.scaling[0])
        } else if data.num_uv_points[pl] != 0 {
            Some(&grain.scaling[1 + pl])
        } else {
            None
        };
        match scaling {
            Some(scaling) => (dsp.fguv_32x32xn[layout as usize])(
                &mut *out[1 + pl],
                src,
                stride1,
                data,
                cpw,
                scaling,
                &grain.grain_lut[1 + pl],
                cbh,
                row,
                luma,
                luma_stride,
                pl != 0,
                is_id,
                bd,
            ),
            None => copy_rows(&mut *out[1 + pl], src, stride1, cpw, cbh),
        }
    }
}

fn validate_frame<BD: BitDepth>(
    out: &Rav1dPictureDataMut<BD>,
    in_: &Rav1dPictureData<BD>,
    data: &Rav1dFilmGrainData,
    p: &Rav1dPictureParameters,
    bd: BD,
) -> Rav1dResult {
    validate_input!((p.bpc == bd.bitdepth(), EINVAL))?;
    validate_input!((out.stride == in_.stride, EINVAL))?;
    data.validate()?;
    in_.validate(p)?;
    out.validate(p)
}

/// Applies grain to row band `row` of a frame, using tables from
/// [`rav1d_prep_grain`].
///
/// `row` must index one of the `p.h.div_ceil(32)` bands, otherwise
/// [`ERANGE`] is returned.
pub fn rav1d_apply_grain_row<BD: BitDepth>(
    dsp: &Rav1dFilmGrainDSPContext<BD>,
    out: &mut Rav1dPictureDataMut<BD>,
    in_: &Rav1dPictureData<BD>,
    data: &Rav1dFilmGrainData,
    p: &Rav1dPictureParameters,
    grain: &Grain<BD>,
    row: usize,
    bd: BD,
) -> Rav1dResult {
    validate_frame(out, in_, data, p, bd)?;
    validate_input!((row * FG_BLOCK_SIZE < p.h, ERANGE))?;

    let [stride0, stride1] = out.stride;
    let uv_off = row * FG_BLOCK_SIZE * stride1 >> p.layout.ss_ver() as usize;
    let [y, u, v] = &mut out.data;
    let mut band = [
        &mut y[row * FG_BLOCK_SIZE * stride0..],
        u.get_mut(uv_off..).unwrap_or_default(),
        v.get_mut(uv_off..).unwrap_or_default(),
    ];
    apply_grain_band(dsp, &mut band, in_, data, p, grain, row, bd);
    Ok(())
}

/// Splits a plane into `rows` bands of `band_len` pixels. Missing planes
/// yield empty bands.
fn split_bands<P>(plane: &mut [P], band_len: usize, rows: usize) -> Vec<&mut [P]> {
    plane
        .chunks_mut(cmp::max(band_len, 1))
        .chain(iter::repeat_with(Default::default))
        .take(rows)
        .collect()
}

/// Applies film grain to a whole frame, writing `out` from `in_`.
///
/// Row bands are independent once the tables are built, so they are
/// distributed over up to `settings.n_threads` scoped threads.
pub fn rav1d_apply_grain<BD: BitDepth>(
    dsp: &Rav1dFilmGrainDSPContext<BD>,
    settings: &Rav1dGrainSettings,
    out: Rav1dPictureDataMut<BD>,
    in_: &Rav1dPictureData<BD>,
    data: &Rav1dFilmGrainData,
    p: &Rav1dPictureParameters,
    bd: BD,
) -> Rav1dResult {
    validate_input!((settings.n_threads <= 256, ERANGE))?;
    validate_frame(&out, in_, data, p, bd)?;

    if p.w == 0 || p.h == 0 {
        return Ok(());
    }

    let grain = rav1d_prep_grain(dsp, data, p, bd);

    let rows = p.h.div_ceil(FG_BLOCK_SIZE);
    let [stride0, stride1] = out.stride;
    let chroma_band_len = if p.layout == Rav1dPixelLayout::I400 {
        0
    } else {
        (FG_BLOCK_SIZE >> p.layout.ss_ver() as usize) * stride1
    };
    let [y, u, v] = out.data;
    let mut bands = split_bands(y, FG_BLOCK_SIZE * stride0, rows)
        .into_iter()
        .zip(split_bands(u, chroma_band_len, rows))
        .zip(split_bands(v, chroma_band_len, rows))
        .map(|((y, u), v)| [y, u, v])
        .collect::<Vec<_>>();

    let n_threads = cmp::min(settings.num_threads(), rows);
    log::debug!(
        "film grain: {}x{} {:?} {}bpc, {rows} bands on {n_threads} threads",
        p.w,
        p.h,
        p.layout,
        p.bpc,
    );

    let grain = &*grain;
    if n_threads <= 1 {
        for (row, band) in bands.iter_mut().enumerate() {
            apply_grain_band(dsp, band, in_, data, p, grain, row, bd);
        }
        return Ok(());
    }

    let per_thread = rows.div_ceil(n_threads);
    thread::scope(|s| {
        for (i, group) in bands.chunks_mut(per_thread).enumerate() {
            s.spawn(move || {
                for (j, band) in group.iter_mut().enumerate() {
                    let row = i * per_thread + j;
                    apply_grain_band(dsp, band, in_, data, p, grain, row, bd);
                }
            });
        }
    });

    Ok(())
}
