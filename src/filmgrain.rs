//! Film grain synthesis kernels.
//!
//! - [`generate_grain_y_rust`]: luma grain LUT (LFSR + autoregressive filter)
//! - [`generate_grain_uv_rust`]: chroma grain LUT, correlated with luma grain
//! - [`fgy_32x32xn_rust`]: apply luma grain to a row of 32x32 blocks
//! - [`fguv_32x32xn_rust`]: apply chroma grain to a row of blocks
//!
//! All kernels are generic over [`BitDepth`]; 8bpc stores `i8` grain and
//! `u8` pixels, 16bpc stores `i16` grain and `u16` pixels.

#![forbid(unsafe_code)]

use crate::include::common::bitdepth::BitDepth;
use crate::include::common::bitdepth::FromPrimitive;
use crate::include::common::bitdepth::ToPrimitive;
use crate::include::common::intops::iclip;
use crate::include::common::intops::round2;
use crate::include::dav1d::headers::Rav1dFilmGrainData;
use crate::include::dav1d::headers::Rav1dPixelLayoutSubSampled;
use crate::src::tables::dav1d_gaussian_sequence;
use std::cmp;

pub const GRAIN_WIDTH: usize = 82;
pub const GRAIN_HEIGHT: usize = 73;

pub const SUB_GRAIN_WIDTH: usize = 44;
pub const SUB_GRAIN_HEIGHT: usize = 38;

pub const FG_BLOCK_SIZE: usize = 32;

pub const SCALING_SIZE: usize = 256;

const AR_PAD: usize = 3;

/// Grain LUT. The last row is a guard row and is never written by the
/// generators.
pub type GrainLut<Entry> = [[Entry; GRAIN_WIDTH]; GRAIN_HEIGHT + 1];

/// Intensity to grain strength, in the 8-bit intensity domain.
pub type Scaling = [u8; SCALING_SIZE];

pub fn new_grain_lut<Entry: Copy + Default>() -> Box<GrainLut<Entry>> {
    Box::new([[Entry::default(); GRAIN_WIDTH]; GRAIN_HEIGHT + 1])
}

/// Advances the 16-bit LFSR and returns its top `bits` bits.
#[inline]
pub fn get_random_number(bits: u8, state: &mut u32) -> i32 {
    let r = *state;
    let bit = (r ^ (r >> 1) ^ (r >> 3) ^ (r >> 12)) & 1;
    *state = (r >> 1) | bit << 15;
    (*state >> (16 - bits) & ((1 << bits) - 1)) as i32
}

/// Per-row seeds for block offsets. `seed[0]` is the current row,
/// `seed[1]` the previous one (only used with overlap).
fn row_seed(rows: usize, row_num: usize, data: &Rav1dFilmGrainData) -> [u32; 2] {
    let mut seed = [0; 2];
    for (i, s) in seed.iter_mut().enumerate().take(rows) {
        *s = data.seed;
        *s ^= ((((row_num - i) * 37 + 178) & 0xff) << 8) as u32;
        *s ^= (((row_num - i) * 173 + 105) & 0xff) as u32;
    }
    seed
}

/// Looks up the grain strength for a sample of any bit depth.
///
/// Samples wider than 8 bits interpolate between neighboring entries, which
/// gives the same result as a table expanded to `1 << bitdepth` entries.
#[inline]
pub fn scale_lut(scaling: &Scaling, index: usize, bitdepth_min_8: u8) -> i32 {
    let x = index >> bitdepth_min_8;
    let start = scaling[x] as i32;
    if bitdepth_min_8 == 0 {
        return start;
    }
    let rem = (index - (x << bitdepth_min_8)) as i32;
    let end = scaling[cmp::min(x + 1, SCALING_SIZE - 1)] as i32;
    start + round2((end - start) * rem, bitdepth_min_8)
}

fn fill_gaussian<Entry: FromPrimitive<i32>>(row: &mut [Entry], seed: &mut u32, shift: u8) {
    for entry in row {
        let value = get_random_number(11, seed);
        *entry = Entry::from_prim(round2(dav1d_gaussian_sequence[value as usize] as i32, shift));
    }
}

/// Causal AR sum around `buf[y][x]`: rows `y - lag..y` over `x - lag..=x + lag`,
/// then row `y` over `x - lag..x`, in raster order.
fn ar_sum<Entry: Copy + ToPrimitive<i32>>(
    buf: &GrainLut<Entry>,
    y: usize,
    x: usize,
    lag: usize,
    coeffs: &[i8],
) -> i32 {
    buf[y - lag..y]
        .iter()
        .flat_map(|row| &row[x - lag..=x + lag])
        .chain(&buf[y][x - lag..x])
        .zip(coeffs)
        .map(|(&v, &c)| {
            let v: i32 = v.to_prim();
            c as i32 * v
        })
        .sum()
}

fn grain_range<BD: BitDepth>(bd: BD) -> (i32, i32) {
    let grain_ctr = 128 << bd.bitdepth_min_8();
    (-grain_ctr, grain_ctr - 1)
}

pub fn generate_grain_y_rust<BD: BitDepth>(
    buf: &mut GrainLut<BD::Entry>,
    data: &Rav1dFilmGrainData,
    bd: BD,
) {
    debug_assert!(data.ar_coeff_lag <= 3);
    debug_assert!(data.grain_scale_shift <= 3);

    let bitdepth_min_8 = bd.bitdepth_min_8();
    let mut seed = data.seed;
    let shift = 4 - bitdepth_min_8 + data.grain_scale_shift;
    let (grain_min, grain_max) = grain_range(bd);

    for row in &mut buf[..GRAIN_HEIGHT] {
        fill_gaussian(row, &mut seed, shift);
    }

    let ar_lag = data.ar_coeff_lag as usize & 3;
    if ar_lag == 0 {
        return;
    }

    for y in AR_PAD..GRAIN_HEIGHT {
        for x in AR_PAD..GRAIN_WIDTH - AR_PAD {
            let sum = ar_sum(buf, y, x, ar_lag, &data.ar_coeffs_y);
            let grain: i32 = buf[y][x].to_prim();
            let grain = grain + round2(sum, data.ar_coeff_shift);
            buf[y][x] = BD::Entry::from_prim(iclip(grain, grain_min, grain_max));
        }
    }
}

pub fn generate_grain_uv_rust<BD: BitDepth>(
    layout: Rav1dPixelLayoutSubSampled,
    buf: &mut GrainLut<BD::Entry>,
    buf_y: &GrainLut<BD::Entry>,
    data: &Rav1dFilmGrainData,
    is_uv: bool,
    bd: BD,
) {
    debug_assert!(data.ar_coeff_lag <= 3);

    let uv = is_uv as usize;
    let subx = layout.ss_hor() as usize;
    let suby = layout.ss_ver() as usize;
    let bitdepth_min_8 = bd.bitdepth_min_8();
    let mut seed = data.seed ^ if is_uv { 0x49d8 } else { 0xb524 };
    let shift = 4 - bitdepth_min_8 + data.grain_scale_shift;
    let (grain_min, grain_max) = grain_range(bd);

    let chroma_w = if subx != 0 { SUB_GRAIN_WIDTH } else { GRAIN_WIDTH };
    let chroma_h = if suby != 0 { SUB_GRAIN_HEIGHT } else { GRAIN_HEIGHT };

    for row in &mut buf[..chroma_h] {
        fill_gaussian(&mut row[..chroma_w], &mut seed, shift);
    }

    let ar_lag = data.ar_coeff_lag as usize & 3;
    let coeffs = &data.ar_coeffs_uv[uv];
    let luma_coeff = coeffs[data.num_pos_luma()] as i32;

    for y in AR_PAD..chroma_h {
        for x in AR_PAD..chroma_w - AR_PAD {
            let mut sum = ar_sum(buf, y, x, ar_lag, coeffs);

            // The center tap is the co-located luma grain.
            if data.num_y_points != 0 {
                let luma_y = ((y - AR_PAD) << suby) + AR_PAD;
                let luma_x = ((x - AR_PAD) << subx) + AR_PAD;
                let luma = buf_y[luma_y..=luma_y + suby]
                    .iter()
                    .flat_map(|row| &row[luma_x..=luma_x + subx])
                    .map(|&v| -> i32 { v.to_prim() })
                    .sum::<i32>();
                sum += round2(luma, (subx + suby) as u8) * luma_coeff;
            }

            let grain: i32 = buf[y][x].to_prim();
            let grain = grain + round2(sum, data.ar_coeff_shift);
            buf[y][x] = BD::Entry::from_prim(iclip(grain, grain_min, grain_max));
        }
    }
}

/// Overlap weights, `[subsampled][offset][old, new]`.
static OVERLAP_WEIGHTS: [[[i32; 2]; 2]; 2] = [[[27, 17], [17, 27]], [[23, 22], [0; 2]]];

/// `offsets[bx][by]` holds the random offset of the current (0) or
/// left/above (1) block.
#[inline]
fn sample_lut<Entry: Copy + ToPrimitive<i32>>(
    grain_lut: &GrainLut<Entry>,
    offsets: &[[i32; 2]; 2],
    subx: usize,
    suby: usize,
    bx: usize,
    by: usize,
    x: usize,
    y: usize,
) -> i32 {
    let randval = offsets[bx][by] as usize;
    let offx = 3 + (2 >> subx) * (3 + (randval >> 4));
    let offy = 3 + (2 >> suby) * (3 + (randval & 0xf));
    grain_lut[offy + y + (FG_BLOCK_SIZE >> suby) * by][offx + x + (FG_BLOCK_SIZE >> subx) * bx]
        .to_prim()
}

/// Walks one row of grain blocks, calling `add_noise(x, y, grain)` with the
/// (possibly overlap-blended) grain for every sample of the `pw`x`bh` row.
///
/// Blocks only read the read-only LUT, so blending with the left/above
/// block does not depend on having processed it first.
fn for_each_grain_sample<Entry: Copy + ToPrimitive<i32>>(
    data: &Rav1dFilmGrainData,
    pw: usize,
    bh: usize,
    row_num: usize,
    (subx, suby): (usize, usize),
    grain_lut: &GrainLut<Entry>,
    (grain_min, grain_max): (i32, i32),
    mut add_noise: impl FnMut(usize, usize, i32),
) {
    let rows = 1 + (data.overlap_flag && row_num > 0) as usize;
    let mut seed = row_seed(rows, row_num, data);
    let mut offsets = [[0; 2]; 2];

    let blend = |old: i32, new: i32, w: [i32; 2]| {
        iclip(round2(old * w[0] + new * w[1], 5), grain_min, grain_max)
    };
    let wx = &OVERLAP_WEIGHTS[subx];
    let wy = &OVERLAP_WEIGHTS[suby];

    let block_w = FG_BLOCK_SIZE >> subx;
    for bx in (0..pw).step_by(block_w) {
        let bw = cmp::min(block_w, pw - bx);

        if data.overlap_flag && bx != 0 {
            for i in 0..rows {
                offsets[1][i] = offsets[0][i];
            }
        }
        for i in 0..rows {
            offsets[0][i] = get_random_number(8, &mut seed[i]);
        }

        let ystart = if data.overlap_flag && row_num != 0 {
            cmp::min(2 >> suby, bh)
        } else {
            0
        };
        let xstart = if data.overlap_flag && bx != 0 {
            cmp::min(2 >> subx, bw)
        } else {
            0
        };

        let sample = |bx, by, x, y| sample_lut(grain_lut, &offsets, subx, suby, bx, by, x, y);

        for y in 0..bh {
            for x in 0..bw {
                let mut grain = sample(0, 0, x, y);
                if x < xstart {
                    grain = blend(sample(1, 0, x, y), grain, wx[x]);
                }
                if y < ystart {
                    let mut top = sample(0, 1, x, y);
                    if x < xstart {
                        top = blend(sample(1, 1, x, y), top, wx[x]);
                    }
                    grain = blend(top, grain, wy[y]);
                }
                add_noise(bx + x, y, grain);
            }
        }
    }
}

fn clip_range<BD: BitDepth>(data: &Rav1dFilmGrainData, restricted_max: i32, bd: BD) -> (i32, i32) {
    if data.clip_to_restricted_range {
        let bitdepth_min_8 = bd.bitdepth_min_8();
        (16 << bitdepth_min_8, restricted_max << bitdepth_min_8)
    } else {
        (0, bd.bitdepth_max())
    }
}

/// Applies luma grain to `bh` rows of `pw` pixels starting at `src_row`,
/// where `row_num` is the index of the 32-row band in the frame.
pub fn fgy_32x32xn_rust<BD: BitDepth>(
    dst_row: &mut [BD::Pixel],
    src_row: &[BD::Pixel],
    stride: usize,
    data: &Rav1dFilmGrainData,
    pw: usize,
    scaling: &Scaling,
    grain_lut: &GrainLut<BD::Entry>,
    bh: usize,
    row_num: usize,
    bd: BD,
) {
    debug_assert!(bh <= FG_BLOCK_SIZE);
    debug_assert!(bh <= 1 || pw <= stride);
    debug_assert!((8..=11).contains(&data.scaling_shift));

    let bitdepth_min_8 = bd.bitdepth_min_8();
    let bitdepth_max = bd.bitdepth_max();
    let (min_value, max_value) = clip_range(data, 235, bd);

    for_each_grain_sample(
        data,
        pw,
        bh,
        row_num,
        (0, 0),
        grain_lut,
        grain_range(bd),
        |x, y, grain| {
            let i = y * stride + x;
            let src: i32 = src_row[i].to_prim();
            let sc = scale_lut(scaling, cmp::min(src, bitdepth_max) as usize, bitdepth_min_8);
            let noise = round2(sc * grain, data.scaling_shift);
            dst_row[i] = BD::Pixel::from_prim(iclip(src + noise, min_value, max_value));
        },
    );
}

/// Applies chroma grain to one row of blocks of the `is_uv` plane.
///
/// `luma_row` is the co-located full-resolution luma row; it must hold
/// `pw << ss_hor` valid pixels per row. `is_id` marks identity matrix
/// coefficients, where chroma carries RGB and the restricted range ends at
/// 235 instead of 240.
pub fn fguv_32x32xn_rust<BD: BitDepth>(
    layout: Rav1dPixelLayoutSubSampled,
    dst_row: &mut [BD::Pixel],
    src_row: &[BD::Pixel],
    stride: usize,
    data: &Rav1dFilmGrainData,
    pw: usize,
    scaling: &Scaling,
    grain_lut: &GrainLut<BD::Entry>,
    bh: usize,
    row_num: usize,
    luma_row: &[BD::Pixel],
    luma_stride: usize,
    is_uv: bool,
    is_id: bool,
    bd: BD,
) {
    let sx = layout.ss_hor() as usize;
    let sy = layout.ss_ver() as usize;
    debug_assert!(bh <= FG_BLOCK_SIZE >> sy);
    debug_assert!(bh <= 1 || pw <= stride);
    debug_assert!((8..=11).contains(&data.scaling_shift));

    let uv = is_uv as usize;
    let bitdepth_min_8 = bd.bitdepth_min_8();
    let bitdepth_max = bd.bitdepth_max();
    let (min_value, max_value) = clip_range(data, if is_id { 235 } else { 240 }, bd);

    for_each_grain_sample(
        data,
        pw,
        bh,
        row_num,
        (sx, sy),
        grain_lut,
        grain_range(bd),
        |x, y, grain| {
            let luma = (y << sy) * luma_stride + (x << sx);
            let mut avg: i32 = luma_row[luma].to_prim();
            if sx != 0 {
                let right: i32 = luma_row[luma + 1].to_prim();
                avg = (avg + right + 1) >> 1;
            }

            let i = y * stride + x;
            let src: i32 = src_row[i].to_prim();
            let val: i32 = if data.chroma_scaling_from_luma {
                avg
            } else {
                let combined = avg * data.uv_luma_mult[uv] + src * data.uv_mult[uv];
                bd.iclip_pixel((combined >> 6) + data.uv_offset[uv] * (1 << bitdepth_min_8))
                    .to_prim()
            };

            let sc = scale_lut(scaling, cmp::min(val, bitdepth_max) as usize, bitdepth_min_8);
            let noise = round2(sc * grain, data.scaling_shift);
            dst_row[i] = BD::Pixel::from_prim(iclip(src + noise, min_value, max_value));
        },
    );
}

const LAYOUTS: [Rav1dPixelLayoutSubSampled; 3] = [
    Rav1dPixelLayoutSubSampled::I420,
    Rav1dPixelLayoutSubSampled::I422,
    Rav1dPixelLayoutSubSampled::I444,
];

fn generate_grain_uv_layout<BD: BitDepth, const LAYOUT: usize>(
    buf: &mut GrainLut<BD::Entry>,
    buf_y: &GrainLut<BD::Entry>,
    data: &Rav1dFilmGrainData,
    is_uv: bool,
    bd: BD,
) {
    generate_grain_uv_rust(LAYOUTS[LAYOUT], buf, buf_y, data, is_uv, bd)
}

fn fguv_32x32xn_layout<BD: BitDepth, const LAYOUT: usize>(
    dst_row: &mut [BD::Pixel],
    src_row: &[BD::Pixel],
    stride: usize,
    data: &Rav1dFilmGrainData,
    pw: usize,
    scaling: &Scaling,
    grain_lut: &GrainLut<BD::Entry>,
    bh: usize,
    row_num: usize,
    luma_row: &[BD::Pixel],
    luma_stride: usize,
    is_uv: bool,
    is_id: bool,
    bd: BD,
) {
    fguv_32x32xn_rust(
        LAYOUTS[LAYOUT],
        dst_row,
        src_row,
        stride,
        data,
        pw,
        scaling,
        grain_lut,
        bh,
        row_num,
        luma_row,
        luma_stride,
        is_uv,
        is_id,
        bd,
    )
}

pub type GenerateGrainYFn<BD> =
    fn(&mut GrainLut<<BD as BitDepth>::Entry>, &Rav1dFilmGrainData, BD);

pub type GenerateGrainUvFn<BD> = fn(
    &mut GrainLut<<BD as BitDepth>::Entry>,
    &GrainLut<<BD as BitDepth>::Entry>,
    &Rav1dFilmGrainData,
    bool,
    BD,
);

pub type Fgy32x32xnFn<BD> = fn(
    &mut [<BD as BitDepth>::Pixel],
    &[<BD as BitDepth>::Pixel],
    usize,
    &Rav1dFilmGrainData,
    usize,
    &Scaling,
    &GrainLut<<BD as BitDepth>::Entry>,
    usize,
    usize,
    BD,
);

pub type Fguv32x32xnFn<BD> = fn(
    &mut [<BD as BitDepth>::Pixel],
    &[<BD as BitDepth>::Pixel],
    usize,
    &Rav1dFilmGrainData,
    usize,
    &Scaling,
    &GrainLut<<BD as BitDepth>::Entry>,
    usize,
    usize,
    &[<BD as BitDepth>::Pixel],
    usize,
    bool,
    bool,
    BD,
);

/// Film grain kernel table. Chroma entries are indexed by
/// [`Rav1dPixelLayoutSubSampled`].
pub struct Rav1dFilmGrainDSPContext<BD: BitDepth> {
    pub generate_grain_y: GenerateGrainYFn<BD>,
    pub generate_grain_uv: [GenerateGrainUvFn<BD>; 3],
    pub fgy_32x32xn: Fgy32x32xnFn<BD>,
    pub fguv_32x32xn: [Fguv32x32xnFn<BD>; 3],
}

impl<BD: BitDepth> Clone for Rav1dFilmGrainDSPContext<BD> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<BD: BitDepth> Copy for Rav1dFilmGrainDSPContext<BD> {}

impl<BD: BitDepth> Default for Rav1dFilmGrainDSPContext<BD> {
    fn default() -> Self {
        Self {
            generate_grain_y: generate_grain_y_rust::<BD>,
            generate_grain_uv: [
                generate_grain_uv_layout::<BD, 0>,
                generate_grain_uv_layout::<BD, 1>,
                generate_grain_uv_layout::<BD, 2>,
            ],
            fgy_32x32xn: fgy_32x32xn_rust::<BD>,
            fguv_32x32xn: [
                fguv_32x32xn_layout::<BD, 0>,
                fguv_32x32xn_layout::<BD, 1>,
                fguv_32x32xn_layout::<BD, 2>,
            ],
        }
    }
}
