//! Randomized comparison of the film grain kernels against a plain per-region
//! model, in the style of dav1d's checkasm: both sides get identical inputs,
//! outputs must match byte for byte.
//!
//! The model keeps its own LFSR and expands scaling tables to one entry per
//! sample value, so it does not share any lookup code with the kernels.

#![cfg(all(feature = "bitdepth_8", feature = "bitdepth_16"))]

use paste::paste;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use rand::SeedableRng;
use rav1d_filmgrain::include::common::bitdepth::BitDepth;
use rav1d_filmgrain::include::common::bitdepth::FromPrimitive;
use rav1d_filmgrain::include::common::bitdepth::ToPrimitive;
use rav1d_filmgrain::src::filmgrain::new_grain_lut;
use rav1d_filmgrain::src::filmgrain::GrainLut;
use rav1d_filmgrain::src::filmgrain::GRAIN_HEIGHT;
use rav1d_filmgrain::src::filmgrain::GRAIN_WIDTH;
use rav1d_filmgrain::BitDepth16;
use rav1d_filmgrain::BitDepth8;
use rav1d_filmgrain::Rav1dFilmGrainDSPContext;
use rav1d_filmgrain::Rav1dFilmGrainData;
use rav1d_filmgrain::Rav1dPixelLayoutSubSampled;
use zerocopy::AsBytes;

const ITERATIONS: usize = 64;

fn round2(x: i32, shift: u8) -> i32 {
    if shift == 0 {
        x
    } else {
        (x + (1 << (shift - 1))) >> shift
    }
}

fn lfsr(bits: u8, state: &mut u32) -> i32 {
    let r = *state;
    let bit = (r ^ (r >> 1) ^ (r >> 3) ^ (r >> 12)) & 1;
    *state = (r >> 1) | (bit << 15);
    ((*state >> (16 - bits)) & ((1 << bits) - 1)) as i32
}

/// Scaling table with `1 << bitdepth` entries.
fn expand_scaling(points: &[[u8; 2]], bitdepth: u8) -> Vec<u8> {
    let shift_x = bitdepth - 8;
    let size = 1usize << bitdepth;
    let mut scaling = vec![0u8; size];
    if points.is_empty() {
        return scaling;
    }
    for v in &mut scaling[..(points[0][0] as usize) << shift_x] {
        *v = points[0][1];
    }
    for w in points.windows(2) {
        let (bx, by) = (w[0][0] as i32, w[0][1] as i32);
        let (ex, ey) = (w[1][0] as i32, w[1][1] as i32);
        let dx = ex - bx;
        let delta = (ey - by) * ((0x10000 + (dx >> 1)) / dx);
        let mut d = 0x8000;
        for x in 0..dx {
            scaling[((bx + x) as usize) << shift_x] = (by + (d >> 16)) as u8;
            d += delta;
        }
    }
    let last = points[points.len() - 1];
    for v in &mut scaling[(last[0] as usize) << shift_x..] {
        *v = last[1];
    }
    let pad = 1 << shift_x;
    for w in points.windows(2) {
        let bx = (w[0][0] as usize) << shift_x;
        let ex = (w[1][0] as usize) << shift_x;
        for x in (0..ex - bx).step_by(pad) {
            let range = scaling[bx + x + pad] as i32 - scaling[bx + x] as i32;
            let mut r = pad as i32 >> 1;
            for n in 1..pad {
                r += range;
                scaling[bx + x + n] = (scaling[bx + x] as i32 + (r >> shift_x)) as u8;
            }
        }
    }
    scaling
}

struct Model<'a> {
    data: &'a Rav1dFilmGrainData,
    lut: &'a [[i32; GRAIN_WIDTH]],
    grain_min: i32,
    grain_max: i32,
}

impl Model<'_> {
    fn blend(&self, old: i32, new: i32, w: [i32; 2]) -> i32 {
        round2(old * w[0] + new * w[1], 5).clamp(self.grain_min, self.grain_max)
    }

    /// Visits the block row one region at a time: interior, left seam,
    /// top seam, corner.
    fn walk(
        &self,
        pw: usize,
        bh: usize,
        row_num: usize,
        sx: usize,
        sy: usize,
        mut put: impl FnMut(usize, usize, i32),
    ) {
        let data = self.data;
        let rows = if data.overlap_flag && row_num > 0 { 2 } else { 1 };
        let mut seed = [0u32; 2];
        for i in 0..rows {
            let r = row_num - i;
            seed[i] = data.seed ^ ((((r * 37 + 178) & 0xff) << 8) | ((r * 173 + 105) & 0xff)) as u32;
        }
        let w: [[i32; 2]; 2] = if sx != 0 { [[23, 22], [0, 0]] } else { [[27, 17], [17, 27]] };
        let wy: [[i32; 2]; 2] = if sy != 0 { [[23, 22], [0, 0]] } else { [[27, 17], [17, 27]] };

        let mut offsets = [[0i32; 2]; 2];
        let bs = 32 >> sx;
        let mut bx = 0;
        while bx < pw {
            let bw = bs.min(pw - bx);
            if data.overlap_flag && bx != 0 {
                offsets[1] = offsets[0];
            }
            for i in 0..rows {
                offsets[0][i] = lfsr(8, &mut seed[i]);
            }
            let at = |ox: usize, oy: usize, x: usize, y: usize| {
                let r = offsets[ox][oy] as usize;
                let offx = 3 + (2 >> sx) * (3 + (r >> 4));
                let offy = 3 + (2 >> sy) * (3 + (r & 15));
                self.lut[offy + y + (32 >> sy) * oy][offx + x + (32 >> sx) * ox]
            };
            let ystart = if data.overlap_flag && row_num != 0 { (2 >> sy).min(bh) } else { 0 };
            let xstart = if data.overlap_flag && bx != 0 { (2 >> sx).min(bw) } else { 0 };

            for y in ystart..bh {
                for x in xstart..bw {
                    put(bx + x, y, at(0, 0, x, y));
                }
            }
            for y in ystart..bh {
                for x in 0..xstart {
                    put(bx + x, y, self.blend(at(1, 0, x, y), at(0, 0, x, y), w[x]));
                }
            }
            for y in 0..ystart {
                for x in xstart..bw {
                    put(bx + x, y, self.blend(at(0, 1, x, y), at(0, 0, x, y), wy[y]));
                }
            }
            for y in 0..ystart {
                for x in 0..xstart {
                    let top = self.blend(at(1, 1, x, y), at(0, 1, x, y), w[x]);
                    let cur = self.blend(at(1, 0, x, y), at(0, 0, x, y), w[x]);
                    put(bx + x, y, self.blend(top, cur, wy[y]));
                }
            }
            bx += bs;
        }
    }
}

fn random_points(rng: &mut StdRng, max: usize) -> ([[u8; 2]; 14], u8) {
    let n = rng.random_range(2..=max);
    let mut xs = index::sample(rng, 256, n).into_vec();
    xs.sort_unstable();
    let mut points = [[0u8; 2]; 14];
    for (p, x) in points.iter_mut().zip(xs) {
        *p = [x as u8, rng.random()];
    }
    (points, n as u8)
}

fn random_data(rng: &mut StdRng) -> Rav1dFilmGrainData {
    let (y_points, num_y_points) = random_points(rng, 14);
    let mut data = Rav1dFilmGrainData {
        seed: rng.random_range(0..=u16::MAX as u32),
        num_y_points,
        y_points,
        chroma_scaling_from_luma: rng.random_bool(0.25),
        scaling_shift: rng.random_range(8..=11),
        ar_coeff_lag: rng.random_range(0..=3),
        ar_coeff_shift: rng.random_range(6..=9),
        grain_scale_shift: rng.random_range(0..=3),
        uv_mult: [rng.random_range(-128..128), rng.random_range(-128..128)],
        uv_luma_mult: [rng.random_range(-128..128), rng.random_range(-128..128)],
        uv_offset: [rng.random_range(-256..256), rng.random_range(-256..256)],
        overlap_flag: rng.random(),
        clip_to_restricted_range: rng.random(),
        ..Default::default()
    };
    for uv in 0..2 {
        let (points, n) = random_points(rng, 10);
        data.uv_points[uv].copy_from_slice(&points[..10]);
        data.num_uv_points[uv] = n;
    }
    for c in &mut data.ar_coeffs_y {
        *c = rng.random_range(i8::MIN..=i8::MAX);
    }
    for c in data.ar_coeffs_uv.iter_mut().flatten() {
        *c = rng.random_range(i8::MIN..=i8::MAX);
    }
    data
}

fn random_lut<BD: BitDepth>(rng: &mut StdRng, bd: BD) -> (Box<GrainLut<BD::Entry>>, Vec<[i32; GRAIN_WIDTH]>) {
    let ctr = 128 << bd.bitdepth_min_8();
    let mut lut = new_grain_lut::<BD::Entry>();
    let mut model = vec![[0; GRAIN_WIDTH]; GRAIN_HEIGHT + 1];
    for (row, model_row) in lut[..GRAIN_HEIGHT].iter_mut().zip(&mut model) {
        for (g, m) in row.iter_mut().zip(model_row) {
            *m = rng.random_range(-ctr..ctr);
            *g = BD::Entry::from_prim(*m);
        }
    }
    (lut, model)
}

fn random_plane<BD: BitDepth>(rng: &mut StdRng, len: usize, bd: BD) -> (Vec<BD::Pixel>, Vec<i32>) {
    let model = (0..len)
        .map(|_| rng.random_range(0..=bd.bitdepth_max()))
        .collect::<Vec<_>>();
    let pixels = model.iter().map(|&v| BD::Pixel::from_prim(v)).collect();
    (pixels, model)
}

fn to_pixels<BD: BitDepth>(model: &[i32]) -> Vec<BD::Pixel> {
    model.iter().map(|&v| BD::Pixel::from_prim(v)).collect()
}

fn check_fgy<BD: BitDepth>(bd: BD)
where
    BD::Pixel: AsBytes,
{
    let mut rng = StdRng::seed_from_u64(0xf9_0000 + bd.bitdepth_max() as u64);
    let dsp = Rav1dFilmGrainDSPContext::<BD>::default();
    let bitdepth = bd.bitdepth();
    let bitdepth_min_8 = bd.bitdepth_min_8();
    let bitdepth_max = bd.bitdepth_max();

    for _ in 0..ITERATIONS {
        let data = random_data(&mut rng);
        let scaling = rav1d_filmgrain::generate_scaling(bitdepth, data.y_points());
        let expanded = expand_scaling(data.y_points(), bitdepth);
        let (lut, lut_model) = random_lut(&mut rng, bd);

        let stride = 128 + rng.random_range(0..16);
        let pw = rng.random_range(1..=128);
        let bh = rng.random_range(1..=32);
        let row_num = rng.random_range(0..8);
        let (src, src_model) = random_plane(&mut rng, stride * 32, bd);

        let mut dst = vec![BD::Pixel::default(); stride * 32];
        (dsp.fgy_32x32xn)(&mut dst, &src, stride, &data, pw, &scaling, &lut, bh, row_num, bd);

        let (min, max) = if data.clip_to_restricted_range {
            (16 << bitdepth_min_8, 235 << bitdepth_min_8)
        } else {
            (0, bitdepth_max)
        };
        let model = Model {
            data: &data,
            lut: &lut_model,
            grain_min: -(128 << bitdepth_min_8),
            grain_max: (128 << bitdepth_min_8) - 1,
        };
        let mut expected = vec![0; stride * 32];
        model.walk(pw, bh, row_num, 0, 0, |x, y, grain| {
            let src = src_model[y * stride + x];
            let noise = round2(expanded[src as usize] as i32 * grain, data.scaling_shift);
            expected[y * stride + x] = (src + noise).clamp(min, max);
        });

        assert_eq!(
            dst.as_bytes(),
            to_pixels::<BD>(&expected).as_bytes(),
            "fgy {bitdepth}bpc pw={pw} bh={bh} row={row_num} data={data:?}"
        );
        for y in 0..bh {
            for &p in &dst[y * stride..][..pw] {
                let p: i32 = p.to_prim();
                assert!((min..=max).contains(&p));
            }
        }
    }
}

fn check_fguv<BD: BitDepth>(bd: BD, layout: Rav1dPixelLayoutSubSampled)
where
    BD::Pixel: AsBytes,
{
    let mut rng = StdRng::seed_from_u64(0xf9_1000 + bd.bitdepth_max() as u64 * 4 + layout as u64);
    let dsp = Rav1dFilmGrainDSPContext::<BD>::default();
    let bitdepth = bd.bitdepth();
    let bitdepth_min_8 = bd.bitdepth_min_8();
    let bitdepth_max = bd.bitdepth_max();
    let sx = layout.ss_hor() as usize;
    let sy = layout.ss_ver() as usize;

    for _ in 0..ITERATIONS {
        let data = random_data(&mut rng);
        let uv = rng.random_range(0..2);
        let is_id = rng.random_bool(0.25);
        let points = if data.chroma_scaling_from_luma {
            data.y_points()
        } else {
            data.uv_points(uv)
        };
        let scaling = rav1d_filmgrain::generate_scaling(bitdepth, points);
        let expanded = expand_scaling(points, bitdepth);
        let (lut, lut_model) = random_lut(&mut rng, bd);

        let stride = (128 >> sx) + rng.random_range(0..16);
        let pw = rng.random_range(1..=128 >> sx);
        let bh = rng.random_range(1..=32 >> sy);
        let row_num = rng.random_range(0..8);
        let (src, src_model) = random_plane(&mut rng, stride * 32, bd);
        let luma_stride = (pw << sx) + rng.random_range(0..8);
        let (luma, luma_model) = random_plane(&mut rng, luma_stride * 32, bd);

        let mut dst = vec![BD::Pixel::default(); stride * 32];
        (dsp.fguv_32x32xn[layout as usize])(
            &mut dst,
            &src,
            stride,
            &data,
            pw,
            &scaling,
            &lut,
            bh,
            row_num,
            &luma,
            luma_stride,
            uv != 0,
            is_id,
            bd,
        );

        let (min, max) = if data.clip_to_restricted_range {
            let top = if is_id { 235 } else { 240 };
            (16 << bitdepth_min_8, top << bitdepth_min_8)
        } else {
            (0, bitdepth_max)
        };
        let model = Model {
            data: &data,
            lut: &lut_model,
            grain_min: -(128 << bitdepth_min_8),
            grain_max: (128 << bitdepth_min_8) - 1,
        };
        let mut expected = vec![0; stride * 32];
        model.walk(pw, bh, row_num, sx, sy, |x, y, grain| {
            let l = (y << sy) * luma_stride + (x << sx);
            let avg = if sx != 0 {
                (luma_model[l] + luma_model[l + 1] + 1) >> 1
            } else {
                luma_model[l]
            };
            let src = src_model[y * stride + x];
            let key = if data.chroma_scaling_from_luma {
                avg
            } else {
                let combined = avg * data.uv_luma_mult[uv] + src * data.uv_mult[uv];
                ((combined >> 6) + data.uv_offset[uv] * (1 << bitdepth_min_8)).clamp(0, bitdepth_max)
            };
            let noise = round2(expanded[key as usize] as i32 * grain, data.scaling_shift);
            expected[y * stride + x] = (src + noise).clamp(min, max);
        });

        assert_eq!(
            dst.as_bytes(),
            to_pixels::<BD>(&expected).as_bytes(),
            "fguv {layout:?} {bitdepth}bpc pw={pw} bh={bh} row={row_num} uv={uv} is_id={is_id}"
        );
    }
}

fn check_generate_grain_uv<BD: BitDepth>(bd: BD, layout: Rav1dPixelLayoutSubSampled) {
    let mut rng = StdRng::seed_from_u64(0xf9_2000 + layout as u64);
    let dsp = Rav1dFilmGrainDSPContext::<BD>::default();
    let (ctr, sx, sy) = (128 << bd.bitdepth_min_8(), layout.ss_hor(), layout.ss_ver());
    let w = if sx { 44 } else { GRAIN_WIDTH };
    let h = if sy { 38 } else { GRAIN_HEIGHT };

    for _ in 0..8 {
        let data = random_data(&mut rng);
        let mut luma = new_grain_lut::<BD::Entry>();
        (dsp.generate_grain_y)(&mut luma, &data, bd);
        for is_uv in [false, true] {
            let mut a = new_grain_lut::<BD::Entry>();
            let mut b = new_grain_lut::<BD::Entry>();
            (dsp.generate_grain_uv[layout as usize])(&mut a, &luma, &data, is_uv, bd);
            (dsp.generate_grain_uv[layout as usize])(&mut b, &luma, &data, is_uv, bd);
            for y in 0..GRAIN_HEIGHT + 1 {
                for x in 0..GRAIN_WIDTH {
                    let (ga, gb): (i32, i32) = (a[y][x].to_prim(), b[y][x].to_prim());
                    assert_eq!(ga, gb);
                    if y >= h || x >= w {
                        assert_eq!(ga, 0, "({y}, {x}) outside the chroma area");
                    } else {
                        assert!((-ctr..ctr).contains(&ga));
                    }
                }
            }
        }
    }
}

macro_rules! checkasm {
    ($name:ident, $bd:expr) => {
        paste! {
            #[test]
            fn [<fgy_32x32xn_ $name>]() {
                check_fgy($bd);
            }

            #[test]
            fn [<fguv_32x32xn_420_ $name>]() {
                check_fguv($bd, Rav1dPixelLayoutSubSampled::I420);
            }

            #[test]
            fn [<fguv_32x32xn_422_ $name>]() {
                check_fguv($bd, Rav1dPixelLayoutSubSampled::I422);
            }

            #[test]
            fn [<fguv_32x32xn_444_ $name>]() {
                check_fguv($bd, Rav1dPixelLayoutSubSampled::I444);
            }

            #[test]
            fn [<generate_grain_uv_ $name>]() {
                for layout in [
                    Rav1dPixelLayoutSubSampled::I420,
                    Rav1dPixelLayoutSubSampled::I422,
                    Rav1dPixelLayoutSubSampled::I444,
                ] {
                    check_generate_grain_uv($bd, layout);
                }
            }
        }
    };
}

checkasm!(bpc8, BitDepth8);
checkasm!(bpc10, BitDepth16::new(0x3ff));
checkasm!(bpc12, BitDepth16::new(0xfff));
