//! Full-pel integer search and eight-SAD partition aggregation, grounded on
//! `svt_ext_eight_sad_calculation_8x8_16x16`/`_32x32_64x64`: the base unit is
//! an 8x8 SAD, and every larger partition's SAD is a sum of its constituent
//! 8x8s rather than an independent search, so a single full-pel scan over
//! the 8x8 grid yields every partition's best match in one pass.

use crate::me::context::{SbMeContext, SearchResult};
use crate::me::hme::Plane;
use crate::me::kernels::SadKernel;
use crate::Mv;

/// Superblock partition layout: one 64x64, four 32x32, sixteen 16x16, sixty
/// four 8x8, in that enumeration order (matching [`crate::me::context::PARTITION_COUNT`]).
const SB_SIZE_8X8_UNITS: usize = 8;

/// Full-pel search window, in integer pixels, around an HME-provided
/// center.
#[derive(Clone, Copy, Debug)]
pub struct IntegerWindow {
    pub half_width: i32,
    pub half_height: i32,
}

/// Per-8x8-unit best SAD/MV, before aggregation into larger partitions.
struct EightByEightGrid {
    sad: [u32; 64],
    mv: [Mv; 64],
}

impl EightByEightGrid {
    fn new() -> Self {
        EightByEightGrid { sad: [u32::MAX; 64], mv: [Mv::ZERO; 64] }
    }
}

/// Run the full-pel refinement for one reference against one superblock,
/// writing every partition's best SAD/MV into `ctx.results[list][ref_index]`.
/// `center` is the HME cascade's full-resolution search center, in pixels.
pub fn refine_full_pel<K: SadKernel>(
    kernel: &K,
    src: &Plane,
    reference: &Plane,
    sb_origin: (i32, i32),
    center: (i32, i32),
    window: IntegerWindow,
    ctx: &mut SbMeContext,
    list: usize,
    ref_index: usize,
) {
    let mut grid = EightByEightGrid::new();

    let x_lo = (center.0 - window.half_width).max(0);
    let x_hi = (center.0 + window.half_width).min(reference.width - 8);
    let y_lo = (center.1 - window.half_height).max(0);
    let y_hi = (center.1 + window.half_height).min(reference.height - 8);

    for unit_y in 0..SB_SIZE_8X8_UNITS {
        for unit_x in 0..SB_SIZE_8X8_UNITS {
            let block_src_x = sb_origin.0 + (unit_x * 8) as i32;
            let block_src_y = sb_origin.1 + (unit_y * 8) as i32;
            if block_src_x + 8 > src.width || block_src_y + 8 > src.height {
                continue;
            }
            let src_block = &src.data[(block_src_y as usize * src.stride + block_src_x as usize)..];
            let unit_index = unit_y * SB_SIZE_8X8_UNITS + unit_x;

            let mut y = y_lo;
            while y <= y_hi {
                let mut x = x_lo;
                while x <= x_hi {
                    let ref_offset = y as usize * reference.stride + x as usize;
                    let sad = kernel.sad(src_block, src.stride, &reference.data[ref_offset..], reference.stride, 8, 8);
                    if sad < grid.sad[unit_index] {
                        grid.sad[unit_index] = sad;
                        grid.mv[unit_index] = Mv::new((x - block_src_x) * 4, (y - block_src_y) * 4);
                    }
                    x += 1;
                }
                y += 1;
            }
        }
    }

    write_partition_results(&grid, ctx, list, ref_index);
}

/// Partition index layout within [`crate::me::context::PARTITION_COUNT`]:
/// `0` is the 64x64, `1..5` are the four 32x32 quadrants, `5..21` are the
/// sixteen 16x16 blocks, `21..85` are the sixty-four 8x8 blocks, all in
/// raster order within their size class.
fn write_partition_results(grid: &EightByEightGrid, ctx: &mut SbMeContext, list: usize, ref_index: usize) {
    let out = &mut ctx.results[list][ref_index];

    for unit in 0..64 {
        out[21 + unit] = SearchResult { best_sad: grid.sad[unit], best_mv: grid.mv[unit] };
    }

    for block16 in 0..16 {
        let (bx, by) = (block16 % 4, block16 / 4);
        let units = [
            (2 * bx) + (2 * by) * 8,
            (2 * bx + 1) + (2 * by) * 8,
            (2 * bx) + (2 * by + 1) * 8,
            (2 * bx + 1) + (2 * by + 1) * 8,
        ];
        let sad: u32 = units.iter().map(|&u| grid.sad[u]).sum();
        let best_unit = units.iter().copied().min_by_key(|&u| grid.sad[u]).unwrap();
        out[5 + block16] = SearchResult { best_sad: sad, best_mv: grid.mv[best_unit] };
    }

    for block32 in 0..4 {
        let (bx, by) = (block32 % 2, block32 / 2);
        let sixteens = [
            (2 * bx) + (2 * by) * 4,
            (2 * bx + 1) + (2 * by) * 4,
            (2 * bx) + (2 * by + 1) * 4,
            (2 * bx + 1) + (2 * by + 1) * 4,
        ];
        let sad: u32 = sixteens.iter().map(|&s| out[5 + s].best_sad).sum();
        let best16 = sixteens.iter().copied().min_by_key(|&s| out[5 + s].best_sad).unwrap();
        out[1 + block32] = SearchResult { best_sad: sad, best_mv: out[5 + best16].best_mv };
    }

    let sad64: u32 = (0..4).map(|b| out[1 + b].best_sad).sum();
    let best64 = (0..4).min_by_key(|&b| out[1 + b].best_sad).unwrap();
    out[0] = SearchResult { best_sad: sad64, best_mv: out[1 + best64].best_mv };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::me::kernels::ScalarSadKernel;

    fn flat_plane(w: i32, h: i32, value: u8) -> Vec<u8> {
        vec![value; (w * h) as usize]
    }

    #[test]
    fn sixty_four_by_sixty_four_sad_is_sum_of_quadrants() {
        let kernel = ScalarSadKernel;
        let src_data = flat_plane(64, 64, 100);
        let ref_data = flat_plane(96, 96, 100);
        let src = Plane { data: &src_data, stride: 64, width: 64, height: 64 };
        let reference = Plane { data: &ref_data, stride: 96, width: 96, height: 96 };
        let mut ctx = SbMeContext::new(0, 0, [1, 0]);
        refine_full_pel(&kernel, &src, &reference, (0, 0), (16, 16), IntegerWindow { half_width: 4, half_height: 4 }, &mut ctx, 0, 0);
        assert_eq!(ctx.results[0][0][0].best_sad, 0);
    }

    #[test]
    fn eight_by_eight_results_feed_sixteen_by_sixteen_aggregate() {
        let kernel = ScalarSadKernel;
        let src_data = flat_plane(64, 64, 50);
        let mut ref_data = flat_plane(96, 96, 10);
        for y in 0..16 {
            for x in 0..16 {
                ref_data[y * 96 + x] = 50;
            }
        }
        let src = Plane { data: &src_data, stride: 64, width: 64, height: 64 };
        let reference = Plane { data: &ref_data, stride: 96, width: 96, height: 96 };
        let mut ctx = SbMeContext::new(0, 0, [1, 0]);
        refine_full_pel(&kernel, &src, &reference, (0, 0), (8, 8), IntegerWindow { half_width: 8, half_height: 8 }, &mut ctx, 0, 0);
        assert_eq!(ctx.results[0][0][5].best_sad, 0);
    }
}
