//! Hierarchical Motion Estimation: a three-level coarse-to-fine cascade run
//! on downsampled reference pictures (1/16, 1/4, full) before the full-pel
//! integer search ever runs, grounded on `hme_level_0`/`hme_level_1` in
//! `EbMotionEstimation.c`. Each level does an exhaustive SAD search over a
//! clamped window and hands its winning center, scaled back up to
//! quarter-pel units, down to the next level.

use crate::config::PreHmeConfig;
use crate::me::context::HmeSearchCenter;
use crate::me::kernels::SadKernel;

/// A single downsampled reference plane: 8-bit luma, known dimensions.
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub width: i32,
    pub height: i32,
}

/// One cascade level's search-area shape, already resolved from percentage
/// parameters into an absolute half-width/half-height window around the
/// previous level's center.
#[derive(Clone, Copy, Debug)]
pub struct SearchWindow {
    pub half_width: i32,
    pub half_height: i32,
}

/// Clamp a candidate `[origin, origin+extent)` window so it stays fully
/// inside `[0, bound)`, shrinking `extent` rather than the origin once it's
/// pinned against the far edge. Mirrors the repeated left/right (and
/// top/bottom) edge-correction pairs in `hme_level_0`.
fn clamp_window(origin: i32, extent: i32, bound: i32) -> (i32, i32) {
    let origin = origin.max(0);
    let max_extent = (bound - origin).max(1);
    (origin, extent.min(max_extent))
}

/// Exhaustive SAD search of `block` (taken from `src` at `block_origin`,
/// size `block_w`x`block_h`) over every integer offset in the window
/// `[center - half, center + half]` clamped to `reference`'s bounds.
fn exhaustive_search<K: SadKernel>(
    kernel: &K,
    src: &Plane,
    block_origin: (i32, i32),
    block_w: i32,
    block_h: i32,
    reference: &Plane,
    center: (i32, i32),
    window: SearchWindow,
) -> HmeSearchCenter {
    let (sx, sy) = block_origin;
    let src_block = &src.data[(sy as usize * src.stride + sx as usize)..];

    let (x_origin, x_extent) = clamp_window(center.0 - window.half_width, 2 * window.half_width + 1, reference.width - block_w + 1);
    let (y_origin, y_extent) = clamp_window(center.1 - window.half_height, 2 * window.half_height + 1, reference.height - block_h + 1);

    let mut best = HmeSearchCenter { x: x_origin as i16, y: y_origin as i16, sad: u32::MAX };
    for y in y_origin..y_origin + y_extent {
        for x in x_origin..x_origin + x_extent {
            let ref_offset = y as usize * reference.stride + x as usize;
            let sad = kernel.sad(src_block, src.stride, &reference.data[ref_offset..], reference.stride, block_w as usize, block_h as usize);
            if sad < best.sad {
                best = HmeSearchCenter { x: x as i16, y: y as i16, sad };
            }
        }
    }
    best
}

/// Run the three-level cascade. `planes` holds references at 1/16, 1/4 and
/// full resolution (in that search order); `windows` holds each level's
/// search window, already sized for that plane's resolution. Returns the
/// final, full-resolution-scaled search center.
pub fn run_cascade<K: SadKernel>(
    kernel: &K,
    src_full: &Plane,
    block_origin_full: (i32, i32),
    block_w: i32,
    block_h: i32,
    planes: [&Plane; 3],
    windows: [SearchWindow; 3],
) -> HmeSearchCenter {
    // Level 0 operates at 1/16 resolution: both the block location and the
    // block itself must be scaled down to match.
    let l0_origin = (block_origin_full.0 / 16, block_origin_full.1 / 16);
    let l0_block_w = (block_w / 16).max(1);
    let l0_block_h = (block_h / 16).max(1);
    let l0_src = Plane { data: src_full.data, stride: src_full.stride, width: src_full.width, height: src_full.height };
    let l0 = exhaustive_search(kernel, &l0_src, l0_origin, l0_block_w, l0_block_h, planes[0], (0, 0), windows[0]);
    let l0_center_q4 = (l0.x as i32 * 4, l0.y as i32 * 4);

    let l1_origin = (block_origin_full.0 / 4, block_origin_full.1 / 4);
    let l1_block_w = (block_w / 4).max(1);
    let l1_block_h = (block_h / 4).max(1);
    let l1 = exhaustive_search(kernel, &l0_src, l1_origin, l1_block_w, l1_block_h, planes[1], l0_center_q4, windows[1]);
    let l1_center_full = (l1.x as i32 * 4, l1.y as i32 * 4);

    let l2 = exhaustive_search(kernel, src_full, block_origin_full, block_w, block_h, planes[2], l1_center_full, windows[2]);
    HmeSearchCenter { x: l2.x, y: l2.y, sad: l2.sad }
}

/// Pre-HME: an extra Level-0 search pass over configured region offsets,
/// run after the normal quadrant cascade has already populated `quadrants`
/// (one search center per 32x32 quadrant of the superblock). Only ever
/// replaces the single worst-SAD quadrant, and only when a configured-region
/// search beats it outright — every other quadrant is left untouched even
/// when a region search finds a better match there too, since Pre-HME exists
/// to rescue the one quadrant the ordinary cascade did worst on, not to
/// re-rank all four.
#[allow(clippy::too_many_arguments)]
pub fn run_pre_hme<K: SadKernel>(
    kernel: &K,
    l0_src: &Plane,
    l0_origin: (i32, i32),
    l0_block_w: i32,
    l0_block_h: i32,
    level0_reference: &Plane,
    quadrants: &mut [HmeSearchCenter; 4],
    cfg: &PreHmeConfig,
    window: SearchWindow,
) {
    if !cfg.enable || cfg.region_count == 0 {
        return;
    }

    let mut best: Option<HmeSearchCenter> = None;
    for &(dx, dy) in cfg.region_offsets.iter().take(cfg.region_count as usize) {
        let center = (l0_origin.0 + dx, l0_origin.1 + dy);
        let result = exhaustive_search(kernel, l0_src, l0_origin, l0_block_w, l0_block_h, level0_reference, center, window);
        if best.map_or(true, |b| result.sad < b.sad) {
            best = Some(result);
        }
    }
    let Some(best) = best else { return };

    let (worst_idx, _) = quadrants.iter().enumerate().max_by_key(|(_, q)| q.sad).expect("quadrants is non-empty");
    if best.sad < quadrants[worst_idx].sad {
        quadrants[worst_idx] = best;
    }
}
