//! Global Motion detection: classify a picture's per-block motion vectors
//! as stationary vs. active-in-one-direction, per reference, to decide
//! whether a global-motion model is worth signaling. Grounded on
//! `perform_gm_detection`'s `per_sig_cnt`/`stationary_cnt` histogram and
//! its distance-scaled active threshold.

use crate::config::GmConfig;
use crate::me::context::SbMeContext;
use crate::Mv;

/// Per-reference tally of directional and stationary blocks, gathered
/// across every 16x16 (or 8x8, for the high-resolution path) block of one
/// picture.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionHistogram {
    pub negative_x: u64,
    pub positive_x: u64,
    pub negative_y: u64,
    pub positive_y: u64,
    pub stationary: u64,
    pub total: u64,
}

impl MotionHistogram {
    /// Fraction of sampled blocks classified stationary.
    pub fn stationary_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.stationary as f64 / self.total as f64
        }
    }

    /// True when motion is clearly biased in one horizontal or vertical
    /// direction, suggesting a global translation worth modeling.
    pub fn directionally_biased(&self) -> bool {
        if self.total == 0 {
            return false;
        }
        let x_biased = self.negative_x > 2 * self.positive_x || self.positive_x > 2 * self.negative_x;
        let y_biased = self.negative_y > 2 * self.positive_y || self.positive_y > 2 * self.negative_y;
        (x_biased && self.negative_x + self.positive_x > self.total / 4)
            || (y_biased && self.negative_y + self.positive_y > self.total / 4)
    }
}

/// `active_th = max(dist * scale, floor)`, the distance-based threshold
/// `perform_gm_detection` applies when `use_distance_based_active_th` is
/// set; otherwise a flat `floor`.
fn active_threshold(cfg: &GmConfig, dist: u32, scale: i32, floor: i32) -> i32 {
    if cfg.use_distance_based_active_th {
        (dist as i32 * scale).max(floor)
    } else {
        floor
    }
}

/// Sample `ctx`'s best MVs for list `list` at reference `ref_index`
/// against `dist` (the POC distance to that reference), building a
/// histogram over the given set of partition indices (the 16x16 or 8x8
/// leaf layer, matching the two resolution-dependent sampling passes in
/// `perform_gm_detection`).
pub fn histogram_for_reference(ctx: &SbMeContext, cfg: &GmConfig, list: usize, ref_index: usize, dist: u32, partitions: &[usize], stationary_th: i32) -> MotionHistogram {
    let active_th = active_threshold(cfg, dist, 1, 4);
    let mut h = MotionHistogram::default();

    for &p in partitions {
        let Mv { x, y } = ctx.results[list][ref_index][p].best_mv;
        classify_component(x, active_th, &mut h.negative_x, &mut h.positive_x);
        classify_component(y, active_th, &mut h.negative_y, &mut h.positive_y);
        if x.unsigned_abs() as i32 <= stationary_th && y.unsigned_abs() as i32 <= stationary_th {
            h.stationary += 1;
        }
        h.total += 1;
    }
    h
}

fn classify_component(v: i16, active_th: i32, negative: &mut u64, positive: &mut u64) {
    let v = v as i32;
    if v < -active_th {
        *negative += 1;
    } else if v > active_th {
        *positive += 1;
    }
}
