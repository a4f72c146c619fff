//! Scene Transition Detector.
//!
//! Follows the `Predictor` pattern used elsewhere in this crate: accept
//! input, return a small verdict enum. Here the verdict is
//! [`SceneTransition`] and the accumulated state lives in a single
//! [`RunningAverages`] struct with one `update` method, rather than as
//! scattered mutable fields threaded through free functions.

use crate::config::SceneChangeDetection;
use crate::error::SceneDetectError;
use crate::HISTOGRAM_NUMBER_OF_BINS;

/// One region's per-channel histogram and average intensity, as delivered by
/// Picture Analysis.
#[derive(Clone, Debug)]
pub struct RegionStats {
    pub luma_histogram: [u32; HISTOGRAM_NUMBER_OF_BINS],
    pub cb_histogram: [u32; HISTOGRAM_NUMBER_OF_BINS],
    pub cr_histogram: [u32; HISTOGRAM_NUMBER_OF_BINS],
    pub average_intensity: u8,
}

/// One picture's region grid plus its picture-wide average variance, the
/// minimal input the detector needs.
#[derive(Clone, Debug)]
pub struct PictureStats {
    pub region_rows: usize,
    pub region_cols: usize,
    pub regions: Vec<RegionStats>,
    pub average_variance: u16,
    /// Number of 64x64 blocks in the picture; scales the per-region AHD
    /// threshold.
    pub sb64_count: u32,
}

impl PictureStats {
    fn region(&self, row: usize, col: usize) -> &RegionStats {
        &self.regions[row * self.region_cols + col]
    }

    fn check_shape(&self, other: &PictureStats) -> Result<(), SceneDetectError> {
        let expected = self.region_rows * self.region_cols;
        if self.regions.len() != expected || other.regions.len() != expected {
            return Err(SceneDetectError::RegionCountMismatch {
                expected,
                actual: other.regions.len(),
            });
        }
        Ok(())
    }
}

/// Classification of one region's change relative to the previous picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionChange {
    None,
    Gradual,
    Flash,
    Fade,
    SceneChange,
}

impl RegionChange {
    pub fn is_abrupt(self) -> bool {
        matches!(self, RegionChange::Flash | RegionChange::Fade | RegionChange::SceneChange)
    }
}

/// Outcome of one `RunningAverages::update` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneTransition {
    pub scene_change: bool,
    pub fade_in: bool,
    pub fade_out: bool,
    pub region_changes: Vec<RegionChange>,
    pub reset_running_avg: bool,
}

/// Accumulated 3:1 IIR running average of per-region accumulated histogram
/// differences (AHD), one track per channel, replacing the source's global
/// mutable SCD scratch state.
#[derive(Clone, Debug)]
pub struct RunningAverages {
    per_region_luma: Vec<f64>,
    per_region_cb: Vec<f64>,
    per_region_cr: Vec<f64>,
    region_rows: usize,
    region_cols: usize,

    /// Base per-region AHD threshold before block-count and noise scaling.
    base_region_threshold: f64,
    /// Noise is declared when abs(cur_variance - prev_variance) exceeds this
    /// and the current variance itself is "high" (above `high_variance_th`).
    noise_variance_delta_th: f64,
    high_variance_th: u16,

    flash_th: f64,
    fade_th: f64,
}

const DEFAULT_BASE_REGION_THRESHOLD: f64 = 8.0;
const DEFAULT_NOISE_VARIANCE_DELTA_TH: f64 = 50.0;
const DEFAULT_HIGH_VARIANCE_TH: u16 = 1000;
const DEFAULT_FLASH_TH: f64 = 10.0;
const DEFAULT_FADE_TH: f64 = 4.0;

impl RunningAverages {
    pub fn new(region_rows: usize, region_cols: usize) -> Self {
        let n = region_rows * region_cols;
        RunningAverages {
            per_region_luma: vec![0.0; n],
            per_region_cb: vec![0.0; n],
            per_region_cr: vec![0.0; n],
            region_rows,
            region_cols,
            base_region_threshold: DEFAULT_BASE_REGION_THRESHOLD,
            noise_variance_delta_th: DEFAULT_NOISE_VARIANCE_DELTA_TH,
            high_variance_th: DEFAULT_HIGH_VARIANCE_TH,
            flash_th: DEFAULT_FLASH_TH,
            fade_th: DEFAULT_FADE_TH,
        }
    }

    fn ahd(hist_a: &[u32; HISTOGRAM_NUMBER_OF_BINS], hist_b: &[u32; HISTOGRAM_NUMBER_OF_BINS]) -> f64 {
        hist_a
            .iter()
            .zip(hist_b.iter())
            .map(|(a, b)| (*a as i64 - *b as i64).unsigned_abs() as f64)
            .sum()
    }

    /// Run the detector over three consecutive pictures in display order.
    /// `scd_mode` selects the declaration threshold.
    pub fn update(
        &mut self,
        prev: &PictureStats,
        cur: &PictureStats,
        fut: &PictureStats,
        scd_mode: SceneChangeDetection,
    ) -> Result<SceneTransition, SceneDetectError> {
        cur.check_shape(prev)?;
        cur.check_shape(fut)?;

        let n = self.region_rows * self.region_cols;
        let mut region_changes = Vec::with_capacity(n);

        let noisy = (cur.average_variance as i32 - prev.average_variance as i32).unsigned_abs() as f64
            > self.noise_variance_delta_th
            && cur.average_variance > self.high_variance_th;

        let scaled_threshold =
            self.base_region_threshold * cur.sb64_count as f64 * if noisy { 2.0 } else { 1.0 };

        let mut abrupt_count = 0usize;

        for row in 0..self.region_rows {
            for col in 0..self.region_cols {
                let idx = row * self.region_cols + col;
                let p = prev.region(row, col);
                let c = cur.region(row, col);
                let f = fut.region(row, col);

                let luma_ahd = Self::ahd(&c.luma_histogram, &p.luma_histogram);
                let cb_ahd = Self::ahd(&c.cb_histogram, &p.cb_histogram);
                let cr_ahd = Self::ahd(&c.cr_histogram, &p.cr_histogram);

                self.per_region_luma[idx] = (self.per_region_luma[idx] * 3.0 + luma_ahd) / 4.0;
                self.per_region_cb[idx] = (self.per_region_cb[idx] * 3.0 + cb_ahd) / 4.0;
                self.per_region_cr[idx] = (self.per_region_cr[idx] * 3.0 + cr_ahd) / 4.0;

                let abrupt = luma_ahd > scaled_threshold
                    || cb_ahd > scaled_threshold
                    || cr_ahd > scaled_threshold;
                let gradual = !abrupt && luma_ahd > scaled_threshold / 2.0;

                let change = if abrupt {
                    let fut_to_past = (f.average_intensity as i32 - p.average_intensity as i32).abs() as f64;
                    let fut_to_present = (f.average_intensity as i32 - c.average_intensity as i32).abs() as f64;
                    let present_to_past = (c.average_intensity as i32 - p.average_intensity as i32).abs() as f64;

                    if fut_to_past < self.flash_th
                        && fut_to_present >= self.flash_th
                        && present_to_past >= self.flash_th
                    {
                        RegionChange::Flash
                    } else if fut_to_present < self.fade_th && present_to_past < self.fade_th {
                        RegionChange::Fade
                    } else {
                        RegionChange::SceneChange
                    }
                } else if gradual {
                    RegionChange::Gradual
                } else {
                    RegionChange::None
                };

                if abrupt {
                    abrupt_count += 1;
                }
                region_changes.push(change);
            }
        }

        let fade_in = region_changes.iter().filter(|c| **c == RegionChange::Fade).count() * 2 > n
            && (cur.average_intensity_mean() as i32) > (prev.average_intensity_mean() as i32);
        let fade_out = region_changes.iter().filter(|c| **c == RegionChange::Fade).count() * 2 > n
            && (cur.average_intensity_mean() as i32) < (prev.average_intensity_mean() as i32);

        let reset_running_avg = abrupt_count * 2 > n;
        if reset_running_avg {
            self.per_region_luma.iter_mut().for_each(|v| *v = 0.0);
            self.per_region_cb.iter_mut().for_each(|v| *v = 0.0);
            self.per_region_cr.iter_mut().for_each(|v| *v = 0.0);
        }

        let threshold_percent = scd_mode.threshold_percent();
        let scene_change = scd_mode != SceneChangeDetection::Off
            && abrupt_count * 100 >= threshold_percent as usize * n
            && !fade_in
            && !fade_out;

        Ok(SceneTransition {
            scene_change,
            fade_in,
            fade_out,
            region_changes,
            reset_running_avg,
        })
    }
}

impl PictureStats {
    fn average_intensity_mean(&self) -> u32 {
        if self.regions.is_empty() {
            return 0;
        }
        let sum: u32 = self.regions.iter().map(|r| r.average_intensity as u32).sum();
        sum / self.regions.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_region(intensity: u8) -> RegionStats {
        RegionStats {
            luma_histogram: [1; HISTOGRAM_NUMBER_OF_BINS],
            cb_histogram: [1; HISTOGRAM_NUMBER_OF_BINS],
            cr_histogram: [1; HISTOGRAM_NUMBER_OF_BINS],
            average_intensity: intensity,
        }
    }

    fn flat_picture(intensity: u8, variance: u16) -> PictureStats {
        PictureStats {
            region_rows: 2,
            region_cols: 2,
            regions: vec![
                flat_region(intensity),
                flat_region(intensity),
                flat_region(intensity),
                flat_region(intensity),
            ],
            average_variance: variance,
            sb64_count: 16,
        }
    }

    /// Identical histograms to the previous picture: detector returns
    /// false and does not reset the running average.
    #[test]
    fn still_reference_no_scene_change() {
        let mut avgs = RunningAverages::new(2, 2);
        let prev = flat_picture(128, 100);
        let cur = flat_picture(128, 100);
        let fut = flat_picture(128, 100);

        let transition = avgs
            .update(&prev, &cur, &fut, SceneChangeDetection::Mode1)
            .unwrap();

        assert!(!transition.scene_change);
        assert!(!transition.reset_running_avg);
        assert!(transition.region_changes.iter().all(|c| *c == RegionChange::None));
    }

    #[test]
    fn abrupt_change_all_regions_declares_scene_change() {
        let mut avgs = RunningAverages::new(2, 2);
        let prev = flat_picture(128, 100);
        let mut cur = flat_picture(200, 100);
        for r in &mut cur.regions {
            r.luma_histogram = [0; HISTOGRAM_NUMBER_OF_BINS];
            r.luma_histogram[0] = HISTOGRAM_NUMBER_OF_BINS as u32 * 2000;
        }
        let fut = flat_picture(40, 100);

        let transition = avgs
            .update(&prev, &cur, &fut, SceneChangeDetection::Mode1)
            .unwrap();

        assert!(transition.scene_change);
        assert!(transition.reset_running_avg);
    }

    #[test]
    fn region_count_mismatch_is_an_error() {
        let mut avgs = RunningAverages::new(2, 2);
        let prev = flat_picture(128, 100);
        let cur = flat_picture(128, 100);
        let mut fut = flat_picture(128, 100);
        fut.regions.pop();

        let err = avgs.update(&prev, &cur, &fut, SceneChangeDetection::Mode1);
        assert!(matches!(err, Err(SceneDetectError::RegionCountMismatch { .. })));
    }
}
