//! Picture Decision Driver: the state machine that pumps the reorder
//! buffer through admission, mini-GOP partitioning, RPS generation, and
//! PA-reference bookkeeping, producing fully decided [`Picture`]s.
//!
//! Shaped like a `poll`/`encode` split: `submit` admits input (possibly
//! without producing output yet), `step` advances internal state and
//! returns whatever became ready. The "not ready yet" case is a
//! `DriverStep` variant rather than an `Option`-wrapped `Err`, so a
//! transient stall can never be mis-handled as a stream-fatal error.

use std::collections::VecDeque;

use crate::config::Config;
use crate::error::{DecisionError, DriverError};
use crate::minigop;
use crate::pa_reference::PaReferenceQueue;
use crate::picture::{FrameType, Picture, PredStructure, SkipMode, SliceType};
use crate::rps::{self, RpsGenerator};
use crate::scene::{PictureStats, RunningAverages};
use crate::skip_mode;
use crate::Resolution;

/// One input handed to the driver by Picture Analysis, still awaiting a
/// decision.
#[derive(Clone, Debug)]
pub struct PendingInput {
    pub picture_number_hint: u64,
    pub force_keyframe: bool,
    pub average_intensity: u8,
    pub average_variance: u16,
    pub resolution: Resolution,
    /// Region histograms for scene-transition detection, when available.
    pub stats: Option<PictureStats>,
}

/// Outcome of one [`Driver::step`] call.
#[derive(Debug)]
pub enum DriverStep {
    /// Nothing decided yet: the reorder window isn't full and end-of-stream
    /// hasn't been signaled. Not an error — callers should submit more
    /// input or poll again.
    NotReady,
    /// One or more pictures were decided this step, in decode order.
    Emitted(Vec<Picture>),
    /// The reorder buffer is drained and end-of-stream was signaled: no
    /// further [`DriverStep::Emitted`] will ever follow.
    EndOfStream,
}

pub struct Driver {
    config: Config,
    reorder: VecDeque<PendingInput>,
    rps: RpsGenerator,
    pa_queue: PaReferenceQueue,
    scene_avgs: Option<RunningAverages>,
    /// Stats of the most recently emitted picture in display order, used by
    /// [`Driver::maybe_scene_change`] when the picture being tested is at
    /// the front of the reorder buffer and so has no predecessor left in
    /// it.
    last_stats: Option<PictureStats>,

    next_poc: u64,
    next_decode_order: u64,
    pictures_since_key: i32,
    stream_started: bool,
    eos_received: bool,
}

impl Driver {
    pub fn new(config: Config) -> Self {
        let pa_capacity = crate::DPB_SIZE * 4;
        Driver {
            reorder: VecDeque::new(),
            rps: RpsGenerator::new(),
            pa_queue: PaReferenceQueue::new(pa_capacity),
            scene_avgs: None,
            last_stats: None,
            next_poc: 0,
            next_decode_order: 0,
            pictures_since_key: 0,
            stream_started: false,
            eos_received: false,
            config,
        }
    }

    /// Admit one input picture. Admission order must match
    /// `picture_number_hint`'s own order: Picture Analysis is the only
    /// stage allowed to reorder display, and it does so via `poc`
    /// assignment here, not by handing inputs to the driver out of order.
    pub fn submit(&mut self, input: PendingInput) -> Result<(), DecisionError> {
        if self.eos_received {
            return Err(DriverError::DuplicateEos.into());
        }
        if let Some(last) = self.reorder.back() {
            if input.picture_number_hint <= last.picture_number_hint {
                return Err(DriverError::OutOfOrderAdmission {
                    got: input.picture_number_hint,
                    expected: last.picture_number_hint + 1,
                }
                .into());
            }
        }
        self.reorder.push_back(input);
        Ok(())
    }

    pub fn signal_end_of_stream(&mut self) -> Result<(), DecisionError> {
        if self.eos_received {
            return Err(DriverError::DuplicateEos.into());
        }
        self.eos_received = true;
        Ok(())
    }

    fn should_start_key(&self) -> bool {
        if !self.stream_started {
            return true;
        }
        if self.reorder.front().map(|p| p.force_keyframe).unwrap_or(false) {
            return true;
        }
        self.config.intra_period_length >= 0 && self.pictures_since_key as i64 >= self.config.intra_period_length as i64
    }

    fn gop_length(&self) -> usize {
        1usize << self.config.hierarchical_levels.max(1)
    }

    /// Scene-transition test for the picture at 0-based display-order index
    /// `idx` within `self.reorder`. `idx == 0` compares against
    /// `self.last_stats` (the previous step's last displayed picture)
    /// rather than a reorder-buffer neighbor, since that neighbor has
    /// already been emitted and popped.
    fn maybe_scene_change(&mut self, idx: usize) -> Result<bool, DecisionError> {
        if self.config.scene_change_detection == crate::config::SceneChangeDetection::Off {
            return Ok(false);
        }
        if idx + 1 >= self.reorder.len() {
            return Ok(false);
        }
        let prev = if idx == 0 { self.last_stats.clone() } else { self.reorder[idx - 1].stats.clone() };
        let cur = self.reorder[idx].stats.clone();
        let fut = self.reorder[idx + 1].stats.clone();
        let (Some(prev), Some(cur), Some(fut)) = (prev, cur, fut) else {
            return Ok(false);
        };
        let region_rows = cur.region_rows;
        let region_cols = cur.region_cols;
        let avgs = self
            .scene_avgs
            .get_or_insert_with(|| RunningAverages::new(region_rows, region_cols));
        let transition = avgs.update(&prev, &cur, &fut, self.config.scene_change_detection)?;
        Ok(transition.scene_change)
    }

    /// Scan the upcoming mini-GOP window (0-based indices `0..window-1`,
    /// excluding the anchor position itself) for the first scene change.
    /// A scene change exactly at the anchor is aligned with the mini-GOP's
    /// own end and must not break its structure, so that position is never
    /// tested.
    fn find_scene_change(&mut self, window: usize) -> Result<Option<usize>, DecisionError> {
        if self.config.scene_change_detection == crate::config::SceneChangeDetection::Off {
            return Ok(None);
        }
        let limit = window.saturating_sub(1).min(self.reorder.len().saturating_sub(1));
        for idx in 0..limit {
            if self.maybe_scene_change(idx)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    /// A scene change was declared at 0-based display index `scene_idx`
    /// within `self.reorder`: break the mini-GOP into a shortened
    /// LOW_DELAY_P tail (the `scene_idx` pictures before it) followed by an
    /// open-GOP CRA I-slice (the picture at `scene_idx` itself). Pictures
    /// after `scene_idx` are left in the reorder buffer for the next step.
    fn emit_scene_change_boundary(&mut self, scene_idx: usize) -> Result<Vec<Picture>, DecisionError> {
        let mut batch = Vec::with_capacity(scene_idx + 1);

        for _ in 0..scene_idx {
            let input = self.reorder.pop_front().expect("scene-change tail picture present");
            self.last_stats = input.stats.clone();
            let poc = self.next_poc;
            self.next_poc += 1;
            self.pictures_since_key += 1;
            let rps = self.rps.generate_low_delay(poc);
            let show = rps::show_frame_for(PredStructure::LowDelayP, false, true);
            let picture = self.build_picture(input, poc, SliceType::P, FrameType::Inter, PredStructure::LowDelayP, 0, 0, rps, false, show);
            batch.push(picture);
        }

        let input = self.reorder.pop_front().expect("scene-change picture present");
        self.last_stats = input.stats.clone();
        let poc = self.next_poc;
        self.next_poc += 1;
        self.pictures_since_key = 0;
        let rps = self.rps.generate_key_frame(poc);
        // Open GOP: this mini-GOP was cut short, so the I-slice shows
        // immediately rather than deferring via show_existing.
        let show = rps::show_frame_for(PredStructure::RandomAccess, true, false);
        let picture = self.build_picture(
            input,
            poc,
            SliceType::I,
            FrameType::IntraOnly,
            PredStructure::RandomAccess,
            0,
            self.config.hierarchical_levels,
            rps,
            true,
            show,
        );
        self.pa_queue.invalidate_broken(poc);
        batch.push(picture);

        log::trace!("scene change at poc={poc}: {scene_idx}-picture low-delay tail plus open-GOP CRA");
        Ok(batch)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_picture(
        &mut self,
        input: PendingInput,
        poc: u64,
        slice_type: SliceType,
        frame_type: FrameType,
        pred_structure: PredStructure,
        hierarchical_layer_index: u8,
        hierarchical_levels: u8,
        rps: crate::picture::Rps,
        scene_change: bool,
        show: (bool, bool, Option<u8>),
    ) -> Picture {
        let decode_order = self.next_decode_order;
        self.next_decode_order += 1;

        let is_bipred = matches!(pred_structure, PredStructure::RandomAccess) && slice_type == SliceType::B;
        let sm = if is_bipred {
            skip_mode::derive(&rps, poc, self.config.order_hint_bits, true)
        } else {
            SkipMode::default()
        };

        let ref_list0_count: u8 = if slice_type == SliceType::I { 0 } else { 4 };
        let ref_list1_count: u8 = if is_bipred { 3 } else { 0 };

        let refresh_frame_mask = rps.refresh_frame_mask;
        let (show_frame, show_existing, show_existing_loc) = show;

        Picture {
            poc,
            decode_order,
            picture_number_hint: input.picture_number_hint,
            slice_type,
            frame_type,
            hierarchical_layer_index,
            temporal_layer_index: hierarchical_layer_index,
            hierarchical_levels,
            pred_structure,
            ref_list0_count,
            ref_list1_count,
            scene_change,
            idr_flag: frame_type == FrameType::Key,
            cra_flag: slice_type == SliceType::I && frame_type != FrameType::Key,
            show_frame,
            show_existing,
            show_existing_loc,
            rps,
            refresh_frame_mask,
            skip_mode: sm,
            average_intensity: input.average_intensity,
            average_variance: input.average_variance,
            resolution: input.resolution,
        }
    }

    /// Advance the driver by one step.
    pub fn step(&mut self) -> Result<DriverStep, DecisionError> {
        let gop_length = self.gop_length();
        let window_filled = self.reorder.len() >= self.config.future_window_width || self.eos_received;
        if !window_filled {
            return Ok(DriverStep::NotReady);
        }
        if self.reorder.is_empty() {
            return Ok(if self.eos_received {
                DriverStep::EndOfStream
            } else {
                DriverStep::NotReady
            });
        }

        if self.should_start_key() {
            let scene_change = self.maybe_scene_change(0).unwrap_or(false);
            let input = self.reorder.pop_front().unwrap();
            self.last_stats = input.stats.clone();
            let poc = self.next_poc;
            self.next_poc += 1;
            let rps = self.rps.generate_key_frame(poc);
            self.pictures_since_key = 0;
            self.stream_started = true;
            log::trace!("emitting key frame poc={poc} scene_change={scene_change}");
            let show = (true, false, None);
            let picture = self.build_picture(
                input,
                poc,
                SliceType::I,
                FrameType::Key,
                PredStructure::RandomAccess,
                0,
                self.config.hierarchical_levels,
                rps,
                scene_change,
                show,
            );
            self.pa_queue.invalidate_broken(poc);
            return Ok(DriverStep::Emitted(vec![picture]));
        }

        if self.config.hierarchical_levels == 0 {
            // Flat GOP: every admitted picture is its own one-picture
            // "mini-GOP", coded as an I-slice.
            let input = self.reorder.pop_front().unwrap();
            self.last_stats = input.stats.clone();
            let poc = self.next_poc;
            self.next_poc += 1;
            self.pictures_since_key += 1;
            let rps = self.rps.generate_low_delay(poc);
            let picture = self.build_picture(
                input,
                poc,
                SliceType::I,
                FrameType::IntraOnly,
                PredStructure::LowDelayP,
                0,
                0,
                rps,
                false,
                (true, false, None),
            );
            return Ok(DriverStep::Emitted(vec![picture]));
        }

        if matches!(self.config.pred_structure, PredStructure::LowDelayP | PredStructure::LowDelayB) {
            let input = self.reorder.pop_front().unwrap();
            self.last_stats = input.stats.clone();
            let poc = self.next_poc;
            self.next_poc += 1;
            self.pictures_since_key += 1;
            let rps = self.rps.generate_low_delay(poc);
            let show = rps::show_frame_for(self.config.pred_structure, false, true);
            let picture = self.build_picture(
                input,
                poc,
                SliceType::P,
                FrameType::Inter,
                self.config.pred_structure,
                0,
                0,
                rps,
                false,
                show,
            );
            return Ok(DriverStep::Emitted(vec![picture]));
        }

        // Random access: only proceed once a full mini-GOP (or, at
        // end-of-stream, whatever remains) is available.
        if self.reorder.len() < gop_length && !self.eos_received {
            return Ok(DriverStep::NotReady);
        }

        // A scene change partway through the upcoming mini-GOP breaks it
        // into a shortened low-delay tail plus an open-GOP CRA, instead of
        // letting the regular hierarchical structure span across the cut.
        if let Some(scene_idx) = self.find_scene_change(gop_length)? {
            let batch = self.emit_scene_change_boundary(scene_idx)?;
            return Ok(DriverStep::Emitted(batch));
        }

        let available = self.reorder.len();
        let mini_gops = minigop::partition(available, 0, 0)?;
        let first = mini_gops[0];
        if !first.is_complete() && !self.eos_received {
            return Ok(DriverStep::NotReady);
        }

        let base_poc = self.next_poc;
        let length = first.length() as u32;
        let levels = first.hierarchical_levels;

        let mut batch: Vec<Picture> = Vec::with_capacity(first.length());
        let mut inputs: Vec<Option<PendingInput>> = self.reorder.drain(..first.length()).map(Some).collect();
        let mut anchor_stats: Option<PictureStats> = None;

        for offset in rps::decode_order_offsets(length) {
            let idx = (offset - 1) as usize;
            let input = inputs[idx].take().expect("each offset visited once");
            if offset == length {
                anchor_stats = input.stats.clone();
            }
            let poc = base_poc + offset as u64;
            let layer = rps::layer_for_offset(offset, length);
            let decision = self.rps.generate_hierarchical(offset, length, levels, poc)?;
            let slice_type = if layer == 0 { SliceType::P } else { rps::slice_type_for(layer, false) };
            let show = (decision.show_frame, decision.show_existing, decision.show_existing_loc);
            let picture = self.build_picture(
                input,
                poc,
                slice_type,
                FrameType::Inter,
                PredStructure::RandomAccess,
                layer,
                levels,
                decision.rps,
                false,
                show,
            );
            self.pictures_since_key += 1;
            batch.push(picture);
        }
        if let Some(stats) = anchor_stats {
            self.last_stats = Some(stats);
        }

        batch.sort_by_key(|p| p.decode_order);

        // PA reference bookkeeping: every reference picture gets an entry
        // whose dependent_count is how many other pictures in this same
        // batch cite its POC.
        self.pa_queue.handle_hierarchical_levels_diff(levels);
        for p in &batch {
            if p.refresh_frame_mask == 0 {
                continue;
            }
            let dependents = batch
                .iter()
                .filter(|other| other.poc != p.poc && other.rps.ref_poc.contains(&p.poc))
                .count() as i32;
            if self.pa_queue.len() >= self.pa_queue.capacity() {
                self.pa_queue.evict_exhausted();
            }
            self.pa_queue
                .push(p.poc, p.hierarchical_layer_index, dependents)
                .map_err(|e| DecisionError::ResourceExhausted(e.to_string()))?;
        }

        self.next_poc = base_poc + length as u64;

        log::trace!("emitting mini-GOP base_poc={base_poc} length={length} levels={levels}");
        Ok(DriverStep::Emitted(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(n: u64) -> PendingInput {
        PendingInput {
            picture_number_hint: n,
            force_keyframe: false,
            average_intensity: 128,
            average_variance: 50,
            resolution: Resolution { width: 64, height: 64 },
            stats: None,
        }
    }

    fn config_small_gop() -> Config {
        let mut c = Config::default();
        c.hierarchical_levels = 3;
        c.future_window_width = 1;
        c.scene_change_detection = crate::config::SceneChangeDetection::Off;
        c
    }

    #[test]
    fn first_picture_is_always_a_key_frame() {
        let mut d = Driver::new(config_small_gop());
        for i in 0..9 {
            d.submit(input(i)).unwrap();
        }
        d.signal_end_of_stream().unwrap();
        match d.step().unwrap() {
            DriverStep::Emitted(pics) => {
                assert_eq!(pics.len(), 1);
                assert_eq!(pics[0].frame_type, FrameType::Key);
                assert_eq!(pics[0].poc, 0);
                assert!(pics[0].show_frame);
            }
            other => panic!("expected Emitted, got {other:?}"),
        }
    }

    #[test]
    fn out_of_order_admission_is_an_error() {
        let mut d = Driver::new(config_small_gop());
        d.submit(input(1)).unwrap();
        let err = d.submit(input(1));
        assert!(matches!(err, Err(DecisionError::Driver(DriverError::OutOfOrderAdmission { .. }))));
    }

    #[test]
    fn duplicate_eos_is_an_error() {
        let mut d = Driver::new(config_small_gop());
        d.signal_end_of_stream().unwrap();
        let err = d.signal_end_of_stream();
        assert!(matches!(err, Err(DecisionError::Driver(DriverError::DuplicateEos))));
    }

    #[test]
    fn a_full_mini_gop_emits_eight_pictures_with_distinct_decode_orders() {
        let mut d = Driver::new(config_small_gop());
        for i in 0..9 {
            d.submit(input(i)).unwrap();
        }
        d.signal_end_of_stream().unwrap();
        // First step: key frame.
        d.step().unwrap();
        let step = d.step().unwrap();
        match step {
            DriverStep::Emitted(pics) => {
                assert_eq!(pics.len(), 8);
                let mut decode_orders: Vec<u64> = pics.iter().map(|p| p.decode_order).collect();
                decode_orders.sort();
                decode_orders.dedup();
                assert_eq!(decode_orders.len(), 8);
                assert!(pics.iter().all(|p| p.temporal_layer_in_range()));
                assert!(pics.iter().all(|p| p.show_existing_implies_show_frame()));
                let leaves: Vec<_> = pics.iter().filter(|p| p.hierarchical_layer_index == 3).collect();
                assert_eq!(leaves.len(), 4);
                assert!(leaves.iter().all(|p| p.show_existing && p.show_existing_loc.is_some()));
            }
            other => panic!("expected Emitted, got {other:?}"),
        }
    }

    /// A queue capacity of zero makes the very first PA-reference push fail;
    /// that failure must surface as a stream-fatal ResourceExhausted error,
    /// not be silently swallowed.
    #[test]
    fn pa_queue_saturation_is_a_fatal_error() {
        let mut d = Driver::new(config_small_gop());
        // Shrink the queue after construction so the first mini-GOP's own
        // reference pictures already exceed it.
        d.pa_queue = PaReferenceQueue::new(0);
        for i in 0..9 {
            d.submit(input(i)).unwrap();
        }
        d.signal_end_of_stream().unwrap();
        d.step().unwrap(); // key frame
        let err = d.step();
        assert!(matches!(err, Err(DecisionError::ResourceExhausted(_))));
    }

    fn stats_with_intensity(intensity: u8) -> PictureStats {
        use crate::scene::RegionStats;
        let region = RegionStats {
            luma_histogram: {
                // A spike whose bin tracks `intensity`: two pictures at the
                // same intensity get identical histograms (AHD 0), two at
                // different intensities get a large AHD from the spike
                // moving position.
                let mut h = [1u32; crate::HISTOGRAM_NUMBER_OF_BINS];
                h[intensity as usize] = 50_000;
                h
            },
            cb_histogram: [1; crate::HISTOGRAM_NUMBER_OF_BINS],
            cr_histogram: [1; crate::HISTOGRAM_NUMBER_OF_BINS],
            average_intensity: intensity,
        };
        PictureStats {
            region_rows: 2,
            region_cols: 2,
            regions: vec![region.clone(), region.clone(), region.clone(), region],
            average_variance: 100,
            sb64_count: 16,
        }
    }

    fn input_with_stats(n: u64, intensity: u8) -> PendingInput {
        let mut i = input(n);
        i.stats = Some(stats_with_intensity(intensity));
        i
    }

    /// A scene change mid-mini-GOP (not aligned with its anchor) breaks it
    /// into a shortened low-delay tail plus an open-GOP CRA, instead of
    /// letting the regular 8-picture hierarchical structure span the cut.
    #[test]
    fn scene_change_inside_a_mini_gop_shortens_it() {
        let mut c = config_small_gop();
        c.scene_change_detection = crate::config::SceneChangeDetection::Mode1;
        let mut d = Driver::new(c);

        d.submit(input_with_stats(0, 128)).unwrap(); // key frame
        for i in 1..5 {
            d.submit(input_with_stats(i, 128)).unwrap();
        }
        // Abrupt change at the 5th submitted picture (poc 5).
        for i in 5..9 {
            d.submit(input_with_stats(i, 250)).unwrap();
        }
        d.signal_end_of_stream().unwrap();

        d.step().unwrap(); // key frame, poc 0
        let step = d.step().unwrap();
        match step {
            DriverStep::Emitted(pics) => {
                assert!(pics.len() < 8, "expected a shortened batch, got {} pictures", pics.len());
                let last = pics.last().unwrap();
                assert_eq!(last.slice_type, SliceType::I);
                assert!(last.cra_flag);
                assert!(!last.idr_flag);
                assert!(last.show_frame);
                assert!(pics[..pics.len() - 1].iter().all(|p| p.slice_type == SliceType::P));
            }
            other => panic!("expected Emitted, got {other:?}"),
        }
    }
}
