//! Enumerated tunable configuration. A plain typed struct, not a CLI or
//! file-format surface.

use crate::picture::{IntraRefreshType, PredStructure};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneChangeDetection {
    Off,
    /// 50% abrupt-change region threshold.
    Mode1,
    /// 75% abrupt-change region threshold.
    Mode2,
}

impl SceneChangeDetection {
    /// Percentage of 64x64 regions that must be classified abrupt-change for
    /// a scene change to be declared.
    pub fn threshold_percent(self) -> u32 {
        match self {
            SceneChangeDetection::Off => 101, // unreachable; detector is bypassed entirely
            SceneChangeDetection::Mode1 => 50,
            SceneChangeDetection::Mode2 => 75,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HmeSearchMethod {
    FullSad,
    /// Sub-sample every other row; reported SAD is doubled to compensate.
    SubSad,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeSrAdjustment {
    pub enable: bool,
    pub distance_based_hme_resizing: bool,
    pub reduce_me_sr_based_on_mv_length_th: bool,
    pub stationary_me_sr_divisor: u32,
    pub me_sr_divisor_for_low_hme_sad: u32,
}

impl Default for MeSrAdjustment {
    fn default() -> Self {
        MeSrAdjustment {
            enable: true,
            distance_based_hme_resizing: true,
            reduce_me_sr_based_on_mv_length_th: true,
            stationary_me_sr_divisor: 4,
            me_sr_divisor_for_low_hme_sad: 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeHmePrune {
    /// Percent: reference pruned if `(sad - best) * 100 > threshold * best`.
    pub prune_ref_if_hme_sad_dev_bigger_than_th: u32,
    pub prune_ref_if_me_sad_dev_bigger_than_th: u32,
    /// Never prune reference index 0 of either list.
    pub protect_closest_refs: bool,
}

impl Default for MeHmePrune {
    fn default() -> Self {
        MeHmePrune {
            prune_ref_if_hme_sad_dev_bigger_than_th: 60,
            prune_ref_if_me_sad_dev_bigger_than_th: 60,
            protect_closest_refs: true,
        }
    }
}

/// Extra Level-0 HME search centers tried at configured offsets from a
/// block's co-located position, on top of the four-quadrant cascade.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PreHmeConfig {
    pub enable: bool,
    /// Up to two extra Level-0 search centers, as (x, y) offsets from the
    /// block's co-located position in the downsampled reference.
    pub region_offsets: [(i32, i32); 2],
    /// How many of `region_offsets` are active (0, 1, or 2).
    pub region_count: u8,
}

impl Default for PreHmeConfig {
    fn default() -> Self {
        PreHmeConfig {
            enable: false,
            region_offsets: [(0, 0), (0, 0)],
            region_count: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GmConfig {
    pub enabled: bool,
    pub use_distance_based_active_th: bool,
}

impl Default for GmConfig {
    fn default() -> Self {
        GmConfig {
            enabled: true,
            use_distance_based_active_th: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub scene_change_detection: SceneChangeDetection,
    /// `-1` = none, `0` = every picture is intra.
    pub intra_period_length: i32,
    pub intra_refresh_type: IntraRefreshType,
    pub pred_structure: PredStructure,
    /// `{0, 3, 4, 5}`.
    pub hierarchical_levels: u8,

    pub enable_hme_flag: bool,
    /// `{0, 1, 2}`.
    pub hme_decimation: u8,
    pub hme_search_method: HmeSearchMethod,

    pub me_sr_adjustment: MeSrAdjustment,
    pub me_hme_prune: MeHmePrune,
    pub pre_hme: PreHmeConfig,
    /// Percent threshold for candidate pruning in the Candidate Builder.
    pub prune_me_candidates_th: u32,

    pub gm: GmConfig,

    /// AV1 `order_hint_bits_minus1 + 1`, used by `relative_dist` and the
    /// skip-mode derivation.
    pub order_hint_bits: u32,

    /// Future window width the reorder queue must see filled before
    /// admitting its head picture.
    pub future_window_width: usize,

    pub max_frame_window_to_ref_islice: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scene_change_detection: SceneChangeDetection::Mode1,
            intra_period_length: -1,
            intra_refresh_type: IntraRefreshType::Cra,
            pred_structure: PredStructure::RandomAccess,
            hierarchical_levels: 3,

            enable_hme_flag: true,
            hme_decimation: 1,
            hme_search_method: HmeSearchMethod::FullSad,

            me_sr_adjustment: MeSrAdjustment::default(),
            me_hme_prune: MeHmePrune::default(),
            pre_hme: PreHmeConfig::default(),
            prune_me_candidates_th: 10,

            gm: GmConfig::default(),

            order_hint_bits: 7,
            future_window_width: 4,
            max_frame_window_to_ref_islice: 64,
        }
    }
}
