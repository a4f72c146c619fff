//! The picture data model: the parent control set for one
//! admitted picture, its mini-GOP grouping, and the DPB toggle state the
//! driver threads through RPS generation.

use crate::{RefList, RefSlot, Resolution, DPB_SIZE, REF_FRAMES};

/// Slice type assigned to a picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SliceType {
    I,
    P,
    B,
}

/// AV1 frame type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    Key,
    IntraOnly,
    Inter,
}

/// Top-level prediction structure a picture belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PredStructure {
    RandomAccess,
    LowDelayP,
    LowDelayB,
}

/// Intra refresh flavor used when `intra_period_length` rolls over.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntraRefreshType {
    Cra,
    Idr,
}

/// Per-picture reference-picture set: DPB indices and POCs for the seven
/// AV1 reference slots, plus the refresh mask and show-mode flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rps {
    /// DPB slot index (`0..DPB_SIZE`) each of the seven reference slots maps
    /// to.
    pub dpb_index: [u8; REF_FRAMES],
    /// Display POC of the picture occupying each reference slot.
    pub ref_poc: [u64; REF_FRAMES],
    /// 8-bit mask of DPB slots refreshed by this picture.
    pub refresh_frame_mask: u8,
}

impl Rps {
    pub fn slot(&self, slot: RefSlot) -> (u8, u64) {
        let i = slot.index();
        (self.dpb_index[i], self.ref_poc[i])
    }

    /// Number of DPB slots this picture refreshes.
    pub fn refresh_count(&self) -> u32 {
        self.refresh_frame_mask.count_ones()
    }
}

/// Skip-mode pair: whether `skip_mode` coding is allowed for this picture,
/// and which two reference slots it draws from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SkipMode {
    pub allowed: bool,
    pub ref_frame_idx_0: u8,
    pub ref_frame_idx_1: u8,
}

/// A fully decided picture: the output of the Picture Decision pipeline for
/// one input picture, ready for RPS consumption and ME dispatch.
#[derive(Clone, Debug)]
pub struct Picture {
    /// Display-order index (Picture Order Count).
    pub poc: u64,
    /// Decode-order index, assigned when the mini-GOP containing this
    /// picture is emitted.
    pub decode_order: u64,
    /// Admission order hint as supplied by Picture Analysis. Not the same as
    /// `poc`: this is the order pictures were *handed to* the driver.
    pub picture_number_hint: u64,

    pub slice_type: SliceType,
    pub frame_type: FrameType,

    /// 0 at the base (widest-spaced) layer.
    pub hierarchical_layer_index: u8,
    pub temporal_layer_index: u8,
    pub hierarchical_levels: u8,

    pub pred_structure: PredStructure,

    pub ref_list0_count: u8,
    pub ref_list1_count: u8,

    pub scene_change: bool,
    pub idr_flag: bool,
    pub cra_flag: bool,

    pub show_frame: bool,
    pub show_existing: bool,
    /// DPB slot `show_existing` points at, valid only when `show_existing`.
    pub show_existing_loc: Option<u8>,

    pub rps: Rps,
    pub refresh_frame_mask: u8,
    pub skip_mode: SkipMode,

    pub average_intensity: u8,
    pub average_variance: u16,

    pub resolution: Resolution,
}

impl Picture {
    /// `temporal_layer_index <= hierarchical_levels`.
    pub fn temporal_layer_in_range(&self) -> bool {
        self.temporal_layer_index <= self.hierarchical_levels
    }

    /// `show_existing ⇒ show_frame`.
    pub fn show_existing_implies_show_frame(&self) -> bool {
        !self.show_existing || self.show_frame
    }

    pub fn is_intra(&self) -> bool {
        matches!(self.slice_type, SliceType::I)
    }
}

/// A mini-GOP: a contiguous run of pictures in the pre-assignment buffer
/// sharing one prediction structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MiniGop {
    pub start_index: usize,
    pub end_index: usize,
    pub hierarchical_levels: u8,
    pub intra_count: u32,
    pub idr_count: u32,
}

impl MiniGop {
    pub fn length(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// A "complete" mini-GOP has a power-of-two length equal to
    /// `1 << hierarchical_levels`. Incomplete
    /// mini-GOPs are only tolerated at stream boundaries / scene changes.
    pub fn is_complete(&self) -> bool {
        self.length() == (1usize << self.hierarchical_levels)
    }
}

/// The three ring-buffer toggle counters the driver owns across mini-GOPs,
/// plus the legacy 4-level toggle and the most recent keyframe POC used to
/// clamp reference POCs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DpbToggleState {
    pub lay0_toggle: u8,
    pub lay1_toggle: u8,
    pub lay2_toggle: u8,
    pub mini_gop_toggle: u8,
    pub key_poc: u64,
}

impl Default for DpbToggleState {
    fn default() -> Self {
        DpbToggleState {
            lay0_toggle: 0,
            lay1_toggle: 0,
            lay2_toggle: 0,
            mini_gop_toggle: 0,
            key_poc: 0,
        }
    }
}

impl DpbToggleState {
    /// Reset on a KEY frame.
    pub fn reset_on_key(&mut self, key_poc: u64) {
        self.lay0_toggle = 0;
        self.lay1_toggle = 0;
        self.lay2_toggle = 0;
        self.mini_gop_toggle = 0;
        self.key_poc = key_poc;
    }

    /// Advance at the last picture of a mini-GOP.
    pub fn advance(&mut self) {
        self.lay0_toggle = (self.lay0_toggle + 1) % 3;
        self.lay1_toggle = (self.lay1_toggle + 1) % 2;
        self.lay2_toggle = (self.lay2_toggle + 1) % 2;
        self.mini_gop_toggle = (self.mini_gop_toggle + 1) % 2;
    }

    /// `get_ref_poc(cur_poc, delta) = max(cur_poc - delta, key_poc)`
    ///.
    pub fn ref_poc(&self, cur_poc: u64, delta: i64) -> u64 {
        let candidate = cur_poc as i64 - delta;
        candidate.max(self.key_poc as i64) as u64
    }
}

pub(crate) fn dpb_slot_for(list: RefList, within_list_index: usize) -> RefSlot {
    match (list, within_list_index) {
        (RefList::List0, 0) => RefSlot::Last,
        (RefList::List0, 1) => RefSlot::Last2,
        (RefList::List0, 2) => RefSlot::Last3,
        (RefList::List0, 3) => RefSlot::Gold,
        (RefList::List1, 0) => RefSlot::Bwd,
        (RefList::List1, 1) => RefSlot::Alt2,
        (RefList::List1, 2) => RefSlot::Alt,
        _ => panic!("within_list_index out of range for {list:?}"),
    }
}

pub const _: () = assert!(DPB_SIZE == 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minigop_completeness() {
        let mg = MiniGop {
            start_index: 0,
            end_index: 7,
            hierarchical_levels: 3,
            intra_count: 0,
            idr_count: 0,
        };
        assert_eq!(mg.length(), 8);
        assert!(mg.is_complete());
    }

    #[test]
    fn toggle_advance_wraps_mod_three_and_two() {
        let mut t = DpbToggleState::default();
        for expected in [1, 2, 0, 1] {
            t.advance();
            assert_eq!(t.lay0_toggle, expected);
        }
    }

    #[test]
    fn ref_poc_clamps_to_key_poc() {
        let mut t = DpbToggleState::default();
        t.reset_on_key(10);
        assert_eq!(t.ref_poc(12, 5), 10);
        assert_eq!(t.ref_poc(20, 5), 15);
    }
}
