//! Mini-GOP Partitioner.
//!
//! Replaces the source's nested-switch GOP table walk with the data-driven
//! table the re-architecture notes call for. Here the
//! table is one dimension smaller (start/end/levels only) because the
//! DPB-slot septuple itself belongs to the RPS generator (`rps.rs`).

use crate::error::MiniGopError;
use crate::picture::MiniGop;

/// One static mini-GOP slot: `(start, end, hierarchical_levels)`.
#[derive(Copy, Clone, Debug)]
struct Slot {
    start: usize,
    end: usize,
    levels: u8,
}

/// The static table of candidate mini-GOP slots, leaves-first (shortest
/// hierarchical depth first, matching SVT-AV1's `mini_gop_stats` table
/// order so the walk in `partition` below terminates in the same shape).
/// Covers a pre-assignment buffer of up to 32 pictures with 3-, 4-, and
/// 5-level mini-GOPs.
const SLOTS: &[Slot] = &[
    // 3-level (length 8) slots.
    Slot { start: 0, end: 7, levels: 3 },
    Slot { start: 8, end: 15, levels: 3 },
    Slot { start: 16, end: 23, levels: 3 },
    Slot { start: 24, end: 31, levels: 3 },
    // 4-level (length 16) slots.
    Slot { start: 0, end: 15, levels: 4 },
    Slot { start: 16, end: 31, levels: 4 },
    // 5-level (length 32) slot.
    Slot { start: 0, end: 31, levels: 5 },
];

/// Stride (in pictures) to advance past one slot's coverage once emitted,
/// indexed by `hierarchical_levels - MIN_HIERARCHICAL_LEVEL` (3).
fn stride_for_levels(levels: u8) -> usize {
    1usize << levels
}

/// Partition a pre-assignment buffer of `buffer_len` pictures into
/// mini-GOPs. `intra_count`/`idr_count` (observed over the whole buffer) are
/// propagated onto the *last* emitted mini-GOP only.
pub fn partition(buffer_len: usize, intra_count: u32, idr_count: u32) -> Result<Vec<MiniGop>, MiniGopError> {
    let mut mini_gops = Vec::new();

    // Prefer the deepest (fewest, widest) mini-GOP whose coverage is fully
    // within the buffer, walking leaves-first and skipping slots that don't
    // fit or that overlap what's already been emitted — mirrors walking the
    // static source table and marking slots "inactive" when they exceed N.
    let mut cursor = 0usize;
    while cursor < buffer_len {
        let mut matched: Option<Slot> = None;
        for slot in SLOTS {
            if slot.start == cursor && slot.end < buffer_len {
                if matched.map(|m| slot.levels > m.levels).unwrap_or(true) {
                    matched = Some(*slot);
                }
            }
        }

        match matched {
            Some(slot) => {
                mini_gops.push(MiniGop {
                    start_index: slot.start,
                    end_index: slot.end,
                    hierarchical_levels: slot.levels,
                    intra_count: 0,
                    idr_count: 0,
                });
                cursor += stride_for_levels(slot.levels);
            }
            None => break,
        }
    }

    // Buffer not fully covered (trailing remainder, or N == 1): emit a
    // synthetic trailing mini-GOP with hierarchical_levels = 3.
    if cursor < buffer_len {
        mini_gops.push(MiniGop {
            start_index: cursor,
            end_index: buffer_len - 1,
            hierarchical_levels: 3,
            intra_count: 0,
            idr_count: 0,
        });
    }

    if mini_gops.is_empty() {
        return Err(MiniGopError::UnknownGopStructure { levels: 0 });
    }

    for mg in &mini_gops {
        if !matches!(mg.hierarchical_levels, 3 | 4 | 5) {
            return Err(MiniGopError::UnknownGopStructure { levels: mg.hierarchical_levels });
        }
    }

    let last = mini_gops.len() - 1;
    mini_gops[last].intra_count = intra_count;
    mini_gops[last].idr_count = idr_count;

    Ok(mini_gops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_picture_emits_synthetic_trailing_minigop() {
        let mgs = partition(1, 1, 1).unwrap();
        assert_eq!(mgs.len(), 1);
        assert_eq!(mgs[0].hierarchical_levels, 3);
        assert_eq!(mgs[0].start_index, 0);
        assert_eq!(mgs[0].end_index, 0);
        assert_eq!(mgs[0].intra_count, 1);
        assert_eq!(mgs[0].idr_count, 1);
    }

    /// 16 pictures after a key frame, hierarchical levels 3, partitions
    /// into two complete 8-length random-access mini-GOPs.
    #[test]
    fn sixteen_pictures_yields_two_complete_eight_minigops() {
        let mgs = partition(16, 0, 0).unwrap();
        assert_eq!(mgs.len(), 2);
        assert_eq!((mgs[0].start_index, mgs[0].end_index), (0, 7));
        assert_eq!((mgs[1].start_index, mgs[1].end_index), (8, 15));
        assert!(mgs.iter().all(|mg| mg.is_complete()));
    }

    #[test]
    fn partial_trailing_buffer_gets_synthetic_minigop() {
        let mgs = partition(10, 0, 0).unwrap();
        assert_eq!(mgs.len(), 2);
        assert_eq!((mgs[0].start_index, mgs[0].end_index), (0, 7));
        assert_eq!(mgs[1].hierarchical_levels, 3);
        assert_eq!((mgs[1].start_index, mgs[1].end_index), (8, 9));
        assert!(!mgs[1].is_complete());
    }

    #[test]
    fn intra_and_idr_counts_land_on_last_minigop_only() {
        let mgs = partition(16, 2, 1).unwrap();
        assert_eq!(mgs[0].intra_count, 0);
        assert_eq!(mgs[0].idr_count, 0);
        assert_eq!(mgs[1].intra_count, 2);
        assert_eq!(mgs[1].idr_count, 1);
    }

    #[test]
    fn thirty_two_pictures_uses_the_five_level_slot() {
        let mgs = partition(32, 0, 0).unwrap();
        assert_eq!(mgs.len(), 1);
        assert_eq!(mgs[0].hierarchical_levels, 5);
        assert_eq!((mgs[0].start_index, mgs[0].end_index), (0, 31));
    }
}
