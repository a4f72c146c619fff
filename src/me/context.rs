//! Per-superblock motion estimation context: best-SAD/MV results for every
//! partition of a 64x64 superblock, across every reference in both lists,
//! plus the working state HME hands down to the full-pel integer search.

use crate::me::candidate::PredictionDirection;
use crate::Mv;

/// Index order follows a fixed partition enumeration: 1 block at 64x64, 4 at
/// 32x32, 16 at 16x16, 64 at 8x8 — 85 entries total, matching the
/// `me_results` shape a real block-based ME context carries per superblock.
pub const PARTITION_COUNT: usize = 1 + 4 + 16 + 64;

/// Result of a full-pel search against a single reference: the best SAD
/// found and the motion vector (in quarter-pel units) that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub best_sad: u32,
    pub best_mv: Mv,
}

/// One HME level's search-center output, before the full-pel refinement
/// that integer.rs performs around it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HmeSearchCenter {
    pub x: i16,
    pub y: i16,
    pub sad: u32,
}

/// All per-reference, per-partition motion search state for one
/// superblock, across both prediction lists.
#[derive(Clone, Debug)]
pub struct SbMeContext {
    pub sb_origin_x: u32,
    pub sb_origin_y: u32,
    /// `[list][ref_index][partition]`.
    pub results: [Vec<[SearchResult; PARTITION_COUNT]>; 2],
    /// `[list][ref_index]`, the HME level-0/1/2 cascade's final center,
    /// consumed by integer.rs as the origin of its full-pel window.
    pub hme_centers: [Vec<HmeSearchCenter>; 2],
    /// Set by pruning.rs; a pruned reference is skipped by integer.rs and
    /// excluded from candidate.rs's list construction.
    pub pruned: [Vec<bool>; 2],
}

impl SbMeContext {
    pub fn new(sb_origin_x: u32, sb_origin_y: u32, ref_counts: [usize; 2]) -> Self {
        let make = |n: usize| vec![[SearchResult::default(); PARTITION_COUNT]; n];
        SbMeContext {
            sb_origin_x,
            sb_origin_y,
            results: [make(ref_counts[0]), make(ref_counts[1])],
            hme_centers: [
                vec![HmeSearchCenter::default(); ref_counts[0]],
                vec![HmeSearchCenter::default(); ref_counts[1]],
            ],
            pruned: [vec![false; ref_counts[0]], vec![false; ref_counts[1]]],
        }
    }

    pub fn ref_count(&self, dir: PredictionDirection) -> usize {
        self.results[dir.index()].len()
    }

    /// Best SAD for `partition` among the non-pruned references of `dir`,
    /// with the winning reference index.
    pub fn best_of_list(&self, dir: PredictionDirection, partition: usize) -> Option<(usize, SearchResult)> {
        let list = dir.index();
        self.results[list]
            .iter()
            .enumerate()
            .zip(self.pruned[list].iter())
            .filter(|(_, &p)| !p)
            .map(|((i, r), _)| (i, r[partition]))
            .min_by_key(|(_, r)| r.best_sad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_zeroed_and_sized_per_list() {
        let ctx = SbMeContext::new(0, 0, [2, 1]);
        assert_eq!(ctx.ref_count(PredictionDirection::List0), 2);
        assert_eq!(ctx.ref_count(PredictionDirection::List1), 1);
        assert_eq!(ctx.results[0][0][0], SearchResult::default());
    }

    #[test]
    fn best_of_list_skips_pruned_references() {
        let mut ctx = SbMeContext::new(0, 0, [2, 0]);
        ctx.results[0][0][5] = SearchResult { best_sad: 10, best_mv: Mv::ZERO };
        ctx.results[0][1][5] = SearchResult { best_sad: 3, best_mv: Mv::ZERO };
        ctx.pruned[0][1] = true;
        let (idx, r) = ctx.best_of_list(PredictionDirection::List0, 5).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(r.best_sad, 10);
    }
}
