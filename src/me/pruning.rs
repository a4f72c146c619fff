//! Reference pruning: drop references whose HME/ME SAD is far worse than
//! the best reference in the same list, so the full-pel search and
//! candidate construction don't waste cycles on references unlikely to be
//! chosen. Grounded on `me_prune_ref`/`hme_prune_ref_and_adjust_sr`'s
//! `(sad - best) * 100 > th * best` deviation test.

use crate::config::MeHmePrune;
use crate::me::context::SbMeContext;

/// Mark references in both lists of `ctx` as pruned wherever their SAD at
/// `partition` deviates from the list's best by more than `cfg`'s
/// threshold. Reference index 0 in each list is exempt when
/// `protect_closest_refs` is set, matching the `ri > 0` guard in both
/// pruning passes.
pub fn apply(ctx: &mut SbMeContext, cfg: &MeHmePrune, partition: usize, threshold_percent: u32) {
    for list in 0..2 {
        let sads: Vec<u32> = ctx.results[list].iter().map(|r| r[partition].best_sad).collect();
        let Some(&best) = sads.iter().min() else { continue };
        if best == 0 {
            continue;
        }
        for (ri, &sad) in sads.iter().enumerate() {
            if cfg.protect_closest_refs && ri == 0 {
                continue;
            }
            let deviation = (sad.saturating_sub(best)) as u64 * 100;
            if deviation > threshold_percent as u64 * best as u64 {
                ctx.pruned[list][ri] = true;
                log::debug!("pruning list={list} ref_index={ri} sad={sad} best={best}");
            }
        }
    }
}

/// Shrink a full-pel search window's half-extents for a reference whose
/// HME SAD is low relative to the best, on the theory that a
/// near-stationary reference needs less search radius. Mirrors
/// `MeSrAdjustment`'s SAD-based search-radius reduction.
pub fn adjusted_half_extent(base_half_extent: i32, hme_sad: u32, best_hme_sad: u32, divisor: u32) -> i32 {
    if best_hme_sad == 0 {
        return base_half_extent;
    }
    let ratio_ok = (hme_sad as u64) * 100 <= (best_hme_sad as u64) * 150;
    if ratio_ok && divisor > 1 {
        (base_half_extent / divisor as i32).max(1)
    } else {
        base_half_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::me::context::SearchResult;
    use crate::Mv;

    fn cfg() -> MeHmePrune {
        MeHmePrune { prune_ref_if_hme_sad_dev_bigger_than_th: 60, prune_ref_if_me_sad_dev_bigger_than_th: 60, protect_closest_refs: true }
    }

    /// list0 has refs with SAD [100, 400]; 400 deviates by 300% from the
    /// 60% threshold, so reference index 1 is pruned while index 0 (the
    /// best, and closest) survives.
    #[test]
    fn far_worse_reference_is_pruned() {
        let mut ctx = SbMeContext::new(0, 0, [2, 0]);
        ctx.results[0][0][0] = SearchResult { best_sad: 100, best_mv: Mv::ZERO };
        ctx.results[0][1][0] = SearchResult { best_sad: 400, best_mv: Mv::ZERO };
        apply(&mut ctx, &cfg(), 0, 60);
        assert!(!ctx.pruned[0][0]);
        assert!(ctx.pruned[0][1]);
    }

    #[test]
    fn closest_reference_is_protected_even_if_worse() {
        let mut ctx = SbMeContext::new(0, 0, [2, 0]);
        ctx.results[0][0][0] = SearchResult { best_sad: 400, best_mv: Mv::ZERO };
        ctx.results[0][1][0] = SearchResult { best_sad: 100, best_mv: Mv::ZERO };
        apply(&mut ctx, &cfg(), 0, 60);
        assert!(!ctx.pruned[0][0]);
        assert!(!ctx.pruned[0][1]);
    }

    #[test]
    fn stationary_reference_gets_reduced_search_radius() {
        assert_eq!(adjusted_half_extent(32, 10, 100, 4), 8);
    }

    #[test]
    fn far_from_best_reference_keeps_full_radius() {
        assert_eq!(adjusted_half_extent(32, 1000, 100, 4), 32);
    }
}
