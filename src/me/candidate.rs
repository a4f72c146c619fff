//! Candidate Builder: turns a superblock's per-reference search results
//! into an ordered list of prediction candidates for mode decision —
//! uni-predicted from each list first, then bi-predicted combinations,
//! mirroring the `inject_cand` gating seen around candidate injection in
//! `EbMotionEstimation.c` (a candidate is injected only if it clears a
//! distance-to-best pruning check).
//!
//! Candidate order is positional, not SAD-sorted: all of list 0's
//! uni-preds, then all of list 1's, then bi-preds in three fixed
//! sub-orders — across lists, then within list 0 pairing ref 0 against
//! every other surviving list-0 ref, then within list 1 pairing ref 0
//! against ref 2. Mode decision downstream relies on that fixed shape to
//! locate e.g. "the within-list0 ref-0/ref-1 bipred" without a search.

use crate::me::context::SbMeContext;
use crate::Mv;

/// Hard cap on candidates returned per partition: 4 list-0 refs + 3
/// list-1 refs worth of uni-preds (7), every cross-list bipred pairing
/// (4 * 3 = 12), every within-list0 bipred pairing ref 0 against one of
/// the other 3 list-0 refs (3), and the one within-list1 ref-0/ref-2
/// bipred (1).
pub const MAX_PA_ME_CAND: usize = 23;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionDirection {
    List0,
    List1,
}

impl PredictionDirection {
    pub fn index(self) -> usize {
        match self {
            PredictionDirection::List0 => 0,
            PredictionDirection::List1 => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    Uni {
        dir: PredictionDirection,
        ref_index: usize,
        mv: Mv,
        sad: u32,
    },
    Bi {
        dir0: PredictionDirection,
        ref_index0: usize,
        mv0: Mv,
        dir1: PredictionDirection,
        ref_index1: usize,
        mv1: Mv,
        sad: u32,
    },
}

impl Candidate {
    fn sad(&self) -> u32 {
        match *self {
            Candidate::Uni { sad, .. } => sad,
            Candidate::Bi { sad, .. } => sad,
        }
    }
}

/// Indices of a list's references that survived pruning, in ascending
/// order.
fn surviving(ctx: &SbMeContext, list: usize) -> Vec<usize> {
    (0..ctx.results[list].len()).filter(|&ri| !ctx.pruned[list][ri]).collect()
}

fn bi_sad(a: u32, b: u32) -> u32 {
    // Average SAD approximates the true bi-pred cost, which would
    // otherwise require compensating both predictors.
    (a + b) / 2
}

/// Build the ordered candidate list for one `partition` of a superblock.
/// `prune_th` is a percent: a candidate whose SAD exceeds the best
/// candidate's SAD by more than `prune_th`% is dropped, matching
/// `prune_me_candidates_th`'s role gating `inject_cand`. Pruning and the
/// final cap never reorder what survives them.
pub fn build(ctx: &SbMeContext, partition: usize, prune_th: u32) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    let survive0 = surviving(ctx, 0);
    let survive1 = surviving(ctx, 1);

    for &ri in &survive0 {
        let r = ctx.results[0][ri][partition];
        candidates.push(Candidate::Uni { dir: PredictionDirection::List0, ref_index: ri, mv: r.best_mv, sad: r.best_sad });
    }
    for &ri in &survive1 {
        let r = ctx.results[1][ri][partition];
        candidates.push(Candidate::Uni { dir: PredictionDirection::List1, ref_index: ri, mv: r.best_mv, sad: r.best_sad });
    }

    // (a) bipreds across lists.
    for &ri0 in &survive0 {
        for &ri1 in &survive1 {
            let r0 = ctx.results[0][ri0][partition];
            let r1 = ctx.results[1][ri1][partition];
            candidates.push(Candidate::Bi {
                dir0: PredictionDirection::List0,
                ref_index0: ri0,
                mv0: r0.best_mv,
                dir1: PredictionDirection::List1,
                ref_index1: ri1,
                mv1: r1.best_mv,
                sad: bi_sad(r0.best_sad, r1.best_sad),
            });
        }
    }

    // (b) bipreds within list 0, ref 0 against every other surviving ref.
    if survive0.contains(&0) {
        let r0 = ctx.results[0][0][partition];
        for &ri in &survive0 {
            if ri == 0 {
                continue;
            }
            let r1 = ctx.results[0][ri][partition];
            candidates.push(Candidate::Bi {
                dir0: PredictionDirection::List0,
                ref_index0: 0,
                mv0: r0.best_mv,
                dir1: PredictionDirection::List0,
                ref_index1: ri,
                mv1: r1.best_mv,
                sad: bi_sad(r0.best_sad, r1.best_sad),
            });
        }
    }

    // (c) the one bipred within list 1, ref 0 against ref 2.
    if survive1.contains(&0) && survive1.contains(&2) {
        let r0 = ctx.results[1][0][partition];
        let r1 = ctx.results[1][2][partition];
        candidates.push(Candidate::Bi {
            dir0: PredictionDirection::List1,
            ref_index0: 0,
            mv0: r0.best_mv,
            dir1: PredictionDirection::List1,
            ref_index1: 2,
            mv1: r1.best_mv,
            sad: bi_sad(r0.best_sad, r1.best_sad),
        });
    }

    if candidates.is_empty() {
        return candidates;
    }
    let best_sad = candidates.iter().map(Candidate::sad).min().unwrap();
    if prune_th > 0 {
        candidates.retain(|c| {
            let dist = c.sad().saturating_sub(best_sad) as u64 * 100;
            dist <= prune_th as u64 * best_sad.max(1) as u64
        });
    }
    candidates.truncate(MAX_PA_ME_CAND);
    candidates
}
