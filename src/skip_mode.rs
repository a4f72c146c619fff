//! Skip-mode derivation: which two reference slots (if any) a B-picture
//! should use for `skip_mode`-coded blocks.
//!
//! A skip-mode block copies motion directly from one forward and one
//! backward reference with no signaled MV or residual, so the two
//! candidates have to be the *nearest* picture on each side in display
//! order. Grounded on the same `relative_dist` order-hint arithmetic the
//! rest of this crate already uses for DPB bookkeeping, rather than a
//! separate POC-subtraction helper.

use crate::picture::{Rps, SkipMode};
use crate::{relative_dist, RefSlot};

/// Find the candidate with the smallest positive (forward) or smallest
/// magnitude negative (backward) relative distance from `cur_poc`, among
/// the slots named by `candidates`.
fn nearest(
    rps: &Rps,
    cur_poc: u64,
    order_hint_bits: u32,
    candidates: &[RefSlot],
    forward: bool,
) -> Option<(RefSlot, i32)> {
    candidates
        .iter()
        .filter_map(|&slot| {
            let (_, poc) = rps.slot(slot);
            let dist = relative_dist(poc, cur_poc, order_hint_bits);
            let in_direction = if forward { dist > 0 } else { dist < 0 };
            in_direction.then_some((slot, dist.abs()))
        })
        .min_by_key(|(_, dist)| *dist)
}

/// Derive skip-mode allowance and reference pair for a B-picture. Returns
/// `SkipMode::default()` (not allowed) for any picture that isn't
/// bidirectionally predicted, or that lacks a usable reference on either
/// side.
pub fn derive(rps: &Rps, cur_poc: u64, order_hint_bits: u32, is_bipred_slice: bool) -> SkipMode {
    if !is_bipred_slice {
        return SkipMode::default();
    }

    const FORWARD: [RefSlot; 4] = [RefSlot::Last, RefSlot::Last2, RefSlot::Last3, RefSlot::Gold];
    const BACKWARD: [RefSlot; 3] = [RefSlot::Bwd, RefSlot::Alt2, RefSlot::Alt];

    let Some((fwd_slot, _)) = nearest(rps, cur_poc, order_hint_bits, &FORWARD, true) else {
        return SkipMode::default();
    };
    let Some((bwd_slot, _)) = nearest(rps, cur_poc, order_hint_bits, &BACKWARD, false) else {
        return SkipMode::default();
    };

    SkipMode {
        allowed: true,
        ref_frame_idx_0: fwd_slot.index() as u8,
        ref_frame_idx_1: bwd_slot.index() as u8,
    }
}

/// As [`derive`], but falls back to the second-nearest forward reference
/// when the nearest forward reference is also the nearest backward
/// reference's mirror (i.e. the two candidates would end up equidistant in
/// both directions and skip mode gains nothing over ordinary compound
/// prediction). Kept distinct from [`derive`] because not every prediction
/// structure wants the fallback.
pub fn derive_with_fallback(
    rps: &Rps,
    cur_poc: u64,
    order_hint_bits: u32,
    is_bipred_slice: bool,
) -> SkipMode {
    let primary = derive(rps, cur_poc, order_hint_bits, is_bipred_slice);
    if !primary.allowed {
        return primary;
    }

    const FORWARD: [RefSlot; 4] = [RefSlot::Last, RefSlot::Last2, RefSlot::Last3, RefSlot::Gold];
    const BACKWARD: [RefSlot; 3] = [RefSlot::Bwd, RefSlot::Alt2, RefSlot::Alt];

    let (_, fwd_dist) = nearest(rps, cur_poc, order_hint_bits, &FORWARD, true).unwrap();
    let (_, bwd_dist) = nearest(rps, cur_poc, order_hint_bits, &BACKWARD, false).unwrap();

    if fwd_dist != bwd_dist {
        return primary;
    }

    let remaining: Vec<RefSlot> = FORWARD
        .into_iter()
        .filter(|&s| s.index() as u8 != primary.ref_frame_idx_0)
        .collect();
    match nearest(rps, cur_poc, order_hint_bits, &remaining, true) {
        Some((second_fwd, _)) => SkipMode {
            allowed: true,
            ref_frame_idx_0: second_fwd.index() as u8,
            ref_frame_idx_1: primary.ref_frame_idx_1,
        },
        None => primary,
    }
}
