//! Property tests over the universal invariants that hold across any valid
//! input, not just the handful of concrete scenarios exercised by unit
//! tests: MV range, DPB slot bounds, and mini-GOP/RPS decode-order
//! consistency across arbitrary hierarchical structures.

use picture_decision::rps::{decode_order_offsets, layer_for_offset, HierarchicalDecision, RpsGenerator};
use picture_decision::{Mv, DPB_SIZE, MV_LOW, MV_UPP, REF_FRAMES};
use proptest::prelude::*;

proptest! {
    #[test]
    fn mv_new_always_clamps_into_range(x in any::<i32>(), y in any::<i32>()) {
        let mv = Mv::new(x, y);
        prop_assert!((mv.x as i32) >= MV_LOW && (mv.x as i32) <= MV_UPP);
        prop_assert!((mv.y as i32) >= MV_LOW && (mv.y as i32) <= MV_UPP);
    }

    #[test]
    fn layer_for_offset_is_never_deeper_than_five(length in prop_oneof![Just(8u32), Just(16u32)]) {
        for offset in 1..=length {
            let layer = layer_for_offset(offset, length);
            prop_assert!(layer <= 4);
        }
    }

    #[test]
    fn decode_order_offsets_is_a_permutation_of_one_to_length(length in prop_oneof![Just(8u32), Just(16u32)]) {
        let mut offsets = decode_order_offsets(length);
        offsets.sort();
        let expected: Vec<u32> = (1..=length).collect();
        prop_assert_eq!(offsets, expected);
    }

    #[test]
    fn hierarchical_rps_dpb_indices_are_always_in_range(levels in prop_oneof![Just(3u8), Just(4u8), Just(5u8)]) {
        let length = 1u32 << levels;
        let mut gen = RpsGenerator::new();
        for offset in decode_order_offsets(length) {
            let decision: HierarchicalDecision = gen.generate_hierarchical(offset, length, levels, offset as u64).unwrap();
            for &slot in decision.rps.dpb_index.iter() {
                prop_assert!((slot as usize) < DPB_SIZE);
            }
            prop_assert_eq!(decision.rps.dpb_index.len(), REF_FRAMES);
        }
    }
}
