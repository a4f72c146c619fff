//! SAD computation as an external collaborator behind a trait, the way a
//! real encoder would swap in an SIMD kernel without touching search logic.

/// Sum-of-absolute-differences over 8-bit luma blocks. Implementations are
/// expected to be pure functions of their pixel inputs.
pub trait SadKernel {
    /// SAD between a `width`x`height` block of `src` (stride `src_stride`)
    /// and the equally sized block of `reference` (stride `ref_stride`).
    fn sad(
        &self,
        src: &[u8],
        src_stride: usize,
        reference: &[u8],
        ref_stride: usize,
        width: usize,
        height: usize,
    ) -> u32;
}

/// Plain nested-loop SAD. Slow but obviously correct; used by the reference
/// encoder path and by tests that check search logic rather than kernel
/// throughput.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarSadKernel;

impl SadKernel for ScalarSadKernel {
    fn sad(
        &self,
        src: &[u8],
        src_stride: usize,
        reference: &[u8],
        ref_stride: usize,
        width: usize,
        height: usize,
    ) -> u32 {
        let mut sum = 0u32;
        for y in 0..height {
            let src_row = &src[y * src_stride..y * src_stride + width];
            let ref_row = &reference[y * ref_stride..y * ref_stride + width];
            for (a, b) in src_row.iter().zip(ref_row.iter()) {
                sum += (*a as i32 - *b as i32).unsigned_abs();
            }
        }
        sum
    }
}

/// Sub-sampled SAD: only even rows are summed, and the result doubled to
/// estimate the full-block cost. Used by HME levels when
/// `HmeSearchMethod::SubSad` is configured, trading accuracy for speed the
/// way HME search is allowed to.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubSadKernel;

impl SadKernel for SubSadKernel {
    fn sad(
        &self,
        src: &[u8],
        src_stride: usize,
        reference: &[u8],
        ref_stride: usize,
        width: usize,
        height: usize,
    ) -> u32 {
        let mut sum = 0u32;
        let mut y = 0;
        while y < height {
            let src_row = &src[y * src_stride..y * src_stride + width];
            let ref_row = &reference[y * ref_stride..y * ref_stride + width];
            for (a, b) in src_row.iter().zip(ref_row.iter()) {
                sum += (*a as i32 - *b as i32).unsigned_abs();
            }
            y += 2;
        }
        sum * 2
    }
}
