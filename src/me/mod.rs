//! Motion Estimation core: HME cascade, full-pel refinement, reference
//! pruning, candidate construction, open-loop intra search, and global
//! motion detection, operating on the per-superblock [`context::SbMeContext`].

pub mod candidate;
pub mod context;
pub mod gm;
pub mod hme;
pub mod integer;
pub mod intra_ois;
pub mod kernels;
pub mod pruning;
