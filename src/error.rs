//! Error taxonomy for the picture-decision and motion-estimation core.
//!
//! Two-tier shape: a focused error type per subsystem that converts into the
//! top-level [`DecisionError`] via `#[from]`. The transient "not ready yet"
//! case is deliberately *not* a variant here — it is represented positionally
//! as [`crate::driver::DriverStep::NotReady`], so it can never be mis-handled
//! as a fatal error by a caller matching on `Err`.

use thiserror::Error;

/// Errors raised by the scene-transition detector.
#[derive(Error, Debug)]
pub enum SceneDetectError {
    #[error("histogram region count mismatch: expected {expected}, got {actual}")]
    RegionCountMismatch { expected: usize, actual: usize },
}

/// Errors raised while partitioning a pre-assignment buffer into mini-GOPs.
#[derive(Error, Debug)]
pub enum MiniGopError {
    #[error("unexpected GOP structure: hierarchical_levels={levels} is not one of {{0,3,4,5}}")]
    UnknownGopStructure { levels: u8 },
}

/// Errors raised while deriving a picture's reference-picture set.
#[derive(Error, Debug)]
pub enum RpsError {
    #[error("unexpected GOP structure: hierarchical_levels={levels} picture_index={picture_index}")]
    UnexpectedGopStructure { levels: u8, picture_index: usize },
    #[error("show_existing_loc refers to slot {slot} not yet refreshed in this mini-GOP")]
    StaleShowExistingLoc { slot: usize },
}

/// Errors raised by the PA reference queue manager.
#[derive(Error, Debug)]
pub enum PaQueueError {
    #[error("PA reference queue is saturated (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("dependent_count underflow on queue entry for picture {picture_number}")]
    DependentCountUnderflow { picture_number: u64 },
}

/// Errors raised by the top-level picture-decision driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("reorder slot {slot} already occupied by picture {occupant}")]
    DuplicateReorderSlot { slot: usize, occupant: u64 },
    #[error("end-of-sequence flag delivered twice")]
    DuplicateEos,
    #[error("picture_number_hint {got} is not in admission order (expected >= {expected})")]
    OutOfOrderAdmission { got: u64, expected: u64 },
}

/// Top-level error type surfaced by the picture-decision driver. The driver
/// is the only component allowed to surface a stream-fatal error; every
/// other component's error converts into this one at the call site where
/// the driver invokes it.
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("input violated: {0}")]
    InputViolated(String),

    #[error(transparent)]
    SceneDetect(#[from] SceneDetectError),

    #[error(transparent)]
    MiniGop(#[from] MiniGopError),

    #[error(transparent)]
    Rps(#[from] RpsError),

    #[error(transparent)]
    PaQueue(#[from] PaQueueError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type DecisionResult<T> = Result<T, DecisionError>;

impl DecisionError {
    /// Every surfaced variant here is stream-fatal: `InvariantViolated`,
    /// `ResourceExhausted`, and `InputViolated` all are, and the one
    /// non-fatal case, `Transient`, never becomes a `DecisionError` in the
    /// first place — see the module docs.
    pub fn is_stream_fatal(&self) -> bool {
        true
    }
}

/// Errors raised by the motion-estimation core (HME, integer ME, candidate
/// construction, intra OIS, GM detection).
#[derive(Error, Debug)]
pub enum MotionEstimationError {
    #[error("reference pixel buffer missing for (list={list:?}, slot={slot:?})")]
    MissingReference { list: crate::RefList, slot: crate::RefSlot },

    #[error(transparent)]
    Kernel(#[from] anyhow::Error),
}

pub type MeResult<T> = Result<T, MotionEstimationError>;
