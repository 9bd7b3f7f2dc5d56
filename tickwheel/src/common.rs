//! Common, primitive identifier types used across the crate.
//!
//! Both keys are versioned slotmap keys: a handle that outlives the value it
//! named becomes inert instead of aliasing whatever reuses the storage, which
//! is what makes handing `TaskId`s to callers safe.

use slotmap::new_key_type;

new_key_type! {
    /// Uniquely identifies a task owned by a [`TimingWheel`](crate::wheel::TimingWheel).
    ///
    /// Returned by `add_task` and accepted by every per-task operation. A
    /// `TaskId` whose task has fired for the last time or been removed simply
    /// stops matching anything.
    pub struct TaskId;

    /// Identifies one pooled list node inside the node arena.
    pub struct NodeId;
}
