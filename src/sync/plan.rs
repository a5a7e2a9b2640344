//! Execution order for the eight mutation classes of a diff.
//!
//! The order is fixed so that every step only references rows guaranteed to
//! exist at that point: speakers are settled before any script line can
//! point at them, deletes run before creates, and the document status flips
//! last. The applier iterates [`EXECUTION_ORDER`] rather than hard-coding
//! the call sequence, so the contract is verifiable on its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStep {
    DeleteSpeakers,
    CreateSpeakers,
    UpdateSpeakers,
    DeleteLines,
    CreateLines,
    UpdateLines,
    ReorderLines,
    UpdateStatus,
}

pub const EXECUTION_ORDER: [DiffStep; 8] = [
    DiffStep::DeleteSpeakers,
    DiffStep::CreateSpeakers,
    DiffStep::UpdateSpeakers,
    DiffStep::DeleteLines,
    DiffStep::CreateLines,
    DiffStep::UpdateLines,
    DiffStep::ReorderLines,
    DiffStep::UpdateStatus,
];
