//! Pipeline bookkeeping models

pub mod work_item;

pub use work_item::{
    DateSummary, FailedItem, RunSummary, StateTransition, TitleOutcome, TitleResult, WorkState,
    WorkTracker,
};
