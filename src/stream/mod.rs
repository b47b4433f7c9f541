//! Stream module - per-stream flow-control state machines.
//!
//! One [`StreamFlow`] per logical stream holds the two half-stream records
//! (initial and reply), each combining a lifecycle bitset with window
//! bookkeeping. [`BudgetRegistry`] holds the worker-local shared credit
//! pools referenced by `budget_id`.

mod budget;
mod flow;
mod state;

pub use budget::BudgetRegistry;
pub use flow::{validate_header, HalfFlow, HalfWindow, StreamFlow};
pub use state::{HalfState, HalfStreamState};
