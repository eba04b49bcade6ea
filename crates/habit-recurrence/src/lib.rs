//! Pure recurrence evaluation: given a tracking's recurrence pattern and
//! schedule list, compute the next absolute instant it fires at.
//!
//! This crate performs no I/O and holds no state; `habit-engine` is the
//! only caller and supplies `now`, the anchor date, and the excluded
//! instant from whatever store it's working against.

mod error;
mod evaluator;

pub use error::{RecurrenceError, Result};
pub use evaluator::next;
