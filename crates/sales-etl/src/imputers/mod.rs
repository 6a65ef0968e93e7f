//! Missing value fill strategies.
//!
//! Each imputer targets exactly one column and leaves every other column
//! untouched.

mod statistical;

pub use statistical::{FillOutcome, StatisticalImputer};
