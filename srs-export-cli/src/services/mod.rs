// Reconciliation logic
//
// Pure transforms over list rows (correlation, grouping, labels) plus the
// single workbook round trip used by both the batch run and `check`.

pub mod correlation;
pub mod date_label;
pub mod export;
pub mod grouping;
pub mod shift;
pub mod timestamps;

pub use correlation::{Correlation, filter};
pub use export::{FileCheckOutcome, check_workbook};
pub use grouping::{Grouped, group};
