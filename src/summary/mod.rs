//! Per-month listings of every recorded transaction.
//!
//! Transactions are grouped by the calendar month they were created in, as seen from the
//! configured local timezone.

mod aggregation;
mod endpoint;

pub use aggregation::{MonthlySummary, SummaryEntry, YearMonth, get_monthly_summary};
pub use endpoint::get_monthly_summary_endpoint;
