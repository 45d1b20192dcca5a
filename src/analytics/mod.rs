pub mod report;
pub mod snapshot;

pub use report::{build_report, user_report, Report, ReportError, ReportKind};
