pub mod charts;
pub mod report_writer;

pub use charts::*;
pub use report_writer::*;
