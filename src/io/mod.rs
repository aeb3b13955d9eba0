//! CSV boundary: hourly input and degradation loading, trace export.

pub mod export;
pub mod load;
