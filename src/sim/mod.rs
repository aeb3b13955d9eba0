/// Single-hour dispatch state machine.
pub mod dispatch;
pub mod engine;
pub mod kpi;
pub mod monthly;
/// Time-of-use tariff periods.
pub mod tariff;
pub mod types;
