//! Small value types shared across the dashboard.

mod timestamp;

pub use timestamp::Timestamp;
