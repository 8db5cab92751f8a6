pub mod ratio;
pub mod time_source;

pub use self::ratio::Ratio;
pub use self::time_source::{InstantTimeSrc, TimeSource};
