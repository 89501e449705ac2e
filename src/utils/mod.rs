pub mod cftime;
pub mod constants;
pub mod files;
pub mod progress;

pub use cftime::{is_after_epoch, num2date, truncate_to_minute, TimeUnits};
pub use constants::*;
pub use files::expand_input;
pub use progress::ProgressReporter;
