use serde::{Deserialize, Serialize};

pub const MS_PER_SECOND: u64 = 1000;
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Decomposed display value of a duration. `hundredths` is display-only;
/// it is not fed back through `to_milliseconds`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub hundredths: u64,
}

/// Whole h/m/s to milliseconds. No clamping; callers own their ranges.
pub fn to_milliseconds(hours: u64, minutes: u64, seconds: u64) -> u64 {
    hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND
}

/// Integer division/modulo decomposition. Pure and total.
pub fn from_milliseconds(ms: u64) -> TimeParts {
    TimeParts {
        hours: ms / MS_PER_HOUR,
        minutes: (ms / MS_PER_MINUTE) % 60,
        seconds: (ms / MS_PER_SECOND) % 60,
        hundredths: (ms % MS_PER_SECOND) / 10,
    }
}
