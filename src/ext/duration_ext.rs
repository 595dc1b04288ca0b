use std::time::Duration;

const SECONDS_LIMIT: f64 = 120.0;
const MINUTES_LIMIT: f64 = 7200.0;

pub trait DurationExt {
    /// Short human-readable form: whole seconds (rounded up) under two
    /// minutes, rounded minutes under two hours, rounded hours above.
    fn to_human_interval(&self) -> String;
}

impl DurationExt for Duration {
    fn to_human_interval(&self) -> String {
        let seconds = self.as_secs_f64();
        if seconds < SECONDS_LIMIT {
            format!("{}s", seconds.ceil())
        } else if seconds < MINUTES_LIMIT {
            format!("{}m", (seconds / 60.0).round())
        } else {
            format!("{}h", (seconds / 3600.0).round())
        }
    }
}
