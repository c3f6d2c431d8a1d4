use chrono::{DateTime, Utc};
use std::time::Duration;

/// Whether `latest` falls within `window` of `now`. No heartbeat at all is
/// never fresh.
pub fn heartbeat_is_fresh(
    latest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    let Some(latest) = latest else {
        return false;
    };
    let Ok(window) = chrono::Duration::from_std(window) else {
        return true;
    };
    now.signed_duration_since(latest) <= window
}
