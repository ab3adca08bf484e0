use chrono::Utc;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns now, but never earlier than `floor`; keeps recorded step timings
/// ordered even if the wall clock steps backwards.
pub fn now_millis_not_before(floor: i64) -> i64 {
    now_millis().max(floor)
}
