pub mod conversation;
pub mod message;
pub mod user;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time at storage precision, so a freshly created record compares
/// equal to the same record read back.
pub fn storage_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Renders a timestamp in the fixed-width form used for storage, so that
/// lexical order of stored values matches time order.
pub fn storage_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
