//! Metrics for directory authentication
//!
//! Recorded through the `metrics` facade; installing an exporter is up to the
//! host application.

use ::metrics::{counter, histogram};

/// Metric names
pub mod names {
    pub const DIRECTORY_QUERIES_TOTAL: &str = "dirauth_directory_queries_total";
    pub const AUTHENTICATIONS_TOTAL: &str = "dirauth_authentications_total";
    pub const AUTHENTICATION_DURATION_SECONDS: &str = "dirauth_authentication_duration_seconds";
    pub const RESOLVED_GROUPS: &str = "dirauth_resolved_groups";
}

/// Count one directory search by purpose
pub fn record_directory_query(kind: &'static str) {
    counter!(names::DIRECTORY_QUERIES_TOTAL, "kind" => kind).increment(1);
}

/// Count one authentication by outcome code ("Success" or an error code)
pub fn record_authentication(outcome: &'static str, duration_secs: f64) {
    counter!(names::AUTHENTICATIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::AUTHENTICATION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_resolved_groups(count: usize) {
    histogram!(names::RESOLVED_GROUPS).record(count as f64);
}
