//! Metric name and label definitions.
//!
//! Centralizing names keeps them consistent across crates and documents what
//! is available.

/// Reply pipeline metrics
pub mod auto_reply {
    /// Total inbound messages received for processing
    pub const MESSAGES_RECEIVED_TOTAL: &str = "parley_auto_reply_messages_received_total";
    /// Directives handled (labels: directive)
    pub const DIRECTIVES_TOTAL: &str = "parley_auto_reply_directives_total";
    /// Directive validation failures (labels: directive)
    pub const DIRECTIVE_ERRORS_TOTAL: &str = "parley_auto_reply_directive_errors_total";
    /// End-to-end reply duration in seconds
    pub const PROCESSING_DURATION_SECONDS: &str = "parley_auto_reply_processing_duration_seconds";
}

/// Concurrency lane metrics
pub mod lanes {
    /// Lanes currently held in memory
    pub const ACTIVE: &str = "parley_lanes_active";
    /// Agent runs started
    pub const RUNS_TOTAL: &str = "parley_lane_runs_total";
    /// Agent run duration in seconds
    pub const RUN_DURATION_SECONDS: &str = "parley_lane_run_duration_seconds";
    /// Agent runs that hit the timeout
    pub const RUN_TIMEOUTS_TOTAL: &str = "parley_lane_run_timeouts_total";
    /// Messages injected into a streaming run
    pub const STEERED_TOTAL: &str = "parley_lane_steered_total";
    /// Messages queued behind an active run (labels: mode)
    pub const QUEUED_TOTAL: &str = "parley_lane_queued_total";
    /// Messages dropped or summarized by the cap (labels: policy)
    pub const DROPPED_TOTAL: &str = "parley_lane_dropped_total";
    /// Runs aborted by /stop or interrupt
    pub const ABORTS_TOTAL: &str = "parley_lane_aborts_total";
}

/// Session store metrics
pub mod session {
    /// Session entries created
    pub const CREATED_TOTAL: &str = "parley_sessions_created_total";
    /// Store files written
    pub const STORE_WRITES_TOTAL: &str = "parley_session_store_writes_total";
    /// Store files that could not be read or parsed
    pub const STORE_LOAD_ERRORS_TOTAL: &str = "parley_session_store_load_errors_total";
}

/// Sandbox media metrics
pub mod media {
    /// Attachments copied into session workspaces
    pub const STAGED_TOTAL: &str = "parley_media_staged_total";
}

/// Common label keys
pub mod labels {
    pub const DIRECTIVE: &str = "directive";
    pub const MODE: &str = "mode";
    pub const POLICY: &str = "policy";
}
