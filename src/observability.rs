use std::net::SocketAddr;

// ── Configuration edits ─────────────────────────────────────────

/// Counter: band-set commits. Labels: owner, status.
pub const TIMEFRAME_COMMITS_TOTAL: &str = "teesheet_timeframe_commits_total";

/// Counter: ambiguous season ranges reported on save.
pub const CONFIG_WARNINGS_TOTAL: &str = "teesheet_config_warnings_total";

/// Counter: date resolutions. Labels: source.
pub const RESOLUTIONS_TOTAL: &str = "teesheet_resolutions_total";

// ── Cart holds ──────────────────────────────────────────────────

/// Gauge: holds currently active across all courses.
pub const HOLDS_ACTIVE: &str = "teesheet_holds_active";

/// Counter: holds placed.
pub const HOLDS_PLACED_TOTAL: &str = "teesheet_holds_placed_total";

/// Counter: holds released by the sweeper after expiry.
pub const HOLDS_EXPIRED_TOTAL: &str = "teesheet_holds_expired_total";

// ── Storage ─────────────────────────────────────────────────────

/// Gauge: open course engines.
pub const COURSES_ACTIVE: &str = "teesheet_courses_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "teesheet_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "teesheet_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "teesheet_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter on {addr}: {e}"),
    }
}
