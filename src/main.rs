use tracing::{info, warn};

use teesheet::config::Config;
use teesheet::course::CourseManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    teesheet::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let courses = CourseManager::new(
        config.data_dir.clone(),
        config.compact_threshold,
        config.hold_ttl_seconds,
    )
    .with_reaper_interval(config.reaper_interval);

    let reopened = courses.open_existing()?;
    info!("reopened {} courses from {}", reopened.len(), config.data_dir.display());
    for course in &config.courses {
        if let Err(e) = courses.get_or_create(course) {
            warn!("could not open course {course}: {e}");
        }
    }

    info!("teesheet running");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  courses: {}", courses.course_names().join(", "));
    info!("  hold ttl: {}s", config.hold_ttl_seconds);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    // Accepted mutations are already fsynced.
    info!("shutdown signal received, compacting course logs");
    for name in courses.course_names() {
        match courses.get_or_create(&name) {
            Ok(engine) => {
                if let Err(e) = engine.compact_wal().await {
                    warn!("compaction of {name} failed: {e}");
                }
            }
            Err(e) => warn!("could not reach course {name}: {e}"),
        }
    }

    info!("teesheet stopped");
    Ok(())
}
