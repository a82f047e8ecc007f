use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{now_ms, Engine};
use crate::model::Ms;
use crate::observability::{HOLDS_EXPIRED_TOTAL, WAL_COMPACTIONS_TOTAL};

/// Release every hold expired at `now`. Returns how many this call released;
/// holds another sweeper got to first are skipped.
pub async fn sweep_expired_holds(engine: &Engine, now: Ms) -> usize {
    let mut released = 0;
    for hold_id in engine.collect_expired_holds(now) {
        match engine.release_hold(hold_id).await {
            Ok(true) => {
                released += 1;
                info!("reaped expired hold {hold_id}");
            }
            Ok(false) => debug!("hold {hold_id} already released"),
            Err(e) => warn!("failed to release hold {hold_id}: {e}"),
        }
    }
    metrics::counter!(HOLDS_EXPIRED_TOTAL).increment(released as u64);
    released
}

/// Background task that periodically sweeps expired holds.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        sweep_expired_holds(&engine, now_ms()).await;
    }
}

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => {
                metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
                info!("compacted WAL after {appends} appends");
            }
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("teesheet_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn open_course(name: &str) -> Arc<Engine> {
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(test_wal_path(name), notify, 300).unwrap());
        let day = TimeframeSet::new(vec![TimeInterval::parse("06:00", "18:00").unwrap()]).unwrap();
        let template = Template::new(Ulid::new(), day);
        let tid = template.id;
        engine.save_template(template).await.unwrap();
        engine
            .update_settings(CourseSettings {
                default_template: Some(tid),
                ..CourseSettings::default()
            })
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn sweep_releases_only_expired_holds() {
        let engine = open_course("sweep_expired.wal").await;
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let t0: Ms = 1_750_000_000_000;

        let old = engine.place_hold(Ulid::new(), date, 480, t0).await.unwrap();
        let fresh = engine.place_hold(Ulid::new(), date, 490, t0 + 200_000).await.unwrap();

        let now = t0 + 300_000;
        assert_eq!(engine.collect_expired_holds(now), vec![old.id]);
        assert_eq!(sweep_expired_holds(&engine, now).await, 1);
        assert!(engine.hold(&old.id).is_none());
        assert!(engine.hold(&fresh.id).is_some());

        // Nothing left to reap at the same instant.
        assert_eq!(sweep_expired_holds(&engine, now).await, 0);
    }

    #[tokio::test]
    async fn concurrent_sweeps_release_each_hold_once() {
        let engine = open_course("sweep_concurrent.wal").await;
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let t0: Ms = 1_750_000_000_000;
        for minute in [420, 430, 440, 450] {
            engine.place_hold(Ulid::new(), date, minute, t0).await.unwrap();
        }

        let now = t0 + 301_000;
        let (a, b) = tokio::join!(
            sweep_expired_holds(&engine, now),
            sweep_expired_holds(&engine, now)
        );
        assert_eq!(a + b, 4);
        assert!(engine.holds().is_empty());
    }

    #[tokio::test]
    async fn reaper_task_clears_zero_ttl_holds() {
        let path = test_wal_path("reaper_task.wal");
        let engine = Arc::new(Engine::new(path, Arc::new(NotifyHub::new()), 0).unwrap());
        let day = TimeframeSet::new(vec![TimeInterval::parse("06:00", "18:00").unwrap()]).unwrap();
        let template = Template::new(Ulid::new(), day);
        let tid = template.id;
        engine.save_template(template).await.unwrap();
        engine
            .update_settings(CourseSettings {
                default_template: Some(tid),
                ..CourseSettings::default()
            })
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        engine.place_hold(Ulid::new(), date, 600, now_ms()).await.unwrap();

        let task = tokio::spawn(run_reaper(engine.clone(), Duration::from_millis(10)));
        for _ in 0..100 {
            if engine.holds().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(engine.holds().is_empty());
    }
}
