//! Boundary to the tee-sheet service that turns an effective timeframe into
//! bookable slots.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::model::{format_time, EffectiveTimeframe, Source};

pub const CHECK_CLEAN_PATH: &str = "/api/v1/tee-sheets/check-clean";
pub const GENERATE_PATH: &str = "/api/v1/internal/generate";

/// Answer to "has anyone booked on this date yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckClean {
    pub clean: bool,
    pub date: NaiveDate,
}

impl CheckClean {
    pub fn from_json(body: &str) -> Result<Self, GatewayError> {
        Ok(serde_json::from_str(body)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub start: String,
    pub end: String,
}

/// Body of a generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub course: String,
    pub date: NaiveDate,
    pub bands: Vec<Band>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub source: Source,
}

impl GenerateRequest {
    pub fn from_effective(course: &str, effective: &EffectiveTimeframe) -> Self {
        let bands = effective
            .timeframes
            .sorted()
            .into_iter()
            .map(|band| Band {
                start: format_time(band.start()),
                end: format_time(band.end()),
            })
            .collect();
        Self {
            course: course.to_string(),
            date: effective.date,
            bands,
            color: effective.color.clone(),
            source: effective.source,
        }
    }

    pub fn to_json(&self) -> Result<String, GatewayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Failure talking to the tee-sheet service. The message is passed through
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError(pub String);

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tee-sheet service error: {}", self.0)
    }
}

impl std::error::Error for GatewayError {}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError(e.to_string())
    }
}

#[async_trait]
pub trait TeeSheetGateway: Send + Sync {
    async fn check_clean(&self, course: &str, date: NaiveDate) -> Result<CheckClean, GatewayError>;
    async fn generate(&self, request: &GenerateRequest) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Generated(EffectiveTimeframe),
    /// Bookings already exist; the sheet was left alone.
    Dirty { date: NaiveDate },
}

/// Regenerate `date`'s tee sheet from the current configuration, unless
/// the date already carries bookings.
pub async fn publish_date(
    engine: &Engine,
    gateway: &dyn TeeSheetGateway,
    course: &str,
    date: NaiveDate,
) -> Result<PublishOutcome, GatewayError> {
    let check = gateway.check_clean(course, date).await?;
    if !check.clean {
        debug!("{course} {date} has bookings, skipping generation");
        return Ok(PublishOutcome::Dirty { date });
    }

    let effective = engine.effective_timeframe(date).await;
    let request = GenerateRequest::from_effective(course, &effective);
    gateway.generate(&request).await?;
    info!(
        "generated {course} {date} from {} with {} bands",
        effective.source.as_str(),
        request.bands.len()
    );
    Ok(PublishOutcome::Generated(effective))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use std::sync::{Arc, Mutex};
    use ulid::Ulid;

    #[derive(Default)]
    struct FakeGateway {
        dirty: Vec<NaiveDate>,
        fail_generate: bool,
        generated: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait]
    impl TeeSheetGateway for FakeGateway {
        async fn check_clean(
            &self,
            _course: &str,
            date: NaiveDate,
        ) -> Result<CheckClean, GatewayError> {
            Ok(CheckClean {
                clean: !self.dirty.contains(&date),
                date,
            })
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<(), GatewayError> {
            if self.fail_generate {
                return Err(GatewayError("503 Service Unavailable".into()));
            }
            self.generated.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn test_engine(name: &str) -> Engine {
        let dir = std::env::temp_dir().join("teesheet_test_gateway");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        Engine::new(path, Arc::new(NotifyHub::new()), 300).unwrap()
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn check_clean_parses_service_body() {
        let check = CheckClean::from_json(r#"{"clean":false,"date":"2025-06-01"}"#).unwrap();
        assert!(!check.clean);
        assert_eq!(check.date, june(1));
        assert!(CheckClean::from_json("{\"clean\":1}").is_err());
    }

    #[test]
    fn generate_request_lists_bands_in_time_order() {
        let effective = EffectiveTimeframe {
            date: june(1),
            timeframes: TimeframeSet::new(vec![
                TimeInterval::parse("13:00", "17:00").unwrap(),
                TimeInterval::parse("07:00", "11:30").unwrap(),
            ])
            .unwrap(),
            color: Some("#2e7d32".into()),
            source: Source::Season,
        };
        let json = GenerateRequest::from_effective("pines", &effective).to_json().unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"course":"pines","date":"2025-06-01","#,
                r#""bands":[{"start":"07:00","end":"11:30"},{"start":"13:00","end":"17:00"}],"#,
                r##""color":"#2e7d32","source":"season"}"##,
            )
        );
    }

    #[tokio::test]
    async fn publish_generates_clean_date() {
        let engine = test_engine("publish_clean.wal");
        let season = Season::new(
            Ulid::new(),
            june(1),
            june(30),
            TimeframeSet::new(vec![TimeInterval::parse("07:00", "19:00").unwrap()]).unwrap(),
        );
        engine.save_season(season).await.unwrap();
        let gateway = FakeGateway::default();

        let outcome = publish_date(&engine, &gateway, "pines", june(10)).await.unwrap();
        match outcome {
            PublishOutcome::Generated(effective) => assert_eq!(effective.source, Source::Season),
            other => panic!("expected Generated, got {other:?}"),
        }
        let generated = gateway.generated.lock().unwrap();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].bands[0].start, "07:00");
    }

    #[tokio::test]
    async fn publish_skips_dirty_date() {
        let engine = test_engine("publish_dirty.wal");
        let gateway = FakeGateway {
            dirty: vec![june(2)],
            ..FakeGateway::default()
        };

        let outcome = publish_date(&engine, &gateway, "pines", june(2)).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Dirty { date: june(2) });
        assert!(gateway.generated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_passes_service_errors_through() {
        let engine = test_engine("publish_error.wal");
        let gateway = FakeGateway {
            fail_generate: true,
            ..FakeGateway::default()
        };

        let err = publish_date(&engine, &gateway, "pines", june(3)).await.unwrap_err();
        assert_eq!(err, GatewayError("503 Service Unavailable".into()));
    }
}
