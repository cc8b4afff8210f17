//! Position sources.
//!
//! A [`PositionSource`] delivers fixes and errors into a sink channel until
//! its watch is cleared. Retries, backoff and fix caching are the source's
//! business; the controller only consumes what arrives.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{PositionError, TrackingError, ValidationError};
use crate::geo::Coordinate;

/// Options requested when opening a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Per-fix timeout; 0 disables it.
    pub timeout_ms: u64,
    /// Oldest cached fix acceptable; 0 means always fresh.
    pub maximum_age_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

/// Raw reading as delivered by a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_meters: f64,
}

impl Fix {
    /// A fix outside WGS-84 ranges (or NaN) is a transient provider fault.
    pub fn validate(&self) -> Result<(), PositionError> {
        Coordinate::new(self.lat, self.lng)
            .validate()
            .map_err(|e| PositionError::PositionUnavailable(format!("rejected fix: {e}")))
    }

    /// Wrap as an event, turning an invalid reading into an error.
    pub fn into_event(self) -> PositionEvent {
        match self.validate() {
            Ok(()) => PositionEvent::Fix(self),
            Err(e) => PositionEvent::Error(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(Fix),
    Error(PositionError),
}

pub type PositionSink = mpsc::UnboundedSender<PositionEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// A platform capability that produces position fixes.
pub trait PositionSource: Send + Sync {
    /// Whether this platform can produce fixes at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Open a continuous watch delivering into `sink`.
    fn watch(&self, options: &WatchOptions, sink: PositionSink) -> Result<WatchId, TrackingError>;

    /// Cancel a watch. Unknown ids are ignored.
    fn clear_watch(&self, id: WatchId);
}

static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

fn next_watch_id() -> WatchId {
    WatchId(NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed))
}

/// Stands in for a platform without positioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSource;

impl PositionSource for UnavailableSource {
    fn is_supported(&self) -> bool {
        false
    }

    fn watch(&self, _options: &WatchOptions, _sink: PositionSink) -> Result<WatchId, TrackingError> {
        Err(TrackingError::UnsupportedPositioning)
    }

    fn clear_watch(&self, _id: WatchId) {}
}

/// A source fed by the host: platform location callbacks call [`push`]
/// (or [`push_error`]) and the events land in whichever watch is open.
///
/// [`push`]: ManualSource::push
/// [`push_error`]: ManualSource::push_error
#[derive(Debug, Default)]
pub struct ManualSource {
    current: Mutex<Option<(WatchId, PositionSink)>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a fix. Returns false when no watch is open.
    pub fn push(&self, fix: Fix) -> bool {
        self.send(fix.into_event())
    }

    pub fn push_error(&self, error: PositionError) -> bool {
        self.send(PositionEvent::Error(error))
    }

    pub fn is_watching(&self) -> bool {
        self.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    fn send(&self, event: PositionEvent) -> bool {
        match self.current.lock() {
            Ok(current) => current
                .as_ref()
                .is_some_and(|(_, sink)| sink.send(event).is_ok()),
            Err(_) => false,
        }
    }
}

impl PositionSource for ManualSource {
    fn watch(&self, _options: &WatchOptions, sink: PositionSink) -> Result<WatchId, TrackingError> {
        let id = next_watch_id();
        if let Ok(mut current) = self.current.lock() {
            *current = Some((id, sink));
        }
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Ok(mut current) = self.current.lock() {
            if current.as_ref().is_some_and(|(open, _)| *open == id) {
                *current = None;
            }
        }
    }
}

/// Error kinds a scripted track can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackErrorKind {
    PermissionDenied,
    Unavailable,
    Timeout,
}

/// One scripted step: either a fix (`lat`/`lng`) or an `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStep {
    /// Wait before delivering this step.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub error: Option<TrackErrorKind>,
}

impl TrackStep {
    pub fn fix(delay_ms: u64, lat: f64, lng: f64) -> Self {
        Self {
            delay_ms,
            lat: Some(lat),
            lng: Some(lng),
            accuracy: None,
            error: None,
        }
    }

    pub fn error(delay_ms: u64, kind: TrackErrorKind) -> Self {
        Self {
            delay_ms,
            lat: None,
            lng: None,
            accuracy: None,
            error: Some(kind),
        }
    }

    fn to_event(&self, timeout_ms: u64) -> Result<PositionEvent, ValidationError> {
        if let Some(kind) = self.error {
            let error = match kind {
                TrackErrorKind::PermissionDenied => PositionError::PermissionDenied,
                TrackErrorKind::Unavailable => {
                    PositionError::PositionUnavailable("scripted outage".into())
                }
                TrackErrorKind::Timeout => PositionError::Timeout { timeout_ms },
            };
            return Ok(PositionEvent::Error(error));
        }
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Ok(Fix {
                lat,
                lng,
                accuracy_meters: self.accuracy.unwrap_or(5.0),
            }
            .into_event()),
            _ => Err(ValidationError::InvalidValue {
                field: "step".into(),
                message: "a track step needs lat and lng, or an error".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub steps: Vec<TrackStep>,
}

impl Track {
    /// Parse a track from TOML (`[[steps]]` tables).
    pub fn from_toml(content: &str) -> Result<Self, ValidationError> {
        toml::from_str(content).map_err(|e| ValidationError::InvalidValue {
            field: "track".into(),
            message: e.to_string(),
        })
    }

    /// Parse a track from JSON: either `{"steps": [...]}` or a bare array.
    pub fn from_json(content: &str) -> Result<Self, ValidationError> {
        let invalid = |e: serde_json::Error| ValidationError::InvalidValue {
            field: "track".into(),
            message: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(content).map_err(invalid)?;
        if value.is_array() {
            Ok(Self {
                steps: serde_json::from_value(value).map_err(invalid)?,
            })
        } else {
            serde_json::from_value(value).map_err(invalid)
        }
    }

    /// Load a track file, picking the format from the extension.
    pub fn from_path(path: &Path) -> Result<Self, crate::error::CoreError> {
        let content = std::fs::read_to_string(path)?;
        let track = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_json(&content)?,
        };
        track.validate()?;
        Ok(track)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for step in &self.steps {
            step.to_event(0)?;
        }
        Ok(())
    }
}

/// Replays a scripted [`Track`], one step per `delay_ms`. The watch ends
/// (its sink is dropped) after the last step.
#[derive(Debug)]
pub struct ReplaySource {
    track: Track,
    tasks: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl ReplaySource {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl PositionSource for ReplaySource {
    fn watch(&self, options: &WatchOptions, sink: PositionSink) -> Result<WatchId, TrackingError> {
        let id = next_watch_id();
        let steps = self.track.steps.clone();
        let timeout_ms = options.timeout_ms;
        let handle = tokio::spawn(async move {
            for step in steps {
                if step.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
                }
                let Ok(event) = step.to_event(timeout_ms) else {
                    continue;
                };
                if sink.send(event).is_err() {
                    break;
                }
            }
        });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|_, task| !task.is_finished());
            tasks.insert(id, handle);
        }
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(&id) {
                task.abort();
            }
        }
    }
}

/// Reads `lat,lng[,accuracy]` lines from an async reader (stdin, a pipe,
/// a GPS daemon socket). Blank lines and `#` comments are skipped; a line
/// that does not parse is reported as a transient error. The reader can
/// only be consumed by one watch.
pub struct LineSource {
    reader: Mutex<Option<Box<dyn AsyncBufRead + Send + Unpin>>>,
    tasks: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl LineSource {
    pub fn new(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

/// Parses one `lat,lng[,accuracy]` line.
pub fn parse_fix_line(line: &str) -> Option<Result<Fix, PositionError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let numbers: Result<Vec<f64>, _> = line.split(',').map(|p| p.trim().parse::<f64>()).collect();
    let parsed = match numbers.as_deref() {
        Ok([lat, lng]) => Some((*lat, *lng, 5.0)),
        Ok([lat, lng, acc]) => Some((*lat, *lng, *acc)),
        _ => None,
    };
    Some(match parsed {
        Some((lat, lng, accuracy_meters)) => {
            let fix = Fix {
                lat,
                lng,
                accuracy_meters,
            };
            fix.validate().map(|()| fix)
        }
        None => Err(PositionError::PositionUnavailable(format!(
            "unparseable fix '{line}'"
        ))),
    })
}

impl PositionSource for LineSource {
    fn watch(&self, _options: &WatchOptions, sink: PositionSink) -> Result<WatchId, TrackingError> {
        let reader = self
            .reader
            .lock()
            .ok()
            .and_then(|mut r| r.take())
            .ok_or_else(|| {
                TrackingError::Position(PositionError::Other {
                    message: "position input already consumed".into(),
                    terminal: true,
                })
            })?;

        let id = next_watch_id();
        let handle = tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let event = match parse_fix_line(&line) {
                            None => continue,
                            Some(Ok(fix)) => PositionEvent::Fix(fix),
                            Some(Err(e)) => PositionEvent::Error(e),
                        };
                        if sink.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = sink.send(PositionEvent::Error(PositionError::Other {
                            message: e.to_string(),
                            terminal: true,
                        }));
                        break;
                    }
                }
            }
        });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(id, handle);
        }
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(&id) {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fix_lines() {
        assert_eq!(parse_fix_line("  "), None);
        assert_eq!(parse_fix_line("# header"), None);
        assert_eq!(
            parse_fix_line("1.5, -2.25"),
            Some(Ok(Fix {
                lat: 1.5,
                lng: -2.25,
                accuracy_meters: 5.0
            }))
        );
        assert_eq!(
            parse_fix_line("1,2,30"),
            Some(Ok(Fix {
                lat: 1.0,
                lng: 2.0,
                accuracy_meters: 30.0
            }))
        );
        assert!(matches!(parse_fix_line("north,east"), Some(Err(_))));
        assert!(matches!(parse_fix_line("1,2,3,4"), Some(Err(_))));
    }

    #[test]
    fn out_of_range_lines_are_transient_errors() {
        for line in ["NaN,0", "91,0", "0,-180.5", "inf,0"] {
            match parse_fix_line(line) {
                Some(Err(e @ PositionError::PositionUnavailable(_))) => assert!(!e.is_terminal()),
                other => panic!("{line}: unexpected {other:?}"),
            }
        }
        assert!(matches!(parse_fix_line("90,180"), Some(Ok(_))));
    }

    #[test]
    fn track_parses_from_toml_and_json() {
        let toml_track = Track::from_toml(
            "[[steps]]\nlat = 1.0\nlng = 2.0\n\n[[steps]]\ndelay_ms = 50\nerror = \"timeout\"\n",
        )
        .unwrap();
        assert_eq!(toml_track.steps.len(), 2);
        assert_eq!(toml_track.steps[1].error, Some(TrackErrorKind::Timeout));

        let bare = Track::from_json(r#"[{"lat": 1.0, "lng": 2.0, "accuracy": 12.0}]"#).unwrap();
        assert_eq!(bare.steps[0].accuracy, Some(12.0));
        let wrapped = Track::from_json(r#"{"steps": [{"error": "permission_denied"}]}"#).unwrap();
        assert_eq!(wrapped.steps[0].error, Some(TrackErrorKind::PermissionDenied));
    }

    #[test]
    fn track_validation_rejects_half_a_fix() {
        let track = Track {
            steps: vec![TrackStep {
                delay_ms: 0,
                lat: Some(1.0),
                lng: None,
                accuracy: None,
                error: None,
            }],
        };
        assert!(track.validate().is_err());
    }

    #[test]
    fn unavailable_source_refuses_to_watch() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!UnavailableSource.is_supported());
        assert_eq!(
            UnavailableSource.watch(&WatchOptions::default(), tx),
            Err(TrackingError::UnsupportedPositioning)
        );
    }

    #[test]
    fn manual_source_delivers_only_while_watched() {
        let source = ManualSource::new();
        let fix = Fix {
            lat: 0.0,
            lng: 0.0,
            accuracy_meters: 1.0,
        };
        assert!(!source.push(fix));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = source.watch(&WatchOptions::default(), tx).unwrap();
        assert!(source.push(fix));
        assert_eq!(rx.try_recv().unwrap(), PositionEvent::Fix(fix));

        source.clear_watch(id);
        assert!(!source.is_watching());
        assert!(!source.push(fix));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_source_plays_steps_then_closes() {
        let source = ReplaySource::new(Track {
            steps: vec![
                TrackStep::fix(100, 1.0, 1.0),
                TrackStep::error(100, TrackErrorKind::Unavailable),
            ],
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.watch(&WatchOptions::default(), tx).unwrap();

        assert!(matches!(rx.recv().await, Some(PositionEvent::Fix(_))));
        assert!(matches!(
            rx.recv().await,
            Some(PositionEvent::Error(PositionError::PositionUnavailable(_)))
        ));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_source_rejects_impossible_coordinates() {
        let source = ReplaySource::new(Track {
            steps: vec![
                TrackStep::fix(0, 91.0, 0.0),
                TrackStep::fix(0, f64::NAN, 0.0),
                TrackStep::fix(0, 1.0, 1.0),
            ],
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.watch(&WatchOptions::default(), tx).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                rx.recv().await,
                Some(PositionEvent::Error(PositionError::PositionUnavailable(_)))
            ));
        }
        assert!(matches!(rx.recv().await, Some(PositionEvent::Fix(_))));
    }

    #[tokio::test]
    async fn line_source_reports_nan_as_an_error() {
        let input: &[u8] = b"NaN,0
91,0
0.5,0.5
";
        let source = LineSource::new(input);
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.watch(&WatchOptions::default(), tx).unwrap();

        assert!(matches!(rx.recv().await, Some(PositionEvent::Error(_))));
        assert!(matches!(rx.recv().await, Some(PositionEvent::Error(_))));
        assert!(matches!(rx.recv().await, Some(PositionEvent::Fix(f)) if f.lat == 0.5));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn line_source_reads_lines_once() {
        let input: &[u8] = b"0,0\n# skip\nbad line\n1,1,9\n";
        let source = LineSource::new(input);
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.watch(&WatchOptions::default(), tx).unwrap();

        assert!(matches!(rx.recv().await, Some(PositionEvent::Fix(f)) if f.lat == 0.0));
        assert!(matches!(rx.recv().await, Some(PositionEvent::Error(_))));
        assert!(matches!(rx.recv().await, Some(PositionEvent::Fix(f)) if f.accuracy_meters == 9.0));
        assert_eq!(rx.recv().await, None);

        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(source.watch(&WatchOptions::default(), tx2).is_err());
    }
}
