use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fogrelay_api::{Reading, SendTimestamp};

use crate::clock::{Clock, SystemClock};
use crate::config::{FailurePolicy, RelayConfig, RelaySettings};
use crate::dead_letter::DeadLetterWriter;
use crate::error::{EngineError, FailureKind, RelayError};
use crate::observer::{NdjsonObserver, RelayObserver, TracingObserver};
use crate::prediction::{Prediction, decode_prediction};
use crate::report::{LatencyReport, RelayEvent};
use crate::service::{HttpPredictionService, PredictionService};

/// One message as delivered by the transport.
#[derive(Debug, Clone, Copy)]
pub enum RawMessage<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

impl<'a> RawMessage<'a> {
    pub fn len(&self) -> usize {
        match self {
            RawMessage::Bytes(b) => b.len(),
            RawMessage::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn decode(&self) -> Result<&'a str, RelayError> {
        match *self {
            RawMessage::Bytes(b) => std::str::from_utf8(b).map_err(|source| RelayError::DecodeFailure { source }),
            RawMessage::Text(s) => Ok(s),
        }
    }

    /// Best-effort text for diagnostics; invalid UTF-8 is replaced.
    pub fn lossy(&self) -> String {
        match self {
            RawMessage::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            RawMessage::Text(s) => s.to_string(),
        }
    }
}

impl<'a> From<&'a [u8]> for RawMessage<'a> {
    fn from(b: &'a [u8]) -> Self {
        RawMessage::Bytes(b)
    }
}

impl<'a> From<&'a str> for RawMessage<'a> {
    fn from(s: &'a str) -> Self {
        RawMessage::Text(s)
    }
}

/// Result of [`LatencyRelay::dispatch`]. Failures are already logged.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Relayed { prediction: Prediction, report: LatencyReport },
    Dropped(FailureKind),
    DeadLettered(FailureKind),
}

// ═══════════════════════════════════════════════════════════════
//  LatencyRelay
// ═══════════════════════════════════════════════════════════════

/// Forwards readings to a prediction service and measures the latency.
///
/// Holds only read-only collaborators, so one instance behind an `Arc` may
/// serve any number of concurrent invocations.
pub struct LatencyRelay {
    service: Arc<dyn PredictionService>,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn RelayObserver>>,
    dead_letter: Option<DeadLetterWriter>,
    settings: RelaySettings,
}

impl LatencyRelay {
    /// Relay over `service` with the system clock and tracing telemetry.
    pub fn new(service: Arc<dyn PredictionService>, settings: RelaySettings) -> Self {
        Self {
            service,
            clock: Arc::new(SystemClock),
            observers: vec![Arc::new(TracingObserver)],
            dead_letter: None,
            settings,
        }
    }

    /// Build the HTTP-backed relay described by `cfg`.
    pub fn from_config(cfg: &RelayConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let service = HttpPredictionService::new(&cfg.endpoint, cfg.timeout())?;
        let mut relay = Self::new(Arc::new(service), RelaySettings::from(cfg));

        if let Some(path) = &cfg.metrics_path {
            relay = relay.with_observer(Arc::new(NdjsonObserver::open(path)?));
        }
        if cfg.on_failure == FailurePolicy::DeadLetter {
            let path = cfg
                .dead_letter_path
                .as_deref()
                .ok_or_else(|| EngineError::Config("dead_letter policy without dead_letter_path".into()))?;
            relay = relay.with_dead_letter(DeadLetterWriter::open(path)?);
        }

        tracing::info!(
            target_service = %relay.service.describe(),
            timeout_ms = cfg.timeout_ms,
            on_failure = ?cfg.on_failure,
            retry_attempts = cfg.retry.attempts(),
            "relay configured"
        );
        Ok(relay)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Attach a dead-letter file and switch the failure policy to
    /// [`FailurePolicy::DeadLetter`].
    pub fn with_dead_letter(mut self, writer: DeadLetterWriter) -> Self {
        self.dead_letter = Some(writer);
        self.settings.on_failure = FailurePolicy::DeadLetter;
        self
    }

    /// Relay one message without host cancellation.
    pub async fn handle(&self, raw: RawMessage<'_>) -> Result<(Prediction, LatencyReport), RelayError> {
        self.handle_cancellable(raw, &CancellationToken::new()).await
    }

    /// Relay one message. Cancelling `cancel` abandons the in-flight
    /// downstream call and yields [`RelayError::Cancelled`].
    ///
    /// Every failure is reported to the observers before it is returned.
    pub async fn handle_cancellable(
        &self,
        raw: RawMessage<'_>,
        cancel: &CancellationToken,
    ) -> Result<(Prediction, LatencyReport), RelayError> {
        let received_at = self.clock.now();
        self.emit(|o| o.on_received(raw.len()));

        let result = self.relay(raw, received_at, cancel).await;
        if let Err(e) = &result {
            self.emit(|o| o.on_failure(e));
        }
        result
    }

    /// Host entry point: relay one message and never fail.
    ///
    /// A failed message is dropped or written to the dead-letter file,
    /// according to the configured [`FailurePolicy`].
    pub async fn dispatch(&self, raw: RawMessage<'_>, cancel: &CancellationToken) -> Outcome {
        let err = match self.handle_cancellable(raw, cancel).await {
            Ok((prediction, report)) => return Outcome::Relayed { prediction, report },
            Err(e) => e,
        };
        let kind = err.kind();

        match (self.settings.on_failure, &self.dead_letter) {
            (FailurePolicy::DeadLetter, Some(dlq)) => match dlq.write(&err, &raw.lossy()) {
                Ok(()) => {
                    tracing::debug!(%kind, path = %dlq.path(), "message dead-lettered");
                    Outcome::DeadLettered(kind)
                }
                Err(e) => {
                    tracing::error!(%kind, path = %dlq.path(), error = %e, "dead-letter write failed, message dropped");
                    Outcome::Dropped(kind)
                }
            },
            (FailurePolicy::DeadLetter, None) => {
                tracing::error!(%kind, "dead_letter policy without writer, message dropped");
                Outcome::Dropped(kind)
            }
            (FailurePolicy::Drop, _) => {
                tracing::debug!(%kind, "message dropped");
                Outcome::Dropped(kind)
            }
        }
    }

    async fn relay(
        &self,
        raw: RawMessage<'_>,
        received_at: f64,
        cancel: &CancellationToken,
    ) -> Result<(Prediction, LatencyReport), RelayError> {
        let text = raw.decode()?;
        let reading = Reading::parse(text).map_err(|e| RelayError::malformed(text, e))?;
        reading
            .check_features(&self.settings.required_features)
            .map_err(|e| RelayError::malformed(text, e))?;

        let timestamp_sent = match reading.send_timestamp(&self.settings.timestamp_field) {
            SendTimestamp::Valid(t) => Some(t),
            SendTimestamp::Absent => None,
            SendTimestamp::Invalid(v) => {
                self.emit(|o| o.on_timestamp_rejected(&v));
                None
            }
        };

        let call_start = self.clock.now();
        let (body, attempts) = self.call_downstream(&reading, cancel).await?;
        let call_end = self.clock.now();

        let prediction = decode_prediction(&body, &self.settings.prediction_key, &self.settings.server_latency_key)?;
        let completed_at = self.clock.now();

        let event = RelayEvent {
            reading,
            received_at,
            call_start,
            call_end,
            prediction,
            completed_at,
            timestamp_sent,
            attempts,
        };
        let report = LatencyReport::from_event(&event);

        self.emit(|o| o.on_prediction(&event.prediction));
        self.emit(|o| o.on_report(&report));
        Ok((event.prediction, report))
    }

    /// Call the service, honouring the retry policy and cancellation.
    /// Returns the success body and the number of attempts made.
    async fn call_downstream(
        &self,
        reading: &Reading,
        cancel: &CancellationToken,
    ) -> Result<(Vec<u8>, u32), RelayError> {
        let policy = &self.settings.retry;
        let max_attempts = policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                r = self.service.predict(reading) => r,
            };

            match result {
                Ok(body) => return Ok((body, attempt)),
                Err(cause) if attempt < max_attempts => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %cause,
                        delay_ms = delay.as_millis() as u64,
                        "prediction call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(cause) => return Err(RelayError::DownstreamUnavailable { cause, attempts: attempt }),
            }
        }
    }

    fn emit(&self, f: impl Fn(&dyn RelayObserver)) {
        for o in &self.observers {
            f(o.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::clock::ScriptedClock;
    use crate::error::ServiceError;
    use crate::retry::{Backoff, RetryPolicy};

    /// Answers from a script; the last answer repeats.
    struct MockService {
        answers: Mutex<VecDeque<Result<&'static str, ServiceError>>>,
        delay: Duration,
        calls: AtomicUsize,
        seen: Mutex<Vec<Reading>>,
    }

    impl MockService {
        fn new(answers: Vec<Result<&'static str, ServiceError>>) -> Arc<Self> {
            Self::delayed(answers, Duration::ZERO)
        }

        fn delayed(answers: Vec<Result<&'static str, ServiceError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                delay,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PredictionService for MockService {
        fn predict<'a>(
            &'a self,
            reading: &'a Reading,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.seen.lock().unwrap().push(reading.clone());
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let mut answers = self.answers.lock().unwrap();
                let answer = if answers.len() > 1 {
                    answers.pop_front().unwrap()
                } else {
                    answers.front().cloned().unwrap()
                };
                answer.map(|s| s.as_bytes().to_vec())
            })
        }

        fn describe(&self) -> String {
            "mock".into()
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
        reports: Mutex<Vec<LatencyReport>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
        fn reports(&self) -> Vec<LatencyReport> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl RelayObserver for RecordingObserver {
        fn on_received(&self, _bytes: usize) {
            self.events.lock().unwrap().push("received".into());
        }
        fn on_timestamp_rejected(&self, _value: &Value) {
            self.events.lock().unwrap().push("timestamp_rejected".into());
        }
        fn on_failure(&self, error: &RelayError) {
            self.events.lock().unwrap().push(format!("failure:{}", error.kind()));
        }
        fn on_prediction(&self, _prediction: &Prediction) {
            self.events.lock().unwrap().push("prediction".into());
        }
        fn on_report(&self, report: &LatencyReport) {
            self.events.lock().unwrap().push("report".into());
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    fn relay_with(service: Arc<MockService>, settings: RelaySettings) -> (LatencyRelay, Arc<RecordingObserver>) {
        let rec = Arc::new(RecordingObserver::default());
        let relay = LatencyRelay::new(service, settings).with_observer(rec.clone());
        (relay, rec)
    }

    fn result_key() -> RelaySettings {
        RelaySettings {
            prediction_key: "result".into(),
            ..RelaySettings::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[tokio::test]
    async fn fifty_ms_call_inside_two_hundred_ms_relay() {
        let service = MockService::new(vec![Ok(r#"{"result": 123.4}"#)]);
        let (relay, rec) = relay_with(service.clone(), result_key());
        // receipt, call start, call end (+50ms), completion at 1000.2
        let relay = relay.with_clock(Arc::new(ScriptedClock::new([1000.0, 1000.1, 1000.15, 1000.2])));

        let (prediction, report) = relay
            .handle(RawMessage::Text(r#"{"timestamp_sent": 1000.0, "f1": 0.9}"#))
            .await
            .unwrap();

        assert_eq!(prediction.value, 123.4);
        assert!(approx(report.downstream_call_latency_ms, 50.0));
        assert!(approx(report.total_relay_latency_ms, 200.0));
        assert!(approx(report.end_to_end_latency_ms.unwrap(), 200.0));
        assert_eq!(report.attempts, 1);
        assert_eq!(service.calls(), 1);
        assert_eq!(rec.events(), vec!["received", "prediction", "report"]);
    }

    #[tokio::test]
    async fn end_to_end_matches_completion_minus_send_time() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, _) = relay_with(service, result_key());
        let relay = relay.with_clock(Arc::new(ScriptedClock::new([1700000000.5, 1700000000.5, 1700000000.6, 1700000001.25])));

        let (_, report) = relay
            .handle(RawMessage::Text(r#"{"timestamp_sent": 1700000000.0}"#))
            .await
            .unwrap();
        assert!(approx(report.end_to_end_latency_ms.unwrap(), 1250.0));
    }

    #[tokio::test]
    async fn end_to_end_absent_without_send_time() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, rec) = relay_with(service, result_key());

        let (_, report) = relay.handle(RawMessage::Text(r#"{"f1": 0.9}"#)).await.unwrap();
        assert!(report.end_to_end_latency_ms.is_none());
        assert!(!rec.events().contains(&"timestamp_rejected".to_string()));
    }

    #[tokio::test]
    async fn unusable_send_time_is_reported_and_skipped() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, rec) = relay_with(service, result_key());

        let (_, report) = relay
            .handle(RawMessage::Text(r#"{"timestamp_sent": "soon", "f1": 0.9}"#))
            .await
            .unwrap();
        assert!(report.end_to_end_latency_ms.is_none());
        assert_eq!(rec.events(), vec!["received", "timestamp_rejected", "prediction", "report"]);
    }

    #[tokio::test]
    async fn downstream_is_sub_interval_of_total() {
        let service = MockService::delayed(vec![Ok(r#"{"result": 5}"#)], Duration::from_millis(20));
        let (relay, _) = relay_with(service, result_key());

        for _ in 0..3 {
            let (_, report) = relay.handle(RawMessage::Text(r#"{"f1": 1}"#)).await.unwrap();
            assert!(report.downstream_call_latency_ms <= report.total_relay_latency_ms);
            assert!(report.downstream_call_latency_ms >= 15.0);
        }
    }

    #[tokio::test]
    async fn clock_skew_is_reported_as_is() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, _) = relay_with(service, result_key());
        let relay = relay.with_clock(Arc::new(ScriptedClock::new([100.0, 100.0, 100.01, 100.02])));

        let (_, report) = relay
            .handle(RawMessage::Text(r#"{"timestamp_sent": 101.0}"#))
            .await
            .unwrap();
        assert!(approx(report.end_to_end_latency_ms.unwrap(), -980.0));
    }

    #[tokio::test]
    async fn forwards_the_full_reading() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, _) = relay_with(service.clone(), result_key());

        relay
            .handle(RawMessage::Text(r#"{"timestamp_sent": 5.0, "Heart_Rate": 72, "Age": 30}"#))
            .await
            .unwrap();
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get_f64("Heart_Rate"), Some(72.0));
        assert_eq!(seen[0].get_f64("timestamp_sent"), Some(5.0));
    }

    #[tokio::test]
    async fn invalid_utf8_never_reaches_service() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, rec) = relay_with(service.clone(), result_key());

        let err = relay.handle(RawMessage::Bytes(&[0x7bu8, 0xff, 0xfe, 0x7d])).await.unwrap_err();
        assert!(matches!(err, RelayError::DecodeFailure { .. }));
        assert_eq!(service.calls(), 0);
        assert_eq!(rec.events(), vec!["received", "failure:decode_failure"]);
    }

    #[tokio::test]
    async fn invalid_json_never_reaches_service() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, _) = relay_with(service.clone(), result_key());

        let err = relay.handle(RawMessage::Bytes(b"{\"f1\": 0.9")).await.unwrap_err();
        match err {
            RelayError::MalformedPayload { raw, .. } => assert_eq!(raw, "{\"f1\": 0.9"),
            other => panic!("unexpected {other:?}"),
        }

        let err = relay.handle(RawMessage::Text("[0.9]")).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload { .. }));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn missing_required_feature_is_malformed() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let settings = RelaySettings {
            required_features: vec!["f1".into(), "f2".into()],
            ..result_key()
        };
        let (relay, _) = relay_with(service.clone(), settings);

        let err = relay.handle(RawMessage::Text(r#"{"f1": 0.9}"#)).await.unwrap_err();
        match err {
            RelayError::MalformedPayload { reason, .. } => assert!(reason.contains("f2"), "{reason}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(service.calls(), 0);

        relay.handle(RawMessage::Text(r#"{"f1": 0.9, "f2": 3}"#)).await.unwrap();
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn downstream_failure_emits_no_report() {
        let service = MockService::new(vec![Err(ServiceError::Status { status: 500, body: "boom".into() })]);
        let (relay, rec) = relay_with(service.clone(), result_key());

        let err = relay.handle(RawMessage::Text(r#"{"f1": 1}"#)).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::DownstreamUnavailable { cause: ServiceError::Status { status: 500, .. }, attempts: 1 }
        ));
        assert_eq!(service.calls(), 1);
        assert!(rec.reports().is_empty());
        assert_eq!(rec.events(), vec!["received", "failure:downstream_unavailable"]);
    }

    #[tokio::test]
    async fn bad_response_body_is_invalid_prediction() {
        let service = MockService::new(vec![Ok("<html>502</html>")]);
        let (relay, rec) = relay_with(service, result_key());

        let err = relay.handle(RawMessage::Text(r#"{"f1": 1}"#)).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidPredictionResponse { .. }));
        assert!(rec.reports().is_empty());
    }

    #[tokio::test]
    async fn retry_is_opt_in() {
        let answers = || vec![Err(ServiceError::Connect("refused".into())), Ok(r#"{"result": 7}"#)];

        let service = MockService::new(answers());
        let (relay, _) = relay_with(service.clone(), result_key());
        assert!(relay.handle(RawMessage::Text("{}")).await.is_err());
        assert_eq!(service.calls(), 1);

        let service = MockService::new(answers());
        let settings = RelaySettings {
            retry: RetryPolicy::no_retry()
                .with_attempts(3)
                .with_delay(Duration::from_millis(1))
                .with_backoff(Backoff::Constant),
            ..result_key()
        };
        let (relay, _) = relay_with(service.clone(), settings);
        let (prediction, report) = relay.handle(RawMessage::Text("{}")).await.unwrap();
        assert_eq!(prediction.value, 7.0);
        assert_eq!(report.attempts, 2);
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let service = MockService::new(vec![Err(ServiceError::Timeout(Duration::from_millis(5)))]);
        let settings = RelaySettings {
            retry: RetryPolicy::no_retry().with_attempts(3).with_delay(Duration::from_millis(1)),
            ..result_key()
        };
        let (relay, _) = relay_with(service.clone(), settings);

        let err = relay.handle(RawMessage::Text("{}")).await.unwrap_err();
        assert!(matches!(err, RelayError::DownstreamUnavailable { attempts: 3, .. }));
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn cancellation_abandons_inflight_call() {
        let service = MockService::delayed(vec![Ok(r#"{"result": 1}"#)], Duration::from_secs(30));
        let (relay, rec) = relay_with(service.clone(), result_key());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = relay.handle_cancellable(RawMessage::Text("{}"), &token).await.unwrap_err();
        assert!(matches!(err, RelayError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(service.calls(), 1);
        assert!(rec.reports().is_empty());
    }

    #[tokio::test]
    async fn dispatch_drops_by_default() {
        let service = MockService::new(vec![Ok(r#"{"result": 1}"#)]);
        let (relay, _) = relay_with(service, result_key());
        let token = CancellationToken::new();

        let outcome = relay.dispatch(RawMessage::Text("not json"), &token).await;
        assert_eq!(outcome, Outcome::Dropped(FailureKind::MalformedPayload));

        let outcome = relay.dispatch(RawMessage::Text(r#"{"f1": 2}"#), &token).await;
        assert!(matches!(outcome, Outcome::Relayed { ref prediction, .. } if prediction.value == 1.0));
    }

    #[tokio::test]
    async fn dispatch_dead_letters_when_configured() {
        let path = std::env::temp_dir().join(format!("fogrelay-dlq-relay-{}.ndjson", std::process::id()));
        let path_str = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);

        let service = MockService::new(vec![Err(ServiceError::Connect("refused".into()))]);
        let settings = RelaySettings {
            on_failure: FailurePolicy::DeadLetter,
            ..result_key()
        };
        let (relay, _) = relay_with(service, settings);
        let relay = relay.with_dead_letter(DeadLetterWriter::open(&path_str).unwrap());

        let outcome = relay
            .dispatch(RawMessage::Bytes(br#"{"f1": 3}"#), &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::DeadLettered(FailureKind::DownstreamUnavailable));

        let content = std::fs::read_to_string(&path).unwrap();
        let line: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["kind"], "downstream_unavailable");
        assert_eq!(line["raw"], r#"{"f1": 3}"#);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn dead_letter_writer_switches_policy() {
        let path = std::env::temp_dir().join(format!("fogrelay-dlq-switch-{}.ndjson", std::process::id()));
        let path_str = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);

        let service = MockService::new(vec![Err(ServiceError::Connect("refused".into()))]);
        let (relay, _) = relay_with(service, result_key());
        assert_eq!(relay.settings.on_failure, FailurePolicy::Drop);
        let relay = relay.with_dead_letter(DeadLetterWriter::open(&path_str).unwrap());
        assert_eq!(relay.settings.on_failure, FailurePolicy::DeadLetter);

        let outcome = relay
            .dispatch(RawMessage::Text(r#"{"f1": 4}"#), &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::DeadLettered(FailureKind::DownstreamUnavailable));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn dead_letter_policy_without_writer_still_drops() {
        let service = MockService::new(vec![Err(ServiceError::Connect("refused".into()))]);
        let settings = RelaySettings {
            on_failure: FailurePolicy::DeadLetter,
            ..result_key()
        };
        let (relay, rec) = relay_with(service, settings);

        let outcome = relay
            .dispatch(RawMessage::Text(r#"{"f1": 5}"#), &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::Dropped(FailureKind::DownstreamUnavailable));
        assert!(rec.reports().is_empty());
    }
}
