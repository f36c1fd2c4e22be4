use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::MonitorConfig;
use crate::models::ValidatorSnapshot;
use crate::report::{report_all, report_for_validator};
use crate::rpc::RpcError;

pub const FETCH_FAILED: &str = "Failed to get validator information";
pub const STOPPED_BY_USER: &str = "Monitoring stopped by user";

#[async_trait]
pub trait SnapshotSource {
    async fn fetch_snapshot(&self) -> Result<ValidatorSnapshot, RpcError>;
}

#[async_trait]
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Interrupted,
}

#[derive(Debug)]
pub enum MonitorState {
    Polling,
    Reporting(ValidatorSnapshot),
    Sleeping,
    Stopped(StopReason),
}

pub struct Monitor<S, C, W> {
    config: MonitorConfig,
    source: S,
    clock: C,
    out: W,
}

impl<S, C, W> Monitor<S, C, W>
where
    S: SnapshotSource,
    C: Clock,
    W: Write,
{
    pub fn new(config: MonitorConfig, source: S, clock: C, out: W) -> Self {
        Self {
            config,
            source,
            clock,
            out,
        }
    }

    fn emit(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    /// Operator-facing status lines; silent in quiet mode.
    fn notice(&mut self, lines: &[&str]) {
        if self.config.quiet {
            return;
        }
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        if let Err(e) = self.emit(&lines) {
            error!(error = %e, "failed to write notice");
        }
    }

    pub fn banner(&mut self) {
        let starting = format!(
            "Starting validator monitoring (checking every {} seconds)...",
            self.config.interval.as_secs()
        );
        let connecting = format!(
            "Connecting to RPC at {}:{}",
            self.config.rpc_host, self.config.rpc_port
        );
        self.notice(&[starting.as_str(), connecting.as_str()]);
    }

    pub async fn step(&mut self, state: MonitorState) -> MonitorState {
        match state {
            MonitorState::Polling => match self.source.fetch_snapshot().await {
                Ok(snapshot) => MonitorState::Reporting(snapshot),
                Err(_) => {
                    self.notice(&[FETCH_FAILED]);
                    MonitorState::Sleeping
                }
            },
            MonitorState::Reporting(snapshot) => {
                let lines = match &self.config.validator_id {
                    Some(id) => report_for_validator(&snapshot, id, self.config.quiet),
                    None => report_all(&snapshot, self.clock.now()),
                };

                if let Err(e) = self.emit(&lines) {
                    if !self.config.quiet {
                        error!(error = %e, "Error during monitoring");
                    }
                    return MonitorState::Sleeping;
                }

                if self.config.single_run {
                    MonitorState::Stopped(StopReason::Completed)
                } else {
                    MonitorState::Sleeping
                }
            }
            MonitorState::Sleeping => {
                debug!(
                    secs = self.config.interval.as_secs(),
                    "sleeping until next poll"
                );
                self.clock.sleep(self.config.interval).await;
                MonitorState::Polling
            }
            MonitorState::Stopped(reason) => MonitorState::Stopped(reason),
        }
    }

    /// Drives the loop until single-run completion or until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut state = MonitorState::Polling;

        loop {
            state = tokio::select! {
                biased;
                _ = &mut shutdown => MonitorState::Stopped(StopReason::Interrupted),
                next = self.step(state) => next,
            };

            if let MonitorState::Stopped(reason) = &state {
                if *reason == StopReason::Interrupted {
                    self.notice(&["", STOPPED_BY_USER]);
                }
                return *reason;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ValidatorSnapshot, RpcError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ValidatorSnapshot, RpcError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch_snapshot(&self) -> Result<ValidatorSnapshot, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(RpcError::MissingResult))
        }
    }

    /// Never actually sleeps. Optionally fires `stop` on the n-th sleep and
    /// then hangs, the way a long sleep would when Ctrl-C arrives.
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
        stop_after: Option<(usize, Arc<Notify>)>,
    }

    impl RecordingClock {
        fn new() -> Self {
            Self {
                sleeps: Mutex::new(Vec::new()),
                stop_after: None,
            }
        }

        fn stopping_after(n: usize, stop: Arc<Notify>) -> Self {
            Self {
                sleeps: Mutex::new(Vec::new()),
                stop_after: Some((n, stop)),
            }
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for RecordingClock {
        fn now(&self) -> DateTime<Local> {
            Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 5).unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            let count = {
                let mut sleeps = self.sleeps.lock().unwrap();
                sleeps.push(duration);
                sleeps.len()
            };
            if let Some((n, stop)) = &self.stop_after {
                if count >= *n {
                    stop.notify_one();
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    /// Fails the first `failures` writes, then behaves like a Vec.
    struct FlakyWriter {
        failures: usize,
        buf: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.buf.write(data)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn v1_snapshot() -> ValidatorSnapshot {
        serde_json::from_value(serde_json::json!({
            "current_validators": [{
                "account_id": "v1",
                "num_produced_blocks": 95,
                "num_expected_blocks": 100,
                "num_produced_chunks": 100,
                "num_expected_chunks": 100
            }]
        }))
        .unwrap()
    }

    fn config(validator_id: Option<&str>, quiet: bool, single_run: bool) -> MonitorConfig {
        MonitorConfig {
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 3030,
            interval: Duration::from_secs(60),
            validator_id: validator_id.map(str::to_string),
            quiet,
            single_run,
        }
    }

    fn refused() -> RpcError {
        RpcError::Transport("connection refused".to_string())
    }

    fn output(monitor: &Monitor<ScriptedSource, RecordingClock, Vec<u8>>) -> String {
        String::from_utf8(monitor.out.clone()).unwrap()
    }

    #[tokio::test]
    async fn single_run_reports_once_without_sleeping() {
        let source = ScriptedSource::new(vec![Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(Some("v1"), true, true),
            source,
            RecordingClock::new(),
            Vec::new(),
        );

        let reason = monitor.run(std::future::pending()).await;

        assert_eq!(reason, StopReason::Completed);
        assert_eq!(output(&monitor), "5 blocks missed, no chunks missed\n");
        assert!(monitor.clock.sleeps().is_empty());
        assert_eq!(monitor.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_sleeps_then_retries() {
        let source = ScriptedSource::new(vec![Err(refused()), Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(None, false, true),
            source,
            RecordingClock::new(),
            Vec::new(),
        );

        let reason = monitor.run(std::future::pending()).await;

        assert_eq!(reason, StopReason::Completed);
        assert_eq!(monitor.clock.sleeps(), vec![Duration::from_secs(60)]);
        assert_eq!(
            output(&monitor),
            "Failed to get validator information\n\
             \n\
             === Validator Status Check at 2024-03-09 12:00:05 ===\n\
             \n\
             Validators missing blocks:\n\
             - v1: missing 5 blocks (produced 95/100)\n"
        );
    }

    #[tokio::test]
    async fn quiet_mode_hides_fetch_failures() {
        let source =
            ScriptedSource::new(vec![Err(refused()), Err(refused()), Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(Some("v1"), true, true),
            source,
            RecordingClock::new(),
            Vec::new(),
        );

        monitor.run(std::future::pending()).await;

        assert_eq!(output(&monitor), "5 blocks missed, no chunks missed\n");
        assert_eq!(monitor.clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn continuous_mode_polls_until_interrupted() {
        let stop = Arc::new(Notify::new());
        let source =
            ScriptedSource::new(vec![Ok(v1_snapshot()), Err(refused()), Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(Some("v1"), false, false),
            source,
            RecordingClock::stopping_after(3, stop.clone()),
            Vec::new(),
        );

        let reason = monitor.run(async move { stop.notified().await }).await;

        assert_eq!(reason, StopReason::Interrupted);
        assert_eq!(monitor.source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            output(&monitor),
            "\nValidator: v1\nBlocks: 95/100\nChunks: 100/100\n\
             Failed to get validator information\n\
             \nValidator: v1\nBlocks: 95/100\nChunks: 100/100\n\
             \nMonitoring stopped by user\n"
        );
    }

    #[tokio::test]
    async fn interrupt_in_quiet_mode_prints_nothing() {
        let stop = Arc::new(Notify::new());
        let source = ScriptedSource::new(vec![Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(Some("v1"), true, false),
            source,
            RecordingClock::stopping_after(1, stop.clone()),
            Vec::new(),
        );

        let reason = monitor.run(async move { stop.notified().await }).await;

        assert_eq!(reason, StopReason::Interrupted);
        assert_eq!(output(&monitor), "5 blocks missed, no chunks missed\n");
    }

    #[tokio::test]
    async fn interrupt_before_first_poll_skips_the_fetch() {
        let source = ScriptedSource::new(vec![Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(None, false, true),
            source,
            RecordingClock::new(),
            Vec::new(),
        );

        let reason = monitor.run(std::future::ready(())).await;

        assert_eq!(reason, StopReason::Interrupted);
        assert_eq!(monitor.source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(output(&monitor), "\nMonitoring stopped by user\n");
    }

    #[tokio::test]
    async fn write_failure_does_not_end_the_loop() {
        let source = ScriptedSource::new(vec![Ok(v1_snapshot()), Ok(v1_snapshot())]);
        let writer = FlakyWriter {
            failures: 1,
            buf: Vec::new(),
        };
        let mut monitor = Monitor::new(
            config(Some("v1"), true, true),
            source,
            RecordingClock::new(),
            writer,
        );

        let reason = monitor.run(std::future::pending()).await;

        assert_eq!(reason, StopReason::Completed);
        assert_eq!(monitor.clock.sleeps().len(), 1);
        assert_eq!(
            String::from_utf8(monitor.out.buf.clone()).unwrap(),
            "5 blocks missed, no chunks missed\n"
        );
    }

    #[tokio::test]
    async fn not_found_is_not_fatal() {
        let source = ScriptedSource::new(vec![Ok(v1_snapshot())]);
        let mut monitor = Monitor::new(
            config(Some("ghost"), true, true),
            source,
            RecordingClock::new(),
            Vec::new(),
        );

        assert_eq!(monitor.run(std::future::pending()).await, StopReason::Completed);
        assert_eq!(output(&monitor), "Validator ghost not found\n");
    }

    #[test]
    fn banner_respects_quiet() {
        let mut loud = Monitor::new(
            config(None, false, false),
            ScriptedSource::new(vec![]),
            RecordingClock::new(),
            Vec::new(),
        );
        loud.banner();
        assert_eq!(
            output(&loud),
            "Starting validator monitoring (checking every 60 seconds)...\n\
             Connecting to RPC at 127.0.0.1:3030\n"
        );

        let mut quiet = Monitor::new(
            config(Some("v1"), true, false),
            ScriptedSource::new(vec![]),
            RecordingClock::new(),
            Vec::new(),
        );
        quiet.banner();
        assert_eq!(output(&quiet), "");
    }
}
