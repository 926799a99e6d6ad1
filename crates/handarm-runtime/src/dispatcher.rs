//! Command Dispatcher – the fixed-rate send loop.
//!
//! Every `interval` the dispatcher takes one snapshot of the shared joint
//! targets and writes one token per configured channel, in channel order,
//! through the session.  A cycle is skipped outright when the link is down.
//! A failed send is logged and the cycle moves on to the next channel; the
//! next cycle retries with whatever the targets are by then.
//!
//! # Timing
//!
//! The loop runs on a Tokio interval with [`MissedTickBehavior::Skip`]: a
//! cycle that overruns its period is never followed by a burst of catch-up
//! cycles.
//!
//! # Failure policy
//!
//! By default failures never end the loop.  With
//! [`FailurePolicy::limit`] set, that many *consecutive* failed sends end it
//! with [`DispatchExit::LinkUnhealthy`]; any successful send resets the
//! count.

use std::sync::Arc;
use std::time::Duration;

use handarm_link::CommandSink;
use handarm_types::{ArmError, JointChannel, WireCommand};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::targets::TargetReader;

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

/// Which channels are sent each cycle, and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    channels: Vec<JointChannel>,
    interval: Duration,
}

impl DispatchPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    /// All five channels every `interval`.
    pub fn all(interval: Duration) -> Result<Self, ArmError> {
        Self::subset(&JointChannel::ALL, interval)
    }

    /// Only `channels` every `interval`.  Duplicates are dropped and the
    /// send order is always channel order, whatever order they are given in.
    ///
    /// # Errors
    ///
    /// [`ArmError::Config`] for an empty channel list or a zero interval.
    pub fn subset(channels: &[JointChannel], interval: Duration) -> Result<Self, ArmError> {
        if interval.is_zero() {
            return Err(ArmError::Config("dispatch interval must be non-zero".to_string()));
        }
        let mut channels = channels.to_vec();
        channels.sort();
        channels.dedup();
        if channels.is_empty() {
            return Err(ArmError::Config("dispatch channel list is empty".to_string()));
        }
        Ok(Self { channels, interval })
    }

    pub fn channels(&self) -> &[JointChannel] {
        &self.channels
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            channels: JointChannel::ALL.to_vec(),
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// When repeated send failures end the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    pub max_consecutive: Option<u32>,
}

impl FailurePolicy {
    /// Never give up on send failures.
    pub fn tolerant() -> Self {
        Self::default()
    }

    /// Give up after `n` consecutive failed sends.  `0` is treated as `1`.
    pub fn limit(n: u32) -> Self {
        Self {
            max_consecutive: Some(n.max(1)),
        }
    }
}

/// Counts consecutive failed sends against a [`FailurePolicy`].
#[derive(Debug)]
struct FailureStreak {
    policy: FailurePolicy,
    current: u32,
}

impl FailureStreak {
    fn new(policy: FailurePolicy) -> Self {
        Self { policy, current: 0 }
    }

    /// Record one send outcome.  Returns `true` once the limit is reached.
    fn record(&mut self, ok: bool) -> bool {
        if ok {
            self.current = 0;
        } else {
            self.current = self.current.saturating_add(1);
        }
        self.tripped()
    }

    fn tripped(&self) -> bool {
        self.policy
            .max_consecutive
            .is_some_and(|limit| self.current >= limit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sent: u32,
    pub failed: u32,
    /// The link was down (or closed) and the cycle sent nothing further.
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchExit {
    /// The stop signal was observed.
    Stopped,
    /// The failure limit was reached.
    LinkUnhealthy,
}

/// Totals for a whole dispatcher run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub cycles: u64,
    pub sends: u64,
    pub failures: u64,
    pub skipped: u64,
    pub exit: DispatchExit,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    policy: DispatchPolicy,
    streak: FailureStreak,
    targets: TargetReader,
    sink: Arc<dyn CommandSink>,
}

impl Dispatcher {
    pub fn new(
        policy: DispatchPolicy,
        failure: FailurePolicy,
        targets: TargetReader,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            policy,
            streak: FailureStreak::new(failure),
            targets,
            sink,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Run a single cycle.  `stop` is checked before every send so a
    /// shutdown never waits for the rest of the cycle.
    #[instrument(name = "dispatch_cycle", level = "debug", skip_all)]
    pub async fn run_cycle(&mut self, stop: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();
        if !self.sink.is_connected().await {
            debug!("link down; skipping dispatch cycle");
            report.skipped = true;
            return report;
        }

        let snapshot = self.targets.snapshot();
        for &channel in &self.policy.channels {
            if *stop.borrow() {
                break;
            }
            let command = WireCommand::new(channel, snapshot.get(channel));
            match self.sink.send(command).await {
                Ok(()) => {
                    report.sent += 1;
                    self.streak.record(true);
                }
                Err(ArmError::SessionClosed) => {
                    report.skipped = true;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(channel = %channel, value = command.value, error = %e, "send failed");
                    if self.streak.record(false) {
                        break;
                    }
                }
            }
        }
        report
    }

    /// Loop until `stop` turns `true` (or its sender is dropped) or the
    /// failure policy trips.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> DispatchReport {
        info!(
            interval_ms = self.policy.interval.as_millis() as u64,
            channels = ?self.policy.channels,
            "dispatcher started"
        );
        let mut ticker = tokio::time::interval(self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut totals = DispatchReport {
            cycles: 0,
            sends: 0,
            failures: 0,
            skipped: 0,
            exit: DispatchExit::Stopped,
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *stop.borrow() {
                break;
            }

            let cycle = self.run_cycle(&stop).await;
            totals.cycles += 1;
            totals.sends += u64::from(cycle.sent);
            totals.failures += u64::from(cycle.failed);
            if cycle.skipped {
                totals.skipped += 1;
            }

            if self.streak.tripped() {
                error!(
                    consecutive = self.streak.current,
                    "too many consecutive send failures; link unhealthy"
                );
                totals.exit = DispatchExit::LinkUnhealthy;
                break;
            }
        }

        info!(
            cycles = totals.cycles,
            sends = totals.sends,
            failures = totals.failures,
            skipped = totals.skipped,
            exit = ?totals.exit,
            "dispatcher stopped"
        );
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::target_channel;
    use async_trait::async_trait;
    use handarm_types::{JointTargets, PartialTargets};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Records every command; fails the sends whose 1-based ordinal is in
    /// `fail_on`, or every send when `always_fail` is set.
    #[derive(Default)]
    struct FakeSink {
        down: AtomicBool,
        always_fail: AtomicBool,
        fail_on: Mutex<HashSet<u64>>,
        attempts: AtomicU64,
        sent: Mutex<Vec<WireCommand>>,
    }

    #[async_trait]
    impl CommandSink for FakeSink {
        async fn is_connected(&self) -> bool {
            !self.down.load(Ordering::SeqCst)
        }

        async fn send(&self, command: WireCommand) -> Result<(), ArmError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.always_fail.load(Ordering::SeqCst) || self.fail_on.lock().unwrap().contains(&n) {
                return Err(ArmError::Send {
                    channel: command.channel,
                    details: "injected".to_string(),
                });
            }
            self.sent.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn dispatcher(policy: DispatchPolicy, failure: FailurePolicy) -> (Dispatcher, Arc<FakeSink>, crate::targets::TargetWriter) {
        let sink = Arc::new(FakeSink::default());
        let (writer, reader) = target_channel(JointTargets::REST_POSE);
        let d = Dispatcher::new(policy, failure, reader, Arc::clone(&sink) as Arc<dyn CommandSink>);
        (d, sink, writer)
    }

    fn idle_stop() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    /// Collects the name of every span opened while it is the default.
    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().unwrap().push(attrs.metadata().name());
        }
    }

    #[tokio::test]
    async fn each_cycle_runs_in_a_dispatch_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let (mut d, _sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (_tx, rx) = idle_stop();
        d.run_cycle(&rx).await;
        d.run_cycle(&rx).await;

        let names = names.0.lock().unwrap();
        assert_eq!(names.iter().filter(|n| **n == "dispatch_cycle").count(), 2);
    }

    #[test]
    fn policy_rejects_empty_and_zero() {
        assert!(matches!(DispatchPolicy::subset(&[], Duration::from_millis(20)), Err(ArmError::Config(_))));
        assert!(matches!(DispatchPolicy::all(Duration::ZERO), Err(ArmError::Config(_))));
    }

    #[test]
    fn policy_orders_and_dedups_channels() {
        let p = DispatchPolicy::subset(
            &[JointChannel::Hand, JointChannel::Base, JointChannel::Hand],
            Duration::from_millis(20),
        )
        .unwrap();
        assert_eq!(p.channels(), &[JointChannel::Base, JointChannel::Hand]);
    }

    #[tokio::test]
    async fn hundred_cycles_send_each_channel_once_per_connected_cycle() {
        let (mut d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (_tx, rx) = idle_stop();
        let mut connected_cycles = 0;
        for i in 0..100 {
            // Every third cycle the link is down.
            let up = i % 3 != 2;
            sink.down.store(!up, Ordering::SeqCst);
            let before = sink.attempts.load(Ordering::SeqCst);
            let report = d.run_cycle(&rx).await;
            let attempts = sink.attempts.load(Ordering::SeqCst) - before;
            if up {
                connected_cycles += 1;
                assert_eq!(report, CycleReport { sent: 5, failed: 0, skipped: false });
                assert_eq!(attempts, 5);
            } else {
                assert_eq!(report, CycleReport { sent: 0, failed: 0, skipped: true });
                assert_eq!(attempts, 0);
            }
        }
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), connected_cycles * 5);
        for cycle in sent.chunks(5) {
            let channels: Vec<_> = cycle.iter().map(|c| c.channel).collect();
            assert_eq!(channels, JointChannel::ALL.to_vec());
        }
    }

    #[tokio::test]
    async fn disconnected_link_sends_nothing() {
        let (mut d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        sink.down.store(true, Ordering::SeqCst);
        let (_tx, rx) = idle_stop();
        let report = d.run_cycle(&rx).await;
        assert!(report.skipped);
        assert_eq!(report.sent, 0);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_does_not_block_next_channel_or_cycle() {
        let (mut d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        // Second send of the first cycle fails.
        sink.fail_on.lock().unwrap().insert(2);
        let (_tx, rx) = idle_stop();

        let first = d.run_cycle(&rx).await;
        assert_eq!(first, CycleReport { sent: 4, failed: 1, skipped: false });
        let second = d.run_cycle(&rx).await;
        assert_eq!(second, CycleReport { sent: 5, failed: 0, skipped: false });
    }

    #[tokio::test]
    async fn sends_latest_snapshot_values() {
        let (mut d, sink, w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (_tx, rx) = idle_stop();
        w.merge(&PartialTargets::empty().with(JointChannel::Base, 123));
        d.run_cycle(&rx).await;
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], WireCommand::new(JointChannel::Base, 123));
        assert_eq!(sent[4], WireCommand::new(JointChannel::Hand, JointTargets::REST_POSE.get(JointChannel::Hand)));
    }

    #[tokio::test]
    async fn subset_policy_sends_only_configured_channels() {
        let policy = DispatchPolicy::subset(&[JointChannel::Top, JointChannel::Base], Duration::from_millis(20)).unwrap();
        let (mut d, sink, _w) = dispatcher(policy, FailurePolicy::tolerant());
        let (_tx, rx) = idle_stop();
        d.run_cycle(&rx).await;
        let channels: Vec<_> = sink.sent.lock().unwrap().iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![JointChannel::Base, JointChannel::Top]);
    }

    #[tokio::test]
    async fn stop_flag_halts_cycle_before_next_send() {
        let (mut d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (tx, rx) = idle_stop();
        tx.send(true).unwrap();
        let report = d.run_cycle(&rx).await;
        assert_eq!(report.sent, 0);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_signal() {
        let (d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (tx, rx) = idle_stop();
        let handle = tokio::spawn(d.run(rx));
        tokio::time::sleep(Duration::from_millis(105)).await;
        tx.send(true).unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.exit, DispatchExit::Stopped);
        assert!(report.cycles >= 5, "cycles = {}", report.cycles);
        assert_eq!(report.sends, report.cycles * 5);
        assert_eq!(sink.sent.lock().unwrap().len() as u64, report.sends);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_stop_sender_dropped() {
        let (d, _sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        let (tx, rx) = idle_stop();
        let handle = tokio::spawn(d.run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(tx);
        assert_eq!(handle.await.unwrap().exit, DispatchExit::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn tolerant_policy_keeps_running_through_failures() {
        let (d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::tolerant());
        sink.always_fail.store(true, Ordering::SeqCst);
        let (tx, rx) = idle_stop();
        let handle = tokio::spawn(d.run(rx));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.exit, DispatchExit::Stopped);
        assert_eq!(report.sends, 0);
        assert!(report.failures >= 25);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_limit_ends_run_as_unhealthy() {
        let (d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::limit(3));
        sink.always_fail.store(true, Ordering::SeqCst);
        let (_tx, rx) = idle_stop();
        let report = d.run(rx).await;
        assert_eq!(report.exit, DispatchExit::LinkUnhealthy);
        assert_eq!(report.failures, 3);
        assert_eq!(report.cycles, 1);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let (mut d, sink, _w) = dispatcher(DispatchPolicy::default(), FailurePolicy::limit(2));
        // Alternate fail/succeed: never two in a row.
        sink.fail_on.lock().unwrap().extend([1, 3, 5, 7, 9]);
        let (_tx, rx) = idle_stop();
        for _ in 0..2 {
            let report = d.run_cycle(&rx).await;
            assert_eq!(report.sent + report.failed, 5);
        }
        assert!(!d.streak.tripped());
    }
}
