//! PlanarQe -- the [`DisplayControl`] implementation for Planar QE displays.
//!
//! The controller owns three background pieces: the IO task (transport
//! reads and writes), the inbound queue worker (response processing) and,
//! once [`initialize`](PlanarQe::initialize) runs, the communication
//! monitor. Engine state sits behind one `std::sync::Mutex`; every engine
//! call returns [`Effects`] that are applied before that lock is released,
//! so commands and events leave in the order the engine produced them.
//! Applying never blocks: sends are `try_send`, events are broadcast and
//! timers are spawned. Lock order is engine, then timers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use planar_core::display::DisplayControl;
use planar_core::error::{Error, Result};
use planar_core::events::DisplayEvent;
use planar_core::transport::Transport;
use planar_core::types::{CommandOutcome, DisplayInfo, MonitorStatus, PowerState};
use planar_text_io::io::{CommandSender, DisplayIo, IoConfig, spawn_io_task};
use planar_text_io::queue::{InboundMessage, LineHandler, inbound_queue, spawn_worker};

use crate::commands;
use crate::engine::{DisplayEngine, Effect, Effects};
use crate::inputs::{InputCatalog, InputPort};
use crate::monitor::CommMonitor;
use crate::poll;
use crate::power::{TimerKind, TimerRequest};

const EVENT_CAPACITY: usize = 256;

/// Everything [`PlanarQe::new`] needs besides the transport and engine.
pub(crate) struct Options {
    pub info: DisplayInfo,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub monitor: CommMonitor,
    pub io: IoConfig,
}

/// A connected Planar QE display.
///
/// Cheap to clone; clones share one connection. Constructed via
/// [`PlanarQeBuilder`](crate::builder::PlanarQeBuilder).
#[derive(Clone)]
pub struct PlanarQe {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    info: DisplayInfo,
    engine: Mutex<DisplayEngine>,
    commands: CommandSender,
    event_tx: broadcast::Sender<DisplayEvent>,
    timers: Mutex<TimerSlots>,
    monitor: Mutex<CommMonitor>,
    settle_delay: Duration,
    poll_interval: Duration,
    tasks: Mutex<Tasks>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TimerSlots {
    warmup: Option<JoinHandle<()>>,
    cooldown: Option<JoinHandle<()>>,
}

impl TimerSlots {
    fn replace(&mut self, kind: TimerKind, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        match kind {
            TimerKind::WarmUp => self.warmup.replace(handle),
            TimerKind::CoolDown => self.cooldown.replace(handle),
        }
    }

    fn abort_all(&mut self) {
        for handle in [self.warmup.take(), self.cooldown.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct Tasks {
    io: Option<DisplayIo>,
    worker: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue worker callback. Holds the controller weakly so a dropped
/// controller is not kept alive by its own worker.
struct ResponseHandler {
    inner: Weak<Inner>,
}

impl LineHandler for ResponseHandler {
    fn handle_line(&self, message: &InboundMessage) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.process_line(message),
            None => debug!(line = %message.text, "controller gone, dropping line"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl PlanarQe {
    /// Spawn the IO task and queue worker around `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(transport: Box<dyn Transport>, engine: DisplayEngine, options: Options) -> Self {
        let (inbound_tx, inbound_rx) = inbound_queue();
        let io = spawn_io_task(transport, options.io, inbound_tx);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(Inner {
            info: options.info,
            engine: Mutex::new(engine),
            commands: io.commands.clone(),
            event_tx,
            timers: Mutex::new(TimerSlots::default()),
            monitor: Mutex::new(options.monitor),
            settle_delay: options.settle_delay,
            poll_interval: options.poll_interval,
            tasks: Mutex::new(Tasks::default()),
            cancel: CancellationToken::new(),
        });

        let handler = Arc::new(ResponseHandler {
            inner: Arc::downgrade(&inner),
        });
        let worker = spawn_worker(inner.info.key.clone(), inbound_rx, handler);
        {
            let mut tasks = lock(&inner.tasks);
            tasks.io = Some(io);
            tasks.worker = Some(worker);
        }

        info!(key = %inner.info.key, "display controller started");
        PlanarQe { inner }
    }

    /// Start the communication monitor. Calling it again is a no-op.
    pub fn initialize(&self) {
        let mut tasks = lock(&self.inner.tasks);
        if tasks.monitor.is_some() || tasks.io.is_none() {
            return;
        }
        debug!(
            key = %self.inner.info.key,
            interval_ms = self.inner.poll_interval.as_millis() as u64,
            "starting communication monitor"
        );
        lock(&self.inner.monitor).start(tokio::time::Instant::now());
        tasks.monitor = Some(poll::spawn_monitor(
            Arc::downgrade(&self.inner),
            self.inner.poll_interval,
            self.inner.cancel.child_token(),
        ));
    }

    /// Stop every background task and hand back the transport.
    ///
    /// Commands queued before this call are still written. Afterwards every
    /// command reports [`IgnoreReason::Closed`](planar_core::types::IgnoreReason::Closed).
    pub async fn shutdown(&self) -> Result<Box<dyn Transport>> {
        let (io, worker, monitor) = {
            let mut tasks = lock(&self.inner.tasks);
            (tasks.io.take(), tasks.worker.take(), tasks.monitor.take())
        };
        let io = io.ok_or(Error::NotConnected)?;

        self.inner.cancel.cancel();
        if let Some(monitor) = monitor {
            monitor.abort();
        }
        lock(&self.inner.timers).abort_all();

        let transport = io.shutdown().await?;
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        info!(key = %self.inner.info.key, "display controller stopped");
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Effects and inbound processing
// ---------------------------------------------------------------------------

impl Inner {
    fn emit(&self, event: DisplayEvent) {
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }

    /// Apply effects in order. Returns the outcome of the first send.
    fn apply(self: &Arc<Self>, fx: Effects) -> Option<CommandOutcome> {
        let mut first_send = None;
        for effect in fx {
            match effect {
                Effect::Send(cmd) => {
                    let outcome = self.commands.send_text(&cmd);
                    first_send.get_or_insert(outcome);
                }
                Effect::Notify(event) => self.emit(event),
                Effect::StartTimer(request) => self.arm_timer(request),
            }
        }
        first_send
    }

    /// Run `op` on the engine and apply its effects while still holding
    /// the engine lock.
    fn with_engine<R>(
        self: &Arc<Self>,
        op: impl FnOnce(&mut DisplayEngine, &mut Effects) -> R,
    ) -> (R, Option<CommandOutcome>) {
        let mut engine = lock(&self.engine);
        let mut fx = Effects::new();
        let result = op(&mut engine, &mut fx);
        let sent = self.apply(fx);
        drop(engine);
        (result, sent)
    }

    fn run(self: &Arc<Self>, op: impl FnOnce(&mut DisplayEngine, &mut Effects) -> CommandOutcome) -> CommandOutcome {
        match self.with_engine(op) {
            (CommandOutcome::Sent, Some(sent)) => sent,
            (outcome, _) => outcome,
        }
    }

    fn arm_timer(self: &Arc<Self>, request: TimerRequest) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(request.after).await;
            if let Some(inner) = weak.upgrade() {
                inner.timer_elapsed(request);
            }
        });
        let previous = lock(&self.timers).replace(request.kind, handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn timer_elapsed(self: &Arc<Self>, request: TimerRequest) {
        self.with_engine(|engine, fx| engine.timer_elapsed(request.kind, request.generation, fx));
    }

    fn process_line(self: &Arc<Self>, message: &InboundMessage) {
        self.update_monitor(|m| m.record_activity(message.received_at));

        self.with_engine(|engine, fx| engine.handle_line(&message.text, fx));
    }

    fn update_monitor(&self, f: impl FnOnce(&mut CommMonitor) -> Option<MonitorStatus>) {
        let (was_online, changed) = {
            let mut monitor = lock(&self.monitor);
            let was_online = monitor.is_online();
            (was_online, f(&mut monitor))
        };
        let Some(status) = changed else {
            return;
        };

        match status {
            MonitorStatus::Ok => info!(key = %self.info.key, "communication ok"),
            MonitorStatus::Warning => warn!(key = %self.info.key, "no response from display"),
            MonitorStatus::Error => warn!(key = %self.info.key, "display offline"),
            MonitorStatus::Unknown => {}
        }
        self.emit(DisplayEvent::MonitorStatusChanged { status });
        if status.is_online() != was_online {
            self.emit(DisplayEvent::OnlineChanged {
                online: status.is_online(),
            });
        }
    }

    // -- hooks for the poll driver --

    pub(crate) fn check_health(&self) {
        let now = tokio::time::Instant::now();
        self.update_monitor(|m| m.evaluate(now));
    }

    pub(crate) fn query_state(&self) {
        self.commands.send_text(&commands::cmd_query_state());
    }

    pub(crate) fn query_input(&self) {
        self.commands.send_text(&commands::cmd_query_source());
    }

    pub(crate) fn is_on(&self) -> bool {
        lock(&self.engine).power_state().is_on()
    }

    pub(crate) fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(io) = &tasks.io {
            io.cancel.cancel();
        }
        if let Some(monitor) = &tasks.monitor {
            monitor.abort();
        }
        self.timers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
    }
}

// ---------------------------------------------------------------------------
// Driver-specific operations
// ---------------------------------------------------------------------------

impl PlanarQe {
    /// Send `SYSTEM.STATE?` on its own.
    pub fn power_get(&self) -> CommandOutcome {
        self.inner.commands.send_text(&commands::cmd_query_state())
    }

    /// Step to the next source (`SOURCE.SELECT+`).
    pub fn input_toggle(&self) -> CommandOutcome {
        self.inner.commands.send_text(&commands::cmd_next_source())
    }

    /// Ask for the selected source (`SOURCE.SELECT?`).
    pub fn input_get(&self) -> CommandOutcome {
        self.inner.commands.send_text(&commands::cmd_query_source())
    }

    /// Write a raw command. The terminator is appended.
    pub fn send_text(&self, cmd: &str) -> CommandOutcome {
        self.inner.commands.send_text(cmd)
    }

    pub fn ports(&self) -> Vec<InputPort> {
        lock(&self.inner.engine).router().ports().to_vec()
    }

    pub fn catalog(&self) -> InputCatalog {
        lock(&self.inner.engine).catalog().clone()
    }

    /// 1-based number of the confirmed input, 0 when none is known.
    pub fn current_input_number(&self) -> usize {
        lock(&self.inner.engine).router().current_number()
    }

    /// Selected flag for every port, in port order.
    pub fn input_feedback(&self) -> Vec<(String, bool)> {
        lock(&self.inner.engine).router().feedback()
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        lock(&self.inner.monitor).status()
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }
}

#[async_trait]
impl DisplayControl for PlanarQe {
    fn info(&self) -> &DisplayInfo {
        &self.inner.info
    }

    fn power_on(&self) -> CommandOutcome {
        self.inner.run(|engine, fx| engine.power_on(fx))
    }

    fn power_off(&self) -> CommandOutcome {
        self.inner.run(|engine, fx| engine.power_off(fx))
    }

    fn power_toggle(&self) -> CommandOutcome {
        self.inner.run(|engine, fx| engine.power_toggle(fx))
    }

    fn power_state(&self) -> PowerState {
        lock(&self.inner.engine).power_state()
    }

    fn set_input(&self, number: usize) -> CommandOutcome {
        self.inner.run(|engine, fx| engine.set_input(number, fx))
    }

    fn select_input(&self, key: &str) -> CommandOutcome {
        self.inner.run(|engine, fx| engine.select_input(key, fx))
    }

    fn current_input(&self) -> Option<String> {
        lock(&self.inner.engine)
            .router()
            .current_key()
            .map(str::to_string)
    }

    async fn status_get(&self) {
        poll::poll_status(&Arc::downgrade(&self.inner)).await;
    }

    fn is_online(&self) -> bool {
        lock(&self.inner.monitor).is_online()
    }

    fn fire_updates(&self) {
        self.inner.with_engine(|engine, fx| engine.current_values(fx));

        let status = self.monitor_status();
        self.inner.emit(DisplayEvent::MonitorStatusChanged { status });
        self.inner.emit(DisplayEvent::OnlineChanged {
            online: status.is_online(),
        });
    }

    fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.inner.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PlanarQeBuilder;
    use planar_core::types::IgnoreReason;
    use planar_test_harness::{MockHandle, MockTransport};
    use tokio::time::sleep;

    async fn make_display(mock: MockTransport) -> PlanarQe {
        PlanarQeBuilder::new()
            .warming_time_ms(10_000)
            .cooling_time_ms(8_000)
            .build_with_transport(Box::new(mock))
            .await
            .unwrap()
    }

    async fn setup() -> (PlanarQe, MockHandle) {
        let mock = MockTransport::new();
        let handle = mock.handle();
        (make_display(mock).await, handle)
    }

    /// Let the IO task and worker catch up.
    async fn settle() {
        sleep(Duration::from_millis(50)).await;
    }

    fn drain(rx: &mut broadcast::Receiver<DisplayEvent>) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_writes_terminated_command() {
        let (display, handle) = setup().await;
        assert_eq!(display.power_on(), CommandOutcome::Sent);
        settle().await;
        assert_eq!(handle.sent_data(), vec![b"DISPLAY.POWER=ON\r".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn warm_up_runs_to_on() {
        let (display, handle) = setup().await;
        let mut rx = display.subscribe();

        handle.push_line("display.power:on");
        settle().await;
        assert_eq!(display.power_state(), PowerState::WarmingUp);
        assert_eq!(
            display.power_on(),
            CommandOutcome::Ignored(IgnoreReason::InTransition)
        );

        sleep(Duration::from_secs(10)).await;
        assert_eq!(display.power_state(), PowerState::On);
        assert_eq!(
            drain(&mut rx),
            vec![
                DisplayEvent::MonitorStatusChanged {
                    status: MonitorStatus::Ok
                },
                DisplayEvent::OnlineChanged { online: true },
                DisplayEvent::PowerChanged { on: true },
                DisplayEvent::WarmingChanged { warming: true },
                DisplayEvent::WarmingChanged { warming: false },
            ]
        );
        assert!(handle.sent_lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cool_down_runs_to_off() {
        let (display, handle) = setup().await;
        handle.push_line("system.state:on");
        settle().await;
        assert_eq!(display.power_off(), CommandOutcome::Sent);

        handle.push_line("system.state:powering.down");
        settle().await;
        assert_eq!(display.power_state(), PowerState::CoolingDown);

        sleep(Duration::from_secs(8)).await;
        assert_eq!(display.power_state(), PowerState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_switch_end_to_end() {
        let (display, handle) = setup().await;

        assert_eq!(display.set_input(2), CommandOutcome::Deferred);
        settle().await;
        assert_eq!(handle.sent_lines(), vec!["DISPLAY.POWER=ON"]);

        handle.push_line("system.state:powering.on");
        settle().await;
        assert_eq!(handle.sent_lines(), vec!["DISPLAY.POWER=ON"]);

        sleep(Duration::from_secs(11)).await;
        assert_eq!(
            handle.sent_lines(),
            vec!["DISPLAY.POWER=ON", "SOURCE.SELECT=HDMI.2"]
        );

        handle.push_line("source.select:hdmi.2");
        settle().await;
        assert_eq!(display.current_input().as_deref(), Some("hdmiIn2"));
        assert_eq!(display.current_input_number(), 2);
        assert_eq!(display.catalog().current_key(), Some("hdmiIn2"));
    }

    #[tokio::test(start_paused = true)]
    async fn switch_after_settle_follows_drained_switch() {
        let (display, handle) = setup().await;
        assert_eq!(display.set_input(2), CommandOutcome::Deferred);
        handle.push_line("system.state:powering.on");
        settle().await;

        sleep(Duration::from_secs(10)).await;
        assert_eq!(display.set_input(3), CommandOutcome::Sent);
        settle().await;
        assert_eq!(
            handle.sent_lines(),
            vec!["DISPLAY.POWER=ON", "SOURCE.SELECT=HDMI.2", "SOURCE.SELECT=HDMI.3"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn events_follow_engine_order_across_threads() {
        let (display, handle) = setup().await;
        let mut rx = display.subscribe();

        let republisher = {
            let display = display.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    display.fire_updates();
                    tokio::task::yield_now().await;
                }
            })
        };
        for i in 0..200 {
            handle.push_line(&format!("source.select:hdmi.{}", i % 4 + 1));
            if i % 10 == 0 {
                tokio::task::yield_now().await;
            }
        }
        republisher.await.unwrap();
        sleep(Duration::from_millis(300)).await;

        let mut last_number = None;
        loop {
            match rx.try_recv() {
                Ok(DisplayEvent::InputChanged { number, .. }) => last_number = Some(number),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        assert_eq!(last_number, Some(display.current_input_number()));
        assert_eq!(display.current_input_number(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_notifies_once() {
        let (display, handle) = setup().await;
        let mut rx = display.subscribe();

        handle.push_line("source.select:dp");
        handle.push_line("source.select:DP");
        settle().await;

        let changes: Vec<DisplayEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, DisplayEvent::InputChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![DisplayEvent::InputChanged {
                number: 5,
                key: Some("displayPortIn1".into()),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_transport_drops_commands() {
        let (display, handle) = setup().await;
        handle.set_connected(false);
        display.power_on();
        settle().await;
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn status_get_skips_input_query_when_off() {
        let (display, handle) = setup().await;
        display.status_get().await;
        settle().await;
        assert_eq!(handle.sent_lines(), vec!["SYSTEM.STATE?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_get_queries_input_when_on() {
        let (display, handle) = setup().await;
        handle.push_line("system.state:on");
        settle().await;

        display.status_get().await;
        settle().await;
        assert_eq!(handle.sent_lines(), vec!["SYSTEM.STATE?", "SOURCE.SELECT?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn extra_queries() {
        let (display, handle) = setup().await;
        display.power_get();
        display.input_get();
        display.input_toggle();
        assert_eq!(
            display.send_text(""),
            CommandOutcome::Ignored(IgnoreReason::EmptyCommand)
        );
        settle().await;
        assert_eq!(
            handle.sent_lines(),
            vec!["SYSTEM.STATE?", "SOURCE.SELECT?", "SOURCE.SELECT+"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_ages_without_traffic() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        handle.expect_line("SYSTEM.STATE?", "system.state:standby");
        let display = make_display(mock).await;
        assert_eq!(display.monitor_status(), MonitorStatus::Unknown);
        assert!(!display.is_online());

        display.initialize();
        settle().await;
        assert_eq!(display.monitor_status(), MonitorStatus::Ok);
        assert!(display.is_online());

        sleep(Duration::from_secs(230)).await;
        assert_eq!(display.monitor_status(), MonitorStatus::Warning);
        assert!(display.is_online());

        sleep(Duration::from_secs(90)).await;
        assert_eq!(display.monitor_status(), MonitorStatus::Error);
        assert!(!display.is_online());

        // One poll per interval.
        let polls = handle
            .sent_lines()
            .iter()
            .filter(|l| *l == "SYSTEM.STATE?")
            .count();
        assert_eq!(polls, 1 + (320 / 45));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_display_goes_offline() {
        let (display, handle) = setup().await;
        display.initialize();
        settle().await;
        assert!(handle.sent_lines().contains(&"SYSTEM.STATE?".to_string()));
        assert_eq!(display.monitor_status(), MonitorStatus::Ok);

        sleep(Duration::from_secs(195)).await;
        assert_eq!(display.monitor_status(), MonitorStatus::Warning);

        sleep(Duration::from_secs(125)).await;
        assert_eq!(display.monitor_status(), MonitorStatus::Error);
        assert!(!display.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn fire_updates_republishes_everything() {
        let (display, handle) = setup().await;
        handle.push_line("source.select:hdmi.4");
        settle().await;

        let mut rx = display.subscribe();
        display.fire_updates();
        let events = drain(&mut rx);

        assert!(events.contains(&DisplayEvent::PowerChanged { on: false }));
        assert!(events.contains(&DisplayEvent::InputChanged {
            number: 4,
            key: Some("hdmiIn4".into()),
        }));
        assert!(events.contains(&DisplayEvent::InputFeedback {
            key: "hdmiIn4".into(),
            selected: true,
        }));
        assert!(events.contains(&DisplayEvent::OnlineChanged { online: true }));
        let feedback = events
            .iter()
            .filter(|e| matches!(e, DisplayEvent::InputFeedback { .. }))
            .count();
        assert_eq!(feedback, display.ports().len());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_transport() {
        let (display, handle) = setup().await;
        display.initialize();
        display.power_on();

        let transport = display.shutdown().await.unwrap();
        assert!(transport.is_connected());
        assert!(handle.sent_lines().contains(&"DISPLAY.POWER=ON".to_string()));

        assert_eq!(
            display.power_on(),
            CommandOutcome::Ignored(IgnoreReason::Closed)
        );
        assert!(matches!(display.shutdown().await, Err(Error::NotConnected)));
    }
}
