//! Partner window manager.
//!
//! Mirrors the latest text onto the partner display while the feature is
//! enabled and the device is attached. Three tasks cooperate:
//!
//! - presence: probes the bus on a fixed interval (and on hotplug events)
//!   and publishes changes of `device_connected`
//! - controller: combines `enabled` and `device_connected` and is the only
//!   place sessions are started or torn down
//! - mirror: one per session, sends debounced text to the display
//!
//! All hardware access goes through the [`HardwareHandle`] thread.

use anyhow::{bail, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use partner_display_hw::{MirrorRequest, Rgb};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::hardware::{DisplayBackend, HardwareHandle};
use crate::text;

/// How mirrored text is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStyle {
    pub font: i16,
    pub color: Rgb,
    pub strip_tags: bool,
}

impl MirrorStyle {
    /// Centered request for `raw`, cleaned for the display.
    pub fn request(&self, raw: &str) -> MirrorRequest {
        MirrorRequest::centered(text::for_display(raw, self.strip_tags), self.font, self.color)
    }
}

impl Default for MirrorStyle {
    fn default() -> Self {
        Self {
            font: 31,
            color: Rgb::WHITE,
            strip_tags: true,
        }
    }
}

/// Timing and style for a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub poll: Duration,
    pub debounce: Duration,
    pub hotplug: bool,
    pub style: MirrorStyle,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(3),
            debounce: Duration::from_millis(100),
            hotplug: true,
            style: MirrorStyle::default(),
        }
    }
}

enum Event {
    Stop(oneshot::Sender<()>),
    MirrorFailed(u64),
}

struct Running {
    events: mpsc::Sender<Event>,
    controller: JoinHandle<()>,
    presence: JoinHandle<()>,
    worker: thread::JoinHandle<()>,
}

enum Lifecycle {
    Ready(Box<dyn DisplayBackend>),
    Running(Running),
    Stopped,
}

/// Drives the partner display from an `enabled` flag and a text source.
pub struct PartnerWindowManager {
    settings: ManagerSettings,
    lifecycle: Lifecycle,
    enabled: watch::Receiver<bool>,
    text: watch::Sender<String>,
    connected: watch::Sender<bool>,
    active: watch::Sender<bool>,
}

impl PartnerWindowManager {
    pub fn new<B: DisplayBackend>(
        backend: B,
        settings: ManagerSettings,
        enabled: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            lifecycle: Lifecycle::Ready(Box::new(backend)),
            enabled,
            text: watch::channel(String::new()).0,
            connected: watch::channel(false).0,
            active: watch::channel(false).0,
        }
    }

    /// Starts the hardware thread and background tasks.
    ///
    /// Must be called from within a tokio runtime. A manager runs once;
    /// starting it again after [`stop`](Self::stop) is an error.
    pub fn start(&mut self) -> Result<()> {
        let backend = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Ready(backend) => backend,
            Lifecycle::Running(running) => {
                self.lifecycle = Lifecycle::Running(running);
                warn!("Partner window manager already running");
                return Ok(());
            }
            Lifecycle::Stopped => bail!("partner window manager has been stopped"),
        };
        info!("Partner window manager starting");

        let hotplug = if self.settings.hotplug {
            backend.watch_hotplug()
        } else {
            None
        };
        let (hw, worker) = HardwareHandle::spawn(backend)?;
        let (events_tx, events_rx) = mpsc::channel(8);

        let presence = tokio::spawn(presence_loop(
            hw.clone(),
            self.connected.clone(),
            self.settings.poll,
            hotplug,
        ));

        let controller = Controller {
            hw,
            enabled: self.enabled.clone(),
            connected: self.connected.subscribe(),
            text: self.text.subscribe(),
            active: self.active.clone(),
            events_tx: events_tx.clone(),
            debounce: self.settings.debounce,
            style: self.settings.style,
            session: None,
            next_session: 0,
        };
        let controller = tokio::spawn(controller.run(events_rx));

        self.lifecycle = Lifecycle::Running(Running {
            events: events_tx,
            controller,
            presence,
            worker,
        });
        Ok(())
    }

    /// Tears down any session and stops every task. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        let running = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => running,
            _ => return,
        };
        info!("Partner window manager stopping");

        let (ack_tx, ack_rx) = oneshot::channel();
        if running.events.send(Event::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        running.presence.abort();
        let _ = running.presence.await;
        let _ = running.controller.await;
        drop(running.events);

        // Every handle is gone now, so the thread finishes on its own
        if !matches!(
            tokio::task::spawn_blocking(move || running.worker.join()).await,
            Ok(Ok(()))
        ) {
            warn!("Hardware thread did not exit cleanly");
        }
        self.active.send_replace(false);
    }

    /// Replaces the text to mirror. Never blocks and never fails.
    pub fn update_text(&self, text: impl Into<String>) {
        self.text.send_replace(text.into());
    }

    /// Device presence as last probed.
    pub fn subscribe_device_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Whether a session is open and mirroring.
    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }
}

async fn presence_loop(
    hw: HardwareHandle,
    connected: watch::Sender<bool>,
    poll: Duration,
    mut hotplug: Option<BoxStream<'static, ()>>,
) {
    loop {
        let present = match hw.probe().await {
            Ok(present) => present,
            Err(e) => {
                debug!("Presence probe stopped: {}", e);
                return;
            }
        };
        connected.send_if_modified(|current| {
            if *current == present {
                return false;
            }
            *current = present;
            debug!("Partner display connected: {}", present);
            true
        });

        let mut hotplug_ended = false;
        match hotplug.as_mut() {
            Some(events) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll) => {}
                    event = events.next() => {
                        if event.is_some() {
                            debug!("USB hotplug event");
                        } else {
                            hotplug_ended = true;
                        }
                    }
                }
            }
            None => tokio::time::sleep(poll).await,
        }
        if hotplug_ended {
            warn!("USB hotplug stream ended, polling only");
            hotplug = None;
        }
    }
}

struct Session {
    id: u64,
    mirror: JoinHandle<()>,
}

struct Controller {
    hw: HardwareHandle,
    enabled: watch::Receiver<bool>,
    connected: watch::Receiver<bool>,
    text: watch::Receiver<String>,
    active: watch::Sender<bool>,
    events_tx: mpsc::Sender<Event>,
    debounce: Duration,
    style: MirrorStyle,
    session: Option<Session>,
    next_session: u64,
}

impl Controller {
    async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        let mut wanted = false;
        let mut enabled_open = true;
        let mut connected_open = true;
        self.enabled.mark_changed();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(Event::Stop(ack)) => {
                        self.stop_mirroring().await;
                        let _ = ack.send(());
                        return;
                    }
                    Some(Event::MirrorFailed(id)) => {
                        if self.session.as_ref().is_some_and(|s| s.id == id) {
                            // Stays idle until enabled or connected changes
                            self.stop_mirroring().await;
                        }
                        continue;
                    }
                    None => {
                        self.stop_mirroring().await;
                        return;
                    }
                },
                changed = self.enabled.changed(), if enabled_open => {
                    if changed.is_err() {
                        enabled_open = false;
                    }
                }
                changed = self.connected.changed(), if connected_open => {
                    if changed.is_err() {
                        connected_open = false;
                    }
                }
            }

            let now = *self.enabled.borrow_and_update() && *self.connected.borrow_and_update();
            if now == wanted {
                continue;
            }
            wanted = now;
            if wanted {
                self.start_mirroring().await;
            } else {
                self.stop_mirroring().await;
            }
        }
    }

    async fn start_mirroring(&mut self) {
        if self.session.is_some() {
            return;
        }
        info!("Starting partner window mirroring");
        if let Err(e) = self.hw.open().await {
            warn!("Failed to start partner display: {:#}", e);
            return;
        }

        let id = self.next_session;
        self.next_session += 1;
        let mirror = tokio::spawn(mirror_loop(
            id,
            self.hw.clone(),
            self.text.clone(),
            self.events_tx.clone(),
            self.debounce,
            self.style,
        ));
        self.session = Some(Session { id, mirror });
        self.active.send_replace(true);
        info!("Partner window mirroring active");
    }

    /// Cancels the mirror task before releasing the hardware.
    async fn stop_mirroring(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("Stopping partner window mirroring");
        session.mirror.abort();
        let _ = session.mirror.await;
        if let Err(e) = self.hw.close().await {
            warn!("Error releasing partner display: {:#}", e);
        }
        self.active.send_replace(false);
    }
}

async fn mirror_loop(
    id: u64,
    hw: HardwareHandle,
    mut text: watch::Receiver<String>,
    events: mpsc::Sender<Event>,
    debounce: Duration,
    style: MirrorStyle,
) {
    // Show the current text as soon as the session starts
    text.mark_changed();
    loop {
        if text.changed().await.is_err() {
            return;
        }
        // Wait for a quiet period; every new value restarts it
        loop {
            tokio::select! {
                changed = text.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let request = style.request(&text.borrow_and_update());
        debug!("Mirroring {} bytes", request.text.len());
        if let Err(e) = hw.mirror(request).await {
            warn!("Failed to update partner display: {:#}", e);
            let _ = events.send(Event::MirrorFailed(id)).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::DisplayDriver;
    use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
    use partner_display_hw::Error as HwError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Open(usize),
        Init(usize),
        Mirror(usize, String),
        Shutdown(usize),
        Close(usize),
    }

    #[derive(Clone, Default)]
    struct Script {
        calls: Arc<Mutex<Vec<Call>>>,
        connected: Arc<AtomicBool>,
        fail_open: Arc<AtomicBool>,
        fail_mirror: Arc<AtomicBool>,
        drivers: Arc<AtomicUsize>,
        presence_checks: Arc<AtomicUsize>,
    }

    impl Script {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| matches(c)).count()
        }

        fn mirrors(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Mirror(_, text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    struct ScriptedDriver {
        id: usize,
        script: Script,
    }

    impl DisplayDriver for ScriptedDriver {
        fn open(&mut self) -> partner_display_hw::Result<()> {
            self.script.record(Call::Open(self.id));
            if self.script.fail_open.load(Ordering::SeqCst) {
                return Err(HwError::DeviceNotFound {
                    vendor_id: 0x0403,
                    product_id: 0x6014,
                });
            }
            Ok(())
        }

        fn init(&mut self) -> partner_display_hw::Result<()> {
            self.script.record(Call::Init(self.id));
            Ok(())
        }

        fn mirror(&mut self, request: &MirrorRequest) -> partner_display_hw::Result<()> {
            self.script
                .record(Call::Mirror(self.id, request.text.clone()));
            if self.script.fail_mirror.load(Ordering::SeqCst) {
                return Err(HwError::DeviceUnavailable);
            }
            Ok(())
        }

        fn shutdown(&mut self) -> partner_display_hw::Result<()> {
            self.script.record(Call::Shutdown(self.id));
            if self.script.fail_mirror.load(Ordering::SeqCst) {
                return Err(HwError::DeviceUnavailable);
            }
            Ok(())
        }

        fn close(&mut self) {
            self.script.record(Call::Close(self.id));
        }
    }

    struct ScriptedBackend {
        script: Script,
        hotplug: Mutex<Option<UnboundedReceiver<()>>>,
    }

    impl ScriptedBackend {
        fn new(script: &Script) -> Self {
            Self {
                script: script.clone(),
                hotplug: Mutex::new(None),
            }
        }

        /// Backend whose hotplug stream is fed through the returned sender.
        fn with_hotplug(script: &Script) -> (Self, UnboundedSender<()>) {
            let (tx, rx) = unbounded();
            let backend = Self {
                script: script.clone(),
                hotplug: Mutex::new(Some(rx)),
            };
            (backend, tx)
        }
    }

    impl DisplayBackend for ScriptedBackend {
        fn is_device_connected(&self) -> bool {
            self.script.presence_checks.fetch_add(1, Ordering::SeqCst);
            self.script.connected.load(Ordering::SeqCst)
        }

        fn create_driver(&self) -> Box<dyn DisplayDriver> {
            Box::new(ScriptedDriver {
                id: self.script.drivers.fetch_add(1, Ordering::SeqCst),
                script: self.script.clone(),
            })
        }

        fn watch_hotplug(&self) -> Option<BoxStream<'static, ()>> {
            let events = self.hotplug.lock().unwrap().take()?;
            Some(events.boxed())
        }
    }

    fn settings() -> ManagerSettings {
        ManagerSettings {
            poll: Duration::from_millis(20),
            debounce: Duration::from_millis(100),
            hotplug: false,
            style: MirrorStyle::default(),
        }
    }

    fn manager(
        script: &Script,
        enabled: bool,
    ) -> (PartnerWindowManager, watch::Sender<bool>) {
        let (enabled_tx, enabled_rx) = watch::channel(enabled);
        let manager =
            PartnerWindowManager::new(ScriptedBackend::new(script), settings(), enabled_rx);
        (manager, enabled_tx)
    }

    fn hotplug_manager(
        script: &Script,
        poll: Duration,
    ) -> (PartnerWindowManager, watch::Sender<bool>, UnboundedSender<()>) {
        let (enabled_tx, enabled_rx) = watch::channel(true);
        let (backend, hotplug) = ScriptedBackend::with_hotplug(script);
        let settings = ManagerSettings {
            poll,
            hotplug: true,
            ..settings()
        };
        let manager = PartnerWindowManager::new(backend, settings, enabled_rx);
        (manager, enabled_tx, hotplug)
    }

    async fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enabled_without_device_stays_idle() {
        let script = Script::default();
        let (mut manager, _enabled) = manager(&script, true);
        manager.start().unwrap();
        settle().await;
        assert_eq!(script.count(|c| matches!(c, Call::Init(_))), 0);
        assert!(!*manager.subscribe_active().borrow());
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_device_without_enable_stays_idle() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, false);
        let connected = manager.subscribe_device_connected();
        manager.start().unwrap();
        wait_until("device detected", || *connected.borrow()).await;
        settle().await;
        assert_eq!(script.count(|c| matches!(c, Call::Init(_))), 0);
        assert!(!*manager.subscribe_active().borrow());
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_and_disable_end_to_end() {
        let script = Script::default();
        let (mut manager, enabled) = manager(&script, false);
        let active = manager.subscribe_active();
        manager.start().unwrap();

        script.connected.store(true, Ordering::SeqCst);
        let connected = manager.subscribe_device_connected();
        wait_until("device detected", || *connected.borrow()).await;
        enabled.send_replace(true);
        wait_until("mirroring", || *active.borrow()).await;
        assert_eq!(script.calls()[..2], [Call::Open(0), Call::Init(0)]);

        // Initial empty text is shown as a single space
        wait_until("first frame", || script.mirrors() == [" "]).await;

        manager.update_text("Hello");
        wait_until("hello", || script.mirrors().last().map(String::as_str) == Some("Hello"))
            .await;
        manager.update_text("Hello <break/>there");
        wait_until("there", || {
            script.mirrors().last().map(String::as_str) == Some("Hello there")
        })
        .await;

        enabled.send_replace(false);
        wait_until("idle", || !*active.borrow()).await;
        let mirrors_before = script.mirrors().len();
        manager.update_text("ignored");
        settle().await;
        assert_eq!(script.mirrors().len(), mirrors_before);

        assert_eq!(script.count(|c| matches!(c, Call::Open(_))), 1);
        assert_eq!(script.count(|c| matches!(c, Call::Init(_))), 1);
        assert_eq!(script.count(|c| matches!(c, Call::Shutdown(_))), 1);
        assert_eq!(script.count(|c| matches!(c, Call::Close(_))), 1);
        let calls = script.calls();
        assert_eq!(calls[calls.len() - 2..], [Call::Shutdown(0), Call::Close(0)]);
        manager.stop().await;
        assert_eq!(script.count(|c| matches!(c, Call::Close(_))), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debounce_coalesces_updates() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, true);
        manager.start().unwrap();
        wait_until("first frame", || script.mirrors().len() == 1).await;
        script.clear();

        manager.update_text("a");
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.update_text("ab");
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.update_text("abc");
        settle().await;

        assert_eq!(script.mirrors(), ["abc"]);
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_write_failure_goes_idle() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, true);
        let active = manager.subscribe_active();
        manager.start().unwrap();
        wait_until("mirroring", || *active.borrow()).await;
        wait_until("first frame", || script.mirrors().len() == 1).await;

        script.fail_mirror.store(true, Ordering::SeqCst);
        manager.update_text("unplugged");
        wait_until("idle", || !*active.borrow()).await;
        wait_until("released", || {
            script.count(|c| matches!(c, Call::Close(_))) == 1
        })
        .await;
        assert_eq!(script.count(|c| matches!(c, Call::Shutdown(_))), 1);

        // No new session while enabled and connected stay unchanged
        settle().await;
        assert_eq!(script.count(|c| matches!(c, Call::Open(_))), 1);

        // Replug starts a fresh driver
        script.fail_mirror.store(false, Ordering::SeqCst);
        let connected = manager.subscribe_device_connected();
        script.connected.store(false, Ordering::SeqCst);
        wait_until("unplug seen", || !*connected.borrow()).await;
        script.connected.store(true, Ordering::SeqCst);
        wait_until("mirroring again", || *active.borrow()).await;
        assert!(script.calls().contains(&Call::Init(1)));
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_open_failure_stays_idle() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        script.fail_open.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, true);
        manager.start().unwrap();
        wait_until("open attempt", || {
            script.count(|c| matches!(c, Call::Open(_))) == 1
        })
        .await;
        settle().await;

        assert_eq!(script.calls(), [Call::Open(0), Call::Close(0)]);
        assert!(!*manager.subscribe_active().borrow());
        manager.stop().await;
        assert_eq!(script.count(|c| matches!(c, Call::Close(_))), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_twice() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, true);
        let active = manager.subscribe_active();
        manager.start().unwrap();
        wait_until("mirroring", || *active.borrow()).await;

        manager.stop().await;
        manager.stop().await;
        assert!(!*active.borrow());
        assert_eq!(script.count(|c| matches!(c, Call::Shutdown(_))), 1);
        assert_eq!(script.count(|c| matches!(c, Call::Close(_))), 1);
        manager.update_text("after stop");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hotplug_event_wakes_presence() {
        let script = Script::default();
        let (mut manager, _enabled, hotplug) = hotplug_manager(&script, Duration::from_secs(30));
        let active = manager.subscribe_active();
        manager.start().unwrap();
        wait_until("first presence check", || script.presence_checks.load(Ordering::SeqCst) >= 1).await;
        settle().await;
        assert_eq!(script.presence_checks.load(Ordering::SeqCst), 1);

        script.connected.store(true, Ordering::SeqCst);
        let plugged = Instant::now();
        hotplug.unbounded_send(()).unwrap();
        wait_until("mirroring", || *active.borrow()).await;
        assert!(plugged.elapsed() < Duration::from_secs(2));
        assert!(script.calls().contains(&Call::Init(0)));
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_polling_continues_after_hotplug_ends() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled, hotplug) = hotplug_manager(&script, Duration::from_millis(20));
        let active = manager.subscribe_active();
        manager.start().unwrap();
        wait_until("mirroring", || *active.borrow()).await;

        drop(hotplug);
        settle().await;
        let checks = script.presence_checks.load(Ordering::SeqCst);
        script.connected.store(false, Ordering::SeqCst);
        wait_until("unplug seen", || !*active.borrow()).await;
        assert!(script.presence_checks.load(Ordering::SeqCst) > checks);

        script.connected.store(true, Ordering::SeqCst);
        wait_until("replug seen", || *active.borrow()).await;
        assert_eq!(script.count(|c| matches!(c, Call::Init(_))), 2);
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_long_text_keeps_session() {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        let (mut manager, _enabled) = manager(&script, true);
        let active = manager.subscribe_active();
        manager.start().unwrap();
        wait_until("first frame", || script.mirrors().len() == 1).await;

        manager.update_text("x".repeat(10_000));
        wait_until("long frame", || script.mirrors().len() == 2).await;
        assert_eq!(script.mirrors()[1].len(), partner_display_hw::MAX_TEXT_BYTES);
        assert!(*active.borrow());
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_start_after_stop_fails() {
        let script = Script::default();
        let (mut manager, _enabled) = manager(&script, false);
        manager.start().unwrap();
        manager.start().unwrap();
        manager.stop().await;
        assert!(manager.start().is_err());
    }

    #[test]
    fn test_mirror_style_request() {
        let style = MirrorStyle {
            font: 28,
            color: Rgb::new(1, 2, 3),
            strip_tags: true,
        };
        let request = style.request("<speak>hi</speak>");
        assert_eq!(request.text, "hi");
        assert_eq!((request.x, request.y), (None, None));
        assert_eq!(request.font, 28);
        assert_eq!(request.color, Rgb::new(1, 2, 3));
        assert_eq!(style.request("").text, " ");
    }
}
