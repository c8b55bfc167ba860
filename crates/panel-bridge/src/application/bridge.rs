//! The message bridge.
//!
//! One [`Bridge`] lives for the lifetime of one panel.  It owns the listener
//! registry, the trust state (which remote it talks to), the readiness flag,
//! and the subscription to its transport.
//!
//! # Inbound pipeline
//!
//! ```text
//! raw message ─► destroyed? ─► origin allowed? ─► tagged envelope? ─► pin remote ─► dispatch
//!                   drop           drop               drop           (first time)
//! ```
//!
//! Every gate drops silently.  An untrusted sender learns nothing about the
//! protocol from our behaviour.
//!
//! # Dispatch
//!
//! All listeners registered for the envelope's action run in registration
//! order.  A listener that returns an error or panics is contained: it is
//! logged, answered with an error response when the message carried a
//! `requestId`, and the next listener still runs.  Deferred results are
//! spawned onto the Tokio runtime, so a slow listener never delays the next
//! message; their responses may therefore be sent out of order.
//!
//! # Locking
//!
//! The registry and trust state sit behind `std::sync::Mutex`es that are only
//! held for the duration of a lookup or an update, never while a listener runs
//! or across an `.await`.  Listeners may call `on`, `off`, `send` or even
//! `destroy` on the bridge that is invoking them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::FutureExt;
use panel_core::protocol::actions::{
    decode_payload, AiRequestPayload, ExportCompletePayload, FormPayload, FormStepPayload,
    ReadyPayload,
};
use panel_core::protocol::{now_millis, RequestIdGenerator};
use panel_core::{
    classify_inbound, Envelope, HostCommand, Inbound, Origin, PanelEvent, RequestId,
    ResponsePayload,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::application::listener::{
    DeferredResult, ListenerError, ListenerId, ListenerRegistry, ListenerResult,
};
use crate::application::transport::{
    ChannelSubscription, InboundHandler, InboundMessage, Transport, TransportError,
};
use crate::domain::BridgeOptions;

/// Handle to a bridge instance.  Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    options: BridgeOptions,
    transport: Arc<dyn Transport>,
    request_ids: RequestIdGenerator,
    listeners: Mutex<ListenerRegistry>,
    /// Remote pinned by the first valid inbound message.
    parent_origin: Mutex<Option<Origin>>,
    ready: AtomicBool,
    destroyed: AtomicBool,
    subscription: Mutex<Option<ChannelSubscription>>,
    ready_timer: Mutex<Option<JoinHandle<()>>>,
}

/// Returned by [`Bridge::on`]; removes that one registration.
#[derive(Debug, Clone)]
pub struct Subscription {
    bridge: Weak<BridgeInner>,
    action: String,
    id: ListenerId,
}

impl Subscription {
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Equivalent to `bridge.off(action, id)`.  Returns `false` if the
    /// listener was already gone or the bridge has been dropped.
    pub fn unsubscribe(&self) -> bool {
        match self.bridge.upgrade() {
            Some(inner) => lock(&inner.listeners).remove(&self.action, self.id),
            None => false,
        }
    }
}

impl Bridge {
    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Creates a bridge, subscribes it to `transport`, and schedules the ready
    /// signal after `options.ready_delay`.
    ///
    /// The ready timer needs a Tokio runtime.  Outside one, the bridge still
    /// works but `signal_ready` must be called by hand.
    pub fn create(options: BridgeOptions, transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(BridgeInner {
            request_ids: RequestIdGenerator::new(options.request_ids),
            options,
            transport,
            listeners: Mutex::new(ListenerRegistry::new()),
            parent_origin: Mutex::new(None),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            subscription: Mutex::new(None),
            ready_timer: Mutex::new(None),
        });
        let bridge = Self { inner };
        bridge.init();
        bridge
    }

    fn init(&self) {
        // The transport holds the handler, so the handler must not keep the
        // bridge alive.
        let weak = Arc::downgrade(&self.inner);
        let handler: InboundHandler = Arc::new(move |message| {
            if let Some(inner) = weak.upgrade() {
                Bridge { inner }.receive(message);
            }
        });
        let subscription = self.inner.transport.on_message(handler);
        *lock(&self.inner.subscription) = Some(subscription);

        match Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(&self.inner);
                let delay = self.inner.options.ready_delay;
                let timer = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = weak.upgrade() {
                        Bridge { inner }.signal_ready();
                    }
                });
                *lock(&self.inner.ready_timer) = Some(timer);
            }
            Err(_) => warn!("no Tokio runtime: panel:ready will not be sent automatically"),
        }

        self.log("bridge initialized");
    }

    /// Emits `panel:ready` once.  Later calls are no-ops until `destroy`.
    pub fn signal_ready(&self) {
        if self.inner.ready.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emit(PanelEvent::Ready(ReadyPayload {
            timestamp: now_millis(),
        }));
        self.log("panel ready");
    }

    /// Tears the bridge down: unsubscribes from the transport, cancels a
    /// pending ready timer, clears all listeners and resets readiness.
    ///
    /// Inbound traffic is dropped from here on.  Calling it again is a no-op.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscription = lock(&self.inner.subscription).take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        let timer = lock(&self.inner.ready_timer).take();
        if let Some(timer) = timer {
            timer.abort();
        }
        lock(&self.inner.listeners).clear();
        self.inner.ready.store(false, Ordering::SeqCst);

        self.log("bridge destroyed");
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Processes one raw message from the channel.
    ///
    /// Called by the transport subscription; public so embedders with their
    /// own delivery loop can feed messages directly.
    pub fn receive(&self, message: InboundMessage) {
        let inner = &self.inner;

        if inner.destroyed.load(Ordering::SeqCst) {
            return;
        }

        if !inner.options.origin.allows(&message.source) {
            if inner.options.debug {
                debug!(source = %message.source, "ignored message from unauthorized origin");
            }
            return;
        }

        let envelope = match classify_inbound(&message.data) {
            Inbound::Protocol(envelope) => envelope,
            Inbound::Foreign => return,
            Inbound::Malformed(e) => {
                if inner.options.debug {
                    debug!(source = %message.source, "ignored malformed envelope: {e}");
                }
                return;
            }
        };

        {
            let mut parent = lock(&inner.parent_origin);
            if parent.is_none() {
                let pinned = message
                    .source
                    .parse()
                    .unwrap_or_else(|_| Origin::Exact(message.source.clone()));
                *parent = Some(pinned);
            }
        }

        self.trace_message("received", &envelope);
        self.dispatch(&envelope);
    }

    fn dispatch(&self, envelope: &Envelope) {
        let listeners = lock(&self.inner.listeners).snapshot(&envelope.action);
        let request_id = envelope.request_id.as_deref();

        for listener in listeners {
            // A listener may tear the bridge down mid fan-out.
            if self.is_destroyed() {
                break;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                listener(&envelope.data, request_id)
            }))
            .unwrap_or_else(|payload| Err(ListenerError::from_panic(payload)));

            match outcome {
                Ok(ListenerResult::Immediate(Some(value))) => {
                    if let Some(id) = request_id {
                        self.respond(id, Some(value));
                    }
                }
                Ok(ListenerResult::Immediate(None)) => {}
                Ok(ListenerResult::Deferred(future)) => {
                    self.await_deferred(&envelope.action, request_id, future);
                }
                Err(e) => {
                    error!(action = %envelope.action, "bridge listener failed: {e}");
                    if let Some(id) = request_id {
                        self.respond_error(id, e.message());
                    }
                }
            }
        }
    }

    /// Spawns the deferred result and answers when it settles.
    fn await_deferred(&self, action: &str, request_id: Option<&str>, future: DeferredResult) {
        let request_id = request_id.map(str::to_string);

        let Ok(handle) = Handle::try_current() else {
            error!(action, "deferred listener result needs a Tokio runtime");
            if let Some(id) = request_id {
                self.respond_error(&id, "deferred result could not be awaited");
            }
            return;
        };

        let bridge = self.clone();
        let action = action.to_string();
        handle.spawn(async move {
            let outcome = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ListenerError::from_panic(payload)));

            match (outcome, request_id) {
                (Ok(value), Some(id)) => bridge.respond(&id, value),
                (Ok(_), None) => {}
                (Err(e), request_id) => {
                    error!(%action, "deferred bridge listener failed: {e}");
                    if let Some(id) = request_id {
                        bridge.respond_error(&id, e.message());
                    }
                }
            }
        });
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Sends a fire-and-forget event to the remote.
    ///
    /// With no remote attached this is a no-op (logged in debug mode).  Other
    /// transport failures are logged and contained.
    pub fn send(&self, action: &str, data: Value) {
        self.post(Envelope::new(action, data));
    }

    /// Sends `action` with a freshly generated `requestId` and returns the id.
    ///
    /// The bridge does not track the request: matching the eventual response
    /// is the caller's job (see [`crate::application::PendingRequests`]).
    pub fn send_request(&self, action: &str, data: Value) -> RequestId {
        let id = self.inner.request_ids.next(request_prefix(action));
        self.post(Envelope::new(action, data).with_request_id(id.clone()));
        id
    }

    /// Sends a typed panel event.
    pub fn emit(&self, event: PanelEvent) {
        let (action, data) = event.into_parts();
        self.send(action, data);
    }

    /// Sends a success response for `request_id`.
    pub fn respond(&self, request_id: &str, data: Option<Value>) {
        self.post(Envelope::response(&ResponsePayload::success(request_id, data)));
    }

    /// Sends an error response for `request_id`.
    pub fn respond_error(&self, request_id: &str, error: &str) {
        self.post(Envelope::response(&ResponsePayload::failure(request_id, error)));
    }

    /// The identity outbound messages are currently addressed to.
    pub fn target(&self) -> Origin {
        lock(&self.inner.parent_origin)
            .clone()
            .unwrap_or_else(|| self.inner.options.default_target().clone())
    }

    fn post(&self, envelope: Envelope) {
        let target = self.target();
        match self.inner.transport.post_message(&envelope, &target) {
            Ok(()) => self.trace_message("sent", &envelope),
            Err(TransportError::NoRemote) => {
                if self.inner.options.debug {
                    debug!(action = %envelope.action, "no remote endpoint; message not sent");
                }
            }
            Err(e) => warn!(action = %envelope.action, "failed to send bridge message: {e}"),
        }
    }

    // ── Request helpers ───────────────────────────────────────────────────────

    /// Asks the host to run `prompt` through its assistant.  Returns the
    /// request id, which is carried both on the envelope and in the payload.
    pub fn request_ai(&self, prompt: &str, context: Value) -> RequestId {
        let id = self.inner.request_ids.next("ai");
        let (action, data) = PanelEvent::AiRequest(AiRequestPayload {
            request_id: id.clone(),
            prompt: prompt.to_string(),
            context,
        })
        .into_parts();
        self.post(Envelope::new(action, data).with_request_id(id.clone()));
        id
    }

    /// Asks the host to persist `data`.
    pub fn request_save(&self, data: Value) {
        self.emit(PanelEvent::SaveRequest(data));
    }

    /// Tells the host an export finished.
    pub fn notify_export_complete(&self, filename: &str, size: u64, mime_type: &str) {
        self.emit(PanelEvent::ExportComplete(ExportCompletePayload {
            filename: filename.to_string(),
            size,
            mime_type: mime_type.to_string(),
        }));
    }

    /// Pushes updated artifact data to the host.
    pub fn update_artifact(&self, data: Value) {
        self.emit(PanelEvent::ArtifactUpdate(data));
    }

    /// Submits form values.  `action` is the form button that was used.
    pub fn submit_form(&self, form_id: &str, action: &str, values: Value) {
        self.emit(PanelEvent::FormSubmit(FormPayload {
            form_id: form_id.to_string(),
            action: action.to_string(),
            values,
            timestamp: now_millis(),
        }));
    }

    /// Cancels a form, passing along whatever had been entered.
    pub fn cancel_form(&self, form_id: &str, values: Value) {
        self.emit(PanelEvent::FormCancel(FormPayload {
            form_id: form_id.to_string(),
            action: "cancel".to_string(),
            values,
            timestamp: now_millis(),
        }));
    }

    /// Reports a wizard step change.
    pub fn form_step_change(&self, form_id: &str, step: u32, values: Value) {
        self.emit(PanelEvent::FormStep(FormStepPayload {
            form_id: form_id.to_string(),
            step,
            values,
            timestamp: now_millis(),
        }));
    }

    // ── Subscription ──────────────────────────────────────────────────────────

    /// Registers `listener` for `action`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use panel_bridge::application::{Bridge, ListenerResult, Standalone};
    /// use panel_bridge::domain::BridgeOptions;
    ///
    /// let bridge = Bridge::create(BridgeOptions::default(), Arc::new(Standalone));
    /// let sub = bridge.on("ping", |_data, _request_id| Ok(ListenerResult::none()));
    /// assert_eq!(bridge.listener_count("ping"), 1);
    /// assert!(sub.unsubscribe());
    /// assert_eq!(bridge.listener_count("ping"), 0);
    /// ```
    pub fn on<F>(&self, action: &str, listener: F) -> Subscription
    where
        F: Fn(&Value, Option<&str>) -> Result<ListenerResult, ListenerError>
            + Send
            + Sync
            + 'static,
    {
        let id = lock(&self.inner.listeners).insert(action, Arc::new(listener));
        Subscription {
            bridge: Arc::downgrade(&self.inner),
            action: action.to_string(),
            id,
        }
    }

    /// Registers a listener whose payload is decoded into `T` first.
    ///
    /// A payload that does not match `T` counts as a listener failure.
    pub fn on_typed<T, F>(&self, action: &str, listener: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, Option<&str>) -> Result<ListenerResult, ListenerError> + Send + Sync + 'static,
    {
        let name = action.to_string();
        self.on(action, move |data, request_id| {
            let payload = decode_payload::<T>(&name, data)?;
            listener(payload, request_id)
        })
    }

    /// Registers one listener for every [`HostCommand`] action.
    pub fn on_command<F>(&self, listener: F) -> Vec<Subscription>
    where
        F: Fn(HostCommand, Option<&str>) -> Result<ListenerResult, ListenerError>
            + Send
            + Sync
            + 'static,
    {
        let listener = Arc::new(listener);
        HostCommand::ACTIONS
            .iter()
            .map(|&action| {
                let listener = Arc::clone(&listener);
                self.on(action, move |data, request_id| {
                    match HostCommand::parse(action, data)? {
                        Some(command) => listener(command, request_id),
                        None => Ok(ListenerResult::none()),
                    }
                })
            })
            .collect()
    }

    /// Removes one registration.  Unknown registrations are a no-op.
    pub fn off(&self, action: &str, id: ListenerId) -> bool {
        lock(&self.inner.listeners).remove(action, id)
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// The remote pinned by first contact, if any.
    pub fn parent_origin(&self) -> Option<Origin> {
        lock(&self.inner.parent_origin).clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, action: &str) -> usize {
        lock(&self.inner.listeners).count(action)
    }

    // ── Logging ───────────────────────────────────────────────────────────────

    fn log(&self, event: &str) {
        if self.inner.options.debug {
            debug!("[panel bridge] {event}");
        }
    }

    fn trace_message(&self, direction: &str, envelope: &Envelope) {
        if self.inner.options.debug {
            debug!(
                direction,
                action = %envelope.action,
                request_id = ?envelope.request_id,
                data = %envelope.data,
                "[panel bridge] message"
            );
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("options", &self.inner.options)
            .field("parent_origin", &self.parent_origin())
            .field("ready", &self.is_ready())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// `"ai:request"` → `"ai"`, `"refresh"` → `"refresh"`.
fn request_prefix(action: &str) -> &str {
    action
        .split(':')
        .next()
        .filter(|p| !p.is_empty())
        .unwrap_or("req")
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::MockTransport;
    use serde_json::json;
    use std::time::Duration;

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Records every posted envelope and lets the test inject inbound traffic.
    #[derive(Default)]
    struct RecordingTransport {
        posted: Mutex<Vec<(Envelope, Origin)>>,
        handlers: Mutex<Vec<InboundHandler>>,
    }

    impl RecordingTransport {
        fn deliver(&self, source: &str, data: Value) {
            let handlers = self.handlers.lock().unwrap().clone();
            for h in handlers {
                h(InboundMessage::new(source, data.clone()));
            }
        }

        fn posted(&self) -> Vec<(Envelope, Origin)> {
            self.posted.lock().unwrap().clone()
        }

        fn actions(&self) -> Vec<String> {
            self.posted().into_iter().map(|(e, _)| e.action).collect()
        }
    }

    impl Transport for RecordingTransport {
        fn post_message(&self, envelope: &Envelope, target: &Origin) -> Result<(), TransportError> {
            self.posted
                .lock()
                .unwrap()
                .push((envelope.clone(), target.clone()));
            Ok(())
        }

        fn on_message(&self, handler: InboundHandler) -> ChannelSubscription {
            self.handlers.lock().unwrap().push(handler);
            ChannelSubscription::noop()
        }
    }

    /// Options with the automatic ready signal pushed far into the future.
    fn quiet() -> BridgeOptions {
        BridgeOptions::default().with_ready_delay(Duration::from_secs(3600))
    }

    fn envelope(action: &str, data: Value, request_id: Option<&str>) -> Value {
        let mut env = json!({"type": "artifactuse", "action": action, "data": data, "timestamp": 1});
        if let Some(id) = request_id {
            env["requestId"] = json!(id);
        }
        env
    }

    fn setup(options: BridgeOptions) -> (Bridge, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let bridge = Bridge::create(options, transport.clone());
        (bridge, transport)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_contact_pins_the_remote() {
        // Arrange
        let (bridge, transport) = setup(quiet());
        assert_eq!(bridge.target(), Origin::Any);

        // Act
        transport.deliver("https://host.example", envelope("noop", json!({}), None));
        transport.deliver("https://other.example", envelope("noop", json!({}), None));
        bridge.send("hello", json!({}));

        // Assert
        let pinned: Origin = "https://host.example".parse().unwrap();
        assert_eq!(bridge.parent_origin(), Some(pinned.clone()));
        assert_eq!(transport.posted()[0].1, pinned);
    }

    #[tokio::test]
    async fn test_foreign_traffic_does_not_pin_the_remote() {
        let (bridge, transport) = setup(quiet());

        transport.deliver("https://devtools.example", json!({"source": "react-devtools"}));

        assert_eq!(bridge.parent_origin(), None);
    }

    #[tokio::test]
    async fn test_rejected_origin_does_not_pin_the_remote() {
        let origin: Origin = "https://host.example".parse().unwrap();
        let (bridge, transport) = setup(quiet().with_origin(origin.clone()));

        transport.deliver("https://evil.example", envelope("noop", json!({}), None));

        assert_eq!(bridge.parent_origin(), None);
        // Until first contact, sends go to the configured origin.
        assert_eq!(bridge.target(), origin);
    }

    #[tokio::test]
    async fn test_immediate_none_sends_no_response() {
        let (bridge, transport) = setup(quiet());
        bridge.on("noop", |_, _| Ok(ListenerResult::none()));

        transport.deliver("https://h", envelope("noop", json!({}), Some("r1")));

        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_value_without_request_id_sends_no_response() {
        let (bridge, transport) = setup(quiet());
        bridge.on("calc", |_, _| Ok(ListenerResult::value(json!(3))));

        transport.deliver("https://h", envelope("calc", json!({}), None));

        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_listener_becomes_error_response() {
        // Arrange
        let (bridge, transport) = setup(quiet());
        bridge.on("explode", |_, _| panic!("kaboom"));

        // Act
        transport.deliver("https://h", envelope("explode", json!({}), Some("r7")));

        // Assert
        let posted = transport.posted();
        assert_eq!(posted.len(), 1);
        let payload = posted[0].0.response_payload().unwrap();
        assert_eq!(payload, ResponsePayload::failure("r7", "kaboom"));
    }

    #[tokio::test]
    async fn test_listener_can_unsubscribe_itself_during_dispatch() {
        let (bridge, transport) = setup(quiet());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let sub = bridge.on("once", move |_, _| {
            if let Some(sub) = s.lock().unwrap().take() {
                sub.unsubscribe();
            }
            Ok(ListenerResult::none())
        });
        *slot.lock().unwrap() = Some(sub);

        transport.deliver("https://h", envelope("once", json!({}), None));

        assert_eq!(bridge.listener_count("once"), 0);
    }

    #[tokio::test]
    async fn test_destroy_inside_listener_stops_fan_out() {
        let (bridge, transport) = setup(quiet());
        let b = bridge.clone();
        bridge.on("close", move |_, _| {
            b.destroy();
            Ok(ListenerResult::none())
        });
        bridge.on("close", |_, _| Ok(ListenerResult::value(json!("late"))));

        transport.deliver("https://h", envelope("close", json!({}), Some("r1")));

        assert!(bridge.is_destroyed());
        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_on_typed_rejects_mismatched_payload() {
        #[derive(serde::Deserialize)]
        struct Resize {
            width: u32,
        }

        let (bridge, transport) = setup(quiet());
        bridge.on_typed("resize", |r: Resize, _| Ok(ListenerResult::value(json!(r.width * 2))));

        transport.deliver("https://h", envelope("resize", json!({"width": 21}), Some("ok")));
        transport.deliver("https://h", envelope("resize", json!({"width": "wide"}), Some("bad")));

        let posted = transport.posted();
        assert_eq!(
            posted[0].0.response_payload().unwrap(),
            ResponsePayload::success("ok", Some(json!(42)))
        );
        let failure = posted[1].0.response_payload().unwrap();
        assert!(!failure.success);
        assert!(failure.error.unwrap().contains("resize"));
    }

    #[tokio::test]
    async fn test_on_command_receives_typed_host_commands() {
        let (bridge, transport) = setup(quiet());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let subs = bridge.on_command(move |cmd, _| {
            s.lock().unwrap().push(cmd);
            Ok(ListenerResult::none())
        });
        assert_eq!(subs.len(), HostCommand::ACTIONS.len());

        transport.deliver("https://h", envelope("setCode", json!({"code": "<App/>"}), None));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![HostCommand::SetCode { code: "<App/>".into() }]
        );
    }

    #[tokio::test]
    async fn test_send_request_attaches_prefixed_id() {
        let (bridge, transport) = setup(quiet());

        let id = bridge.send_request("export:pdf", json!({}));

        assert!(id.starts_with("export-"));
        assert_eq!(transport.posted()[0].0.request_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_request_ai_carries_id_on_envelope_and_payload() {
        let (bridge, transport) = setup(quiet());

        let id = bridge.request_ai("summarize", json!({"lines": 10}));

        let (env, _) = &transport.posted()[0];
        assert_eq!(env.action, "ai:request");
        assert_eq!(env.request_id.as_deref(), Some(id.as_str()));
        assert_eq!(env.data["requestId"], json!(id));
        assert_eq!(env.data["prompt"], "summarize");
        assert_eq!(env.data["context"], json!({"lines": 10}));
    }

    #[tokio::test]
    async fn test_helpers_use_fixed_action_names() {
        let (bridge, transport) = setup(quiet());

        bridge.request_save(json!({"doc": 1}));
        bridge.notify_export_complete("out.png", 10, "image/png");
        bridge.update_artifact(json!({"v": 2}));
        bridge.submit_form("f", "submit", json!({}));
        bridge.cancel_form("f", json!({}));
        bridge.form_step_change("f", 1, json!({}));

        assert_eq!(
            transport.actions(),
            vec![
                "save:request",
                "export:complete",
                "artifact:update",
                "form:submit",
                "form:cancel",
                "form:step"
            ]
        );
        let cancel = &transport.posted()[4].0;
        assert_eq!(cancel.data["action"], "cancel");
        assert_eq!(cancel.data["formId"], "f");
    }

    #[tokio::test]
    async fn test_ready_timer_is_cancelled_by_destroy() {
        let (bridge, transport) =
            setup(BridgeOptions::default().with_ready_delay(Duration::from_millis(20)));

        bridge.destroy();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(transport.posted().is_empty());
        assert!(!bridge.is_ready());
    }

    #[test]
    fn test_bridge_without_runtime_can_still_signal_ready() {
        let transport = Arc::new(RecordingTransport::default());
        let bridge = Bridge::create(BridgeOptions::default(), transport.clone());

        bridge.signal_ready();

        assert_eq!(transport.actions(), vec!["panel:ready"]);
    }

    #[tokio::test]
    async fn test_no_remote_is_a_silent_noop() {
        // Arrange: a transport that always reports no counterpart.
        let mut mock = MockTransport::new();
        mock.expect_on_message()
            .times(1)
            .returning(|_| ChannelSubscription::noop());
        mock.expect_post_message()
            .times(2)
            .returning(|_, _| Err(TransportError::NoRemote));
        let bridge = Bridge::create(quiet().with_debug(true), Arc::new(mock));

        // Act / Assert: neither call panics or surfaces an error.
        bridge.send("artifact:update", json!({}));
        bridge.signal_ready();
        assert!(bridge.is_ready());
    }

    #[tokio::test]
    async fn test_sends_before_first_contact_target_configured_origin() {
        let mut mock = MockTransport::new();
        mock.expect_on_message()
            .returning(|_| ChannelSubscription::noop());
        mock.expect_post_message()
            .withf(|env, target| {
                env.action == "artifact:update" && target.as_str() == "https://host.example"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let origin: Origin = "https://host.example".parse().unwrap();

        let bridge = Bridge::create(quiet().with_origin(origin), Arc::new(mock));

        bridge.update_artifact(json!({"rows": 3}));
    }

    #[test]
    fn test_request_prefix_takes_namespace_of_action() {
        assert_eq!(request_prefix("ai:request"), "ai");
        assert_eq!(request_prefix("refresh"), "refresh");
        assert_eq!(request_prefix(":odd"), "req");
    }
}
