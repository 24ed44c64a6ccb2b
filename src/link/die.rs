use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::foundation::config::TransferOpts;
use crate::foundation::core::Rgb8;
use crate::foundation::error::{PixelsError, PixelsResult};
use crate::link::connection::{ConnectionState, LastError};
use crate::link::dispatch::{Dispatcher, Handler, HandlerGuard, Waiter};
use crate::link::transport::Link;
use crate::protocol::messages::{DieInfo, Message, MessageType, RollState};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest status pushed by the die.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DieStatus {
    /// Identity, once [`Die::identify`] succeeded.
    pub info: Option<DieInfo>,
    /// Last reported roll state.
    pub roll_state: RollState,
    /// Last reported face.
    pub face: u8,
}

#[derive(Default)]
struct Telemetry {
    subscribers: usize,
    enabled: bool,
}

#[derive(Default)]
struct LinkErrors {
    count: u64,
    last: Option<String>,
}

/// Host-side context for one die.
///
/// Owns the connection state, the handler table and the exclusive-operation lock. At most one
/// operation runs at a time; later callers queue in arrival order.
pub struct Die {
    name: String,
    link: Arc<dyn Link>,
    opts: TransferOpts,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ConnectionState>,
    last_error: Mutex<LastError>,
    status: Arc<Mutex<DieStatus>>,
    link_errors: Mutex<LinkErrors>,
    telemetry: Mutex<Telemetry>,
    operation: tokio::sync::Mutex<()>,
    _default_handlers: Vec<HandlerGuard>,
}

/// Held for the duration of one exclusive operation.
pub(crate) struct OperationGuard<'a> {
    die: &'a Die,
    name: &'static str,
    link_errors_at_start: u64,
    _lock: tokio::sync::MutexGuard<'a, ()>,
}

impl OperationGuard<'_> {
    /// Release the die, turning a link error reported mid-operation into a failure.
    pub(crate) fn finish<T>(self, result: PixelsResult<T>) -> PixelsResult<T> {
        let errors = lock(&self.die.link_errors);
        if errors.count != self.link_errors_at_start {
            let msg = errors.last.clone().unwrap_or_default();
            tracing::error!(
                die = %self.die.name,
                op = self.name,
                error = %msg,
                "link error during operation"
            );
            if result.is_ok() {
                return Err(PixelsError::Link(msg));
            }
        }
        result
    }
}

/// Live telemetry registration; telemetry is switched off when the last one drops.
///
/// The off request is queued behind any running operation, so it needs a tokio runtime at
/// drop time.
pub struct TelemetrySubscription {
    _guard: HandlerGuard,
    die: Weak<Die>,
}

impl Drop for TelemetrySubscription {
    fn drop(&mut self) {
        let Some(die) = self.die.upgrade() else {
            return;
        };
        {
            let mut t = lock(&die.telemetry);
            t.subscribers = t.subscribers.saturating_sub(1);
            if t.subscribers > 0 {
                return;
            }
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = die.sync_telemetry().await {
                        tracing::warn!(die = %die.name, error = %e, "telemetry left on");
                    }
                });
            }
            Err(_) => tracing::warn!(die = %die.name, "no runtime to switch telemetry off"),
        }
    }
}

impl Die {
    /// Create a context for a die reachable through `link`. The die starts `Invalid`.
    pub fn new(
        name: impl Into<String>,
        link: Arc<dyn Link>,
        opts: TransferOpts,
    ) -> PixelsResult<Self> {
        opts.validate()?;
        let name = name.into();
        let dispatcher = Arc::new(Dispatcher::default());
        let status = Arc::new(Mutex::new(DieStatus::default()));

        let state_handler: Handler = {
            let status = Arc::clone(&status);
            Arc::new(move |m: &Message| {
                if let Message::State { roll_state, face } = *m {
                    let mut s = lock(&status);
                    s.roll_state = roll_state;
                    s.face = face;
                }
            })
        };
        let log_handler: Handler = {
            let name = name.clone();
            Arc::new(move |m: &Message| {
                if let Message::DebugLog { text } = m {
                    tracing::info!(die = %name, "{text}");
                }
            })
        };
        let default_handlers = vec![
            dispatcher.subscribe(MessageType::State, state_handler),
            dispatcher.subscribe(MessageType::DebugLog, log_handler),
        ];

        Ok(Self {
            name,
            link,
            opts,
            dispatcher,
            state: Mutex::new(ConnectionState::Invalid),
            last_error: Mutex::new(LastError::None),
            status,
            link_errors: Mutex::new(LinkErrors::default()),
            telemetry: Mutex::new(Telemetry::default()),
            operation: tokio::sync::Mutex::new(()),
            _default_handlers: default_handlers,
        })
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options this die was created with.
    pub fn opts(&self) -> &TransferOpts {
        &self.opts
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Reason the die last fell back to `Available`.
    pub fn last_error(&self) -> LastError {
        *lock(&self.last_error)
    }

    /// Latest status pushed by the die.
    pub fn status(&self) -> DieStatus {
        *lock(&self.status)
    }

    /// Most recent transport-level failure, if any.
    pub fn last_link_error(&self) -> Option<String> {
        lock(&self.link_errors).last.clone()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn set_connection_state(&self, next: ConnectionState) -> PixelsResult<()> {
        let mut s = lock(&self.state);
        if !s.can_transition_to(next) {
            return Err(PixelsError::validation(format!(
                "illegal connection transition {:?} -> {next:?}",
                *s
            )));
        }
        tracing::debug!(die = %self.name, from = ?*s, to = ?next, "connection state");
        if next == ConnectionState::Available {
            let reason = match *s {
                ConnectionState::Connecting | ConnectionState::Identifying => {
                    LastError::ConnectionError
                }
                ConnectionState::Ready => LastError::Disconnected,
                _ => LastError::None,
            };
            *lock(&self.last_error) = reason;
        }
        *s = next;
        Ok(())
    }

    /// Record a transport failure reported outside of a `send` call.
    pub fn report_link_error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!(die = %self.name, error = %msg, "link error");
        let mut e = lock(&self.link_errors);
        e.count += 1;
        e.last = Some(msg);
    }

    /// Decode one inbound packet and hand it to every handler of its type.
    pub fn on_data(&self, packet: &[u8]) {
        match Message::decode(packet) {
            Ok(msg) => {
                if self.dispatcher.dispatch(&msg) == 0 {
                    tracing::debug!(die = %self.name, kind = ?msg.kind(), "unhandled message");
                }
            }
            Err(e) => tracing::warn!(die = %self.name, error = %e, "dropping inbound packet"),
        }
    }

    /// Feed packets from `rx` into [`Die::on_data`] until the channel closes.
    pub async fn run_inbound(&self, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(packet) = rx.recv().await {
            self.on_data(&packet);
        }
    }

    /// Register a long-lived handler; it stays until the guard drops.
    pub fn subscribe(
        &self,
        kind: MessageType,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> HandlerGuard {
        self.dispatcher.subscribe(kind, Arc::new(handler))
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: MessageType) -> usize {
        self.dispatcher.handler_count(kind)
    }

    fn require_connected(&self) -> PixelsResult<()> {
        let state = self.state();
        if state.accepts_operations() {
            Ok(())
        } else {
            Err(PixelsError::NotConnected { state })
        }
    }

    /// Wait for exclusive use of the die.
    pub(crate) async fn begin_operation(
        &self,
        name: &'static str,
    ) -> PixelsResult<OperationGuard<'_>> {
        self.require_connected()?;
        let lock_guard = self.operation.lock().await;
        // The die may have disconnected while we queued.
        self.require_connected()?;
        tracing::trace!(die = %self.name, op = name, "operation start");
        Ok(OperationGuard {
            die: self,
            name,
            link_errors_at_start: lock(&self.link_errors).count,
            _lock: lock_guard,
        })
    }

    /// Send without waiting for anything.
    pub(crate) fn post(&self, msg: &Message) -> PixelsResult<()> {
        tracing::trace!(die = %self.name, kind = ?msg.kind(), "send");
        self.link.send(&msg.encode()).inspect_err(|e| {
            self.report_link_error(e.to_string());
        })
    }

    pub(crate) fn expect(&self, kind: MessageType) -> Waiter {
        self.dispatcher.expect(kind)
    }

    /// One send, one wait window. `None` when the window closes without a matching reply.
    pub(crate) async fn send_with_ack_or_timeout(
        &self,
        msg: &Message,
        ack: MessageType,
        timeout: Duration,
        matches: impl Fn(&Message) -> bool,
    ) -> PixelsResult<Option<Message>> {
        let mut waiter = self.expect(ack);
        self.post(msg)?;
        Ok(waiter
            .next_matching(Some(Instant::now() + timeout), matches)
            .await)
    }

    /// Like [`Die::send_with_ack_or_timeout`] but a timeout is an error.
    pub(crate) async fn request(
        &self,
        msg: &Message,
        ack: MessageType,
        timeout: Duration,
    ) -> PixelsResult<Message> {
        self.send_with_ack_or_timeout(msg, ack, timeout, |_| true)
            .await?
            .ok_or(PixelsError::ProtocolTimeout {
                awaiting: ack,
                timeout,
            })
    }

    /// Resend `msg` until a matching `ack` arrives, up to `max_attempts` windows of
    /// `ack_timeout` each.
    pub(crate) async fn send_with_ack_retry(
        &self,
        msg: &Message,
        ack: MessageType,
        matches: impl Fn(&Message) -> bool,
    ) -> PixelsResult<Message> {
        let attempts = self.opts.max_attempts;
        for attempt in 1..=attempts {
            if let Some(reply) = self
                .send_with_ack_or_timeout(msg, ack, self.opts.ack_timeout(), &matches)
                .await?
            {
                return Ok(reply);
            }
            tracing::warn!(
                die = %self.name,
                kind = ?msg.kind(),
                awaiting = ?ack,
                attempt,
                attempts,
                "no ack"
            );
        }
        Err(PixelsError::RetriesExhausted {
            awaiting: ack,
            attempts,
        })
    }

    /// Ask the die who it is and move `Identifying → Ready` on success.
    #[tracing::instrument(skip(self), fields(die = %self.name))]
    pub async fn identify(&self) -> PixelsResult<DieInfo> {
        let op = self.begin_operation("identify").await?;
        let result = match self
            .request(
                &Message::WhoAreYou,
                MessageType::IAmADie,
                self.opts.query_timeout(),
            )
            .await
        {
            Ok(Message::IAmADie(info)) => {
                lock(&self.status).info = Some(info);
                if self.state() == ConnectionState::Identifying {
                    self.set_connection_state(ConnectionState::Ready).map(|()| info)
                } else {
                    Ok(info)
                }
            }
            Ok(other) => Err(PixelsError::decode(format!("unexpected reply {other:?}"))),
            Err(e) => Err(e),
        };
        op.finish(result)
    }

    /// Start playing dataset animation `index`, remapped onto `remap_face`.
    pub async fn play_animation(
        &self,
        index: u8,
        remap_face: u8,
        loop_count: u8,
    ) -> PixelsResult<()> {
        let op = self.begin_operation("play_animation").await?;
        let result = self.post(&Message::PlayAnim {
            index,
            remap_face,
            loop_count,
        });
        op.finish(result)
    }

    /// Stop dataset animation `index` on `remap_face`.
    pub async fn stop_animation(&self, index: u8, remap_face: u8) -> PixelsResult<()> {
        let op = self.begin_operation("stop_animation").await?;
        let result = self.post(&Message::StopAnim { index, remap_face });
        op.finish(result)
    }

    /// Ask for the current roll state; the reply also updates [`Die::status`].
    pub async fn request_state(&self) -> PixelsResult<(RollState, u8)> {
        let op = self.begin_operation("request_state").await?;
        let result = match self
            .send_with_ack_retry(&Message::RequestState, MessageType::State, |_| true)
            .await
        {
            Ok(Message::State { roll_state, face }) => Ok((roll_state, face)),
            Ok(other) => Err(PixelsError::decode(format!("unexpected reply {other:?}"))),
            Err(e) => Err(e),
        };
        op.finish(result)
    }

    /// Blink every LED `count` times and wait for the die to finish.
    pub async fn flash(&self, count: u8, color: Rgb8) -> PixelsResult<()> {
        let op = self.begin_operation("flash").await?;
        let result = self
            .request(
                &Message::Flash {
                    count,
                    color: color.to_u32(),
                },
                MessageType::FlashFinished,
                self.opts.query_timeout(),
            )
            .await
            .map(|_| ());
        op.finish(result)
    }

    /// Light every LED with one color.
    pub async fn set_all_leds_to_color(&self, color: Rgb8) -> PixelsResult<()> {
        let op = self.begin_operation("set_all_leds_to_color").await?;
        let result = self.post(&Message::SetAllLEDsToColor {
            color: color.to_u32(),
        });
        op.finish(result)
    }

    /// Battery charge in `[0, 1]`.
    pub async fn get_battery_level(&self) -> PixelsResult<f32> {
        let op = self.begin_operation("get_battery_level").await?;
        let result = match self
            .request(
                &Message::RequestBatteryLevel,
                MessageType::BatteryLevel,
                self.opts.query_timeout(),
            )
            .await
        {
            Ok(Message::BatteryLevel { level }) => Ok(level),
            Ok(other) => Err(PixelsError::decode(format!("unexpected reply {other:?}"))),
            Err(e) => Err(e),
        };
        op.finish(result)
    }

    /// Signal strength seen by the die, in dBm.
    pub async fn get_rssi(&self) -> PixelsResult<i16> {
        let op = self.begin_operation("get_rssi").await?;
        let result = match self
            .request(
                &Message::RequestRssi,
                MessageType::Rssi,
                self.opts.query_timeout(),
            )
            .await
        {
            Ok(Message::Rssi { rssi }) => Ok(rssi),
            Ok(other) => Err(PixelsError::decode(format!("unexpected reply {other:?}"))),
            Err(e) => Err(e),
        };
        op.finish(result)
    }

    /// Receive telemetry frames. The first subscriber turns telemetry on, the last one to drop
    /// turns it off.
    pub async fn subscribe_telemetry(
        self: &Arc<Self>,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> PixelsResult<TelemetrySubscription> {
        self.require_connected()?;
        let sub = TelemetrySubscription {
            _guard: self.subscribe(MessageType::Telemetry, handler),
            die: Arc::downgrade(self),
        };
        lock(&self.telemetry).subscribers += 1;
        // On failure the subscription drops and the count is restored.
        self.sync_telemetry().await?;
        Ok(sub)
    }

    /// Bring the die's telemetry switch in line with the subscriber count.
    async fn sync_telemetry(&self) -> PixelsResult<()> {
        let op = self.begin_operation("telemetry").await?;
        let (want, enabled) = {
            let t = lock(&self.telemetry);
            (t.subscribers > 0, t.enabled)
        };
        let result = if want == enabled {
            Ok(())
        } else {
            self.post(&Message::RequestTelemetry { on: want })
                .map(|()| lock(&self.telemetry).enabled = want)
        };
        op.finish(result)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/link/die.rs"]
mod tests;
