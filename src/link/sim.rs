//! Scripted in-process die.
//!
//! [`SimulatedDie`] implements [`Link`] by decoding each host packet, reacting the way firmware
//! would and pushing the replies onto an unbounded channel that feeds [`Die::on_data`]. Ack loss,
//! memory limits and a silent peer are scripted through [`SimConfig`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::encode::fingerprint::content_hash;
use crate::foundation::config::TransferOpts;
use crate::foundation::error::{PixelsError, PixelsResult};
use crate::link::connection::ConnectionState;
use crate::link::die::Die;
use crate::link::transport::Link;
use crate::protocol::messages::{
    AnimSetHeader, DieInfo, Message, MessageType, RollState, TestAnimAck, TestAnimSetHeader,
};

/// Behavior script for a [`SimulatedDie`].
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Identity returned to `WhoAreYou`; `data_set_hash` is replaced by the stored dataset's hash.
    pub info: DieInfo,
    /// Bytes available for a dataset or preview.
    pub memory: usize,
    /// Number of `BulkSetup` messages to swallow before acknowledging.
    pub drop_setup_acks: u32,
    /// Per chunk offset, number of `BulkDataAck`s to swallow. The data itself is still stored.
    pub drop_data_acks: HashMap<u16, u32>,
    /// Never answer dataset or preview announcements.
    pub drop_accept_acks: bool,
    /// Send the "transfer finished" message after the last chunk.
    pub send_finished: bool,
    /// Record what arrives but never reply.
    pub silent: bool,
    /// Face reported by `State`.
    pub face: u8,
    /// Reported battery level.
    pub battery: f32,
    /// Reported signal strength.
    pub rssi: i16,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            info: DieInfo {
                face_count: 20,
                design_and_color: 1,
                device_id: 0x5049_5845,
                data_set_hash: 0,
                available_flash: i16::MAX as u16,
            },
            memory: i16::MAX as usize,
            drop_setup_acks: 0,
            drop_data_acks: HashMap::new(),
            drop_accept_acks: false,
            send_finished: true,
            silent: false,
            face: 0,
            battery: 0.75,
            rssi: -60,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Bulk,
    DataSet,
    TestAnimation { hash: u32 },
}

struct Receive {
    buf: Vec<u8>,
    received: usize,
    committed: bool,
}

struct Outbound {
    data: Vec<u8>,
    chunk: usize,
    offset: usize,
    in_flight: Option<usize>,
}

struct Inner {
    cfg: SimConfig,
    log: Vec<Message>,
    pending: Pending,
    receive: Option<Receive>,
    outbound: Option<Outbound>,
    setup_acks_dropped: u32,
    dataset: Option<Vec<u8>>,
    test_animation: Option<(u32, Vec<u8>)>,
    last_bulk: Option<Vec<u8>>,
    telemetry: bool,
    played: Vec<(u8, u8, u8)>,
    fail_sends: bool,
}

/// Cloneable handle to one simulated die; clones share state.
#[derive(Clone)]
pub struct SimulatedDie {
    inner: Arc<Mutex<Inner>>,
    to_host: mpsc::UnboundedSender<Vec<u8>>,
}

fn pool_bytes(counts: [(u16, usize); 4]) -> usize {
    counts.iter().map(|&(n, size)| usize::from(n) * size).sum()
}

/// Record bytes an animation-set header announces, offset tables excluded.
fn announced_dataset_size(h: &AnimSetHeader) -> usize {
    usize::from(h.palette_size)
        + pool_bytes([
            (h.rgb_keyframe_count, 2),
            (h.rgb_track_count, 8),
            (h.keyframe_count, 2),
            (h.track_count, 8),
        ])
        + usize::from(h.animation_size)
        + usize::from(h.condition_size)
        + usize::from(h.action_size)
        + usize::from(h.rule_count) * 6
}

fn announced_test_size(h: &TestAnimSetHeader) -> usize {
    usize::from(h.palette_size)
        + pool_bytes([
            (h.rgb_keyframe_count, 2),
            (h.rgb_track_count, 8),
            (h.keyframe_count, 2),
            (h.track_count, 8),
        ])
        + usize::from(h.animation_size)
}

impl Inner {
    fn react(&mut self, msg: &Message, out: &mut Vec<Message>) {
        match msg {
            Message::WhoAreYou => {
                let mut info = self.cfg.info;
                info.data_set_hash = self.dataset.as_deref().map_or(0, content_hash);
                out.push(Message::IAmADie(info));
            }
            Message::TransferAnimSet(h) => {
                if self.cfg.drop_accept_acks {
                    return;
                }
                let accepted = announced_dataset_size(h) <= self.cfg.memory;
                if accepted {
                    self.pending = Pending::DataSet;
                }
                out.push(Message::TransferAnimSetAck { accepted });
            }
            Message::TransferTestAnimSet(h) => {
                if self.cfg.drop_accept_acks {
                    return;
                }
                let ack = match &self.test_animation {
                    Some((hash, _)) if *hash == h.hash => TestAnimAck::UpToDate,
                    _ if announced_test_size(h) > self.cfg.memory => TestAnimAck::NoMemory,
                    _ => {
                        self.pending = Pending::TestAnimation { hash: h.hash };
                        TestAnimAck::Download
                    }
                };
                out.push(Message::TransferTestAnimSetAck(ack));
            }
            Message::BulkSetup { size } => {
                if self.setup_acks_dropped < self.cfg.drop_setup_acks {
                    self.setup_acks_dropped += 1;
                    return;
                }
                let size = usize::try_from(*size).unwrap_or(0);
                self.receive = Some(Receive {
                    buf: vec![0; size],
                    received: 0,
                    committed: false,
                });
                out.push(Message::BulkSetupAck);
                if size == 0 {
                    self.complete(out);
                }
            }
            Message::BulkData { offset, payload } => self.receive_chunk(*offset, payload, out),
            Message::BulkSetupAck => self.send_next_chunk(out),
            Message::BulkDataAck { offset } => {
                if let Some(o) = self.outbound.as_mut()
                    && o.in_flight == Some(usize::from(*offset))
                {
                    o.offset += o.chunk.min(o.data.len() - o.offset);
                    o.in_flight = None;
                    self.send_next_chunk(out);
                }
            }
            Message::RequestState => out.push(Message::State {
                roll_state: RollState::OnFace,
                face: self.cfg.face,
            }),
            Message::RequestTelemetry { on } => self.telemetry = *on,
            Message::PlayAnim {
                index,
                remap_face,
                loop_count,
            } => self.played.push((*index, *remap_face, *loop_count)),
            Message::Flash { .. } => out.push(Message::FlashFinished),
            Message::RequestBatteryLevel => out.push(Message::BatteryLevel {
                level: self.cfg.battery,
            }),
            Message::RequestRssi => out.push(Message::Rssi {
                rssi: self.cfg.rssi,
            }),
            _ => {}
        }
    }

    fn receive_chunk(&mut self, offset: u16, payload: &[u8], out: &mut Vec<Message>) {
        let Some(rx) = self.receive.as_mut() else {
            return;
        };
        let start = usize::from(offset);
        if start == rx.received && start + payload.len() <= rx.buf.len() {
            rx.buf[start..start + payload.len()].copy_from_slice(payload);
            rx.received += payload.len();
        } else if start > rx.received {
            return;
        }
        let done = rx.received == rx.buf.len();

        let dropped = self
            .cfg
            .drop_data_acks
            .get_mut(&offset)
            .filter(|n| **n > 0)
            .map(|n| *n -= 1)
            .is_some();
        if !dropped {
            out.push(Message::BulkDataAck { offset });
        }
        if done {
            self.complete(out);
        }
    }

    // The receive stays around after commit so a resent final chunk is still acknowledged.
    fn complete(&mut self, out: &mut Vec<Message>) {
        let Some(rx) = self.receive.as_mut().filter(|r| !r.committed) else {
            return;
        };
        rx.committed = true;
        let buf = rx.buf.clone();
        match std::mem::replace(&mut self.pending, Pending::Bulk) {
            Pending::Bulk => self.last_bulk = Some(buf),
            Pending::DataSet => {
                self.dataset = Some(buf);
                if self.cfg.send_finished {
                    out.push(Message::TransferAnimSetFinished);
                }
            }
            Pending::TestAnimation { hash } => {
                self.test_animation = Some((hash, buf));
                if self.cfg.send_finished {
                    out.push(Message::TransferTestAnimSetFinished);
                }
            }
        }
    }

    fn send_next_chunk(&mut self, out: &mut Vec<Message>) {
        let Some(o) = self.outbound.as_mut() else {
            return;
        };
        if o.offset >= o.data.len() {
            self.outbound = None;
            return;
        }
        let len = o.chunk.min(o.data.len() - o.offset);
        o.in_flight = Some(o.offset);
        out.push(Message::BulkData {
            offset: o.offset as u16,
            payload: o.data[o.offset..o.offset + len].to_vec(),
        });
    }
}

impl SimulatedDie {
    /// Create a die and the channel carrying its replies to the host.
    pub fn new(cfg: SimConfig) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (to_host, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            cfg,
            log: Vec::new(),
            pending: Pending::Bulk,
            receive: None,
            outbound: None,
            setup_acks_dropped: 0,
            dataset: None,
            test_animation: None,
            last_bulk: None,
            telemetry: false,
            played: Vec::new(),
            fail_sends: false,
        };
        (
            Self {
                inner: Arc::new(Mutex::new(inner)),
                to_host,
            },
            rx,
        )
    }

    /// Build a host [`Die`] wired to a new simulator, left in `Identifying`.
    ///
    /// Must be called inside a tokio runtime: replies are pumped by a spawned task that exits
    /// once the die is dropped.
    pub fn attach(cfg: SimConfig, opts: TransferOpts) -> PixelsResult<(Arc<Die>, Self)> {
        let (sim, mut rx) = Self::new(cfg);
        let die = Arc::new(Die::new("sim", Arc::new(sim.clone()), opts)?);
        for next in [
            ConnectionState::Available,
            ConnectionState::Connecting,
            ConnectionState::Identifying,
        ] {
            die.set_connection_state(next)?;
        }

        let weak: Weak<Die> = Arc::downgrade(&die);
        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                let Some(die) = weak.upgrade() else {
                    break;
                };
                die.on_data(&packet);
            }
        });
        Ok((die, sim))
    }

    /// [`SimulatedDie::attach`] followed by identification, leaving the die `Ready`.
    pub async fn connect(cfg: SimConfig, opts: TransferOpts) -> PixelsResult<(Arc<Die>, Self)> {
        let (die, sim) = Self::attach(cfg, opts)?;
        die.identify().await?;
        Ok((die, sim))
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, replies: Vec<Message>) {
        for reply in replies {
            // A closed channel means the host went away; nothing left to tell it.
            let _ = self.to_host.send(reply.encode());
        }
    }

    /// Every message received from the host, in arrival order.
    pub fn sent(&self) -> Vec<Message> {
        self.inner().log.clone()
    }

    /// Number of received messages of `kind`.
    pub fn count(&self, kind: MessageType) -> usize {
        self.inner().log.iter().filter(|m| m.kind() == kind).count()
    }

    /// Forget the received-message log.
    pub fn clear_log(&self) {
        self.inner().log.clear();
    }

    /// Stored dataset bytes, once a dataset transfer completed.
    pub fn dataset(&self) -> Option<Vec<u8>> {
        self.inner().dataset.clone()
    }

    /// Stored preview bytes, once a test-animation transfer completed.
    pub fn test_animation(&self) -> Option<Vec<u8>> {
        self.inner().test_animation.as_ref().map(|(_, b)| b.clone())
    }

    /// Bytes of the last plain bulk upload.
    pub fn last_bulk(&self) -> Option<Vec<u8>> {
        self.inner().last_bulk.clone()
    }

    /// Bytes accumulated by the current or last bulk receive.
    pub fn received(&self) -> usize {
        self.inner().receive.as_ref().map_or(0, |r| r.received)
    }

    /// Whether telemetry streaming is switched on.
    pub fn telemetry_enabled(&self) -> bool {
        self.inner().telemetry
    }

    /// `(index, remap_face, loop_count)` of every `PlayAnim` received.
    pub fn played(&self) -> Vec<(u8, u8, u8)> {
        self.inner().played.clone()
    }

    /// Make every subsequent host send fail at the transport.
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner().fail_sends = fail;
    }

    /// Push an unsolicited message to the host.
    pub fn emit(&self, msg: Message) {
        self.deliver(vec![msg]);
    }

    /// Start a die-initiated bulk transfer of `data` in `chunk`-byte pieces.
    pub fn begin_bulk_send(&self, data: Vec<u8>, chunk: usize) -> PixelsResult<()> {
        let size = i16::try_from(data.len())
            .map_err(|_| PixelsError::validation("simulated bulk send too large"))?;
        if chunk == 0 {
            return Err(PixelsError::validation("chunk must be > 0"));
        }
        self.inner().outbound = Some(Outbound {
            data,
            chunk,
            offset: 0,
            in_flight: None,
        });
        self.emit(Message::BulkSetup { size });
        Ok(())
    }
}

impl Link for SimulatedDie {
    fn send(&self, packet: &[u8]) -> PixelsResult<()> {
        let replies = {
            let mut inner = self.inner();
            if inner.fail_sends {
                return Err(PixelsError::link("simulated transport failure"));
            }
            let msg = Message::decode(packet)?;
            tracing::trace!(kind = ?msg.kind(), "sim received");
            let mut out = Vec::new();
            if !inner.cfg.silent {
                inner.react(&msg, &mut out);
            }
            inner.log.push(msg);
            out
        };
        self.deliver(replies);
        Ok(())
    }
}
