use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::link::sim::{SimConfig, SimulatedDie};

fn detached(cfg: SimConfig) -> (Arc<Die>, SimulatedDie) {
    let (sim, _rx) = SimulatedDie::new(cfg);
    let die = Die::new("unit", Arc::new(sim.clone()), TransferOpts::default()).unwrap();
    (Arc::new(die), sim)
}

fn walk(die: &Die, states: &[ConnectionState]) {
    for &s in states {
        die.set_connection_state(s).unwrap();
    }
}

async fn assert_transfers_refused(die: &Die, sim: &SimulatedDie, state: ConnectionState) {
    assert_eq!(die.state(), state);
    let ds = crate::compile::compiler::compile(&crate::authoring::model::EditDataSet::default())
        .unwrap();
    let err = die.upload_dataset(&ds, |_| {}).await.unwrap_err();
    assert!(
        matches!(err, PixelsError::NotConnected { state: s } if s == state),
        "{err}"
    );
    let err = die.upload_bulk_data(&[1, 2, 3], |_| {}).await.unwrap_err();
    assert!(
        matches!(err, PixelsError::NotConnected { state: s } if s == state),
        "{err}"
    );
    assert!(sim.sent().is_empty());
}

#[tokio::test]
async fn operations_are_refused_until_connected() {
    let (die, sim) = detached(SimConfig::default());
    assert_eq!(die.state(), ConnectionState::Invalid);

    let err = die.play_animation(0, 0, 1).await.unwrap_err();
    assert!(matches!(
        err,
        PixelsError::NotConnected {
            state: ConnectionState::Invalid
        }
    ));
    assert!(die.subscribe_telemetry(|_| {}).await.is_err());
    assert!(sim.sent().is_empty());
}

#[tokio::test]
async fn transfers_are_refused_while_available() {
    let (die, sim) = detached(SimConfig::default());
    walk(&die, &[ConnectionState::Available]);
    assert_transfers_refused(&die, &sim, ConnectionState::Available).await;
}

#[tokio::test]
async fn transfers_are_refused_while_connecting() {
    let (die, sim) = detached(SimConfig::default());
    walk(&die, &[ConnectionState::Available, ConnectionState::Connecting]);
    assert_transfers_refused(&die, &sim, ConnectionState::Connecting).await;
}

#[tokio::test(start_paused = true)]
async fn transfers_are_refused_while_disconnecting() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    die.set_connection_state(ConnectionState::Disconnecting).unwrap();
    sim.clear_log();
    assert_transfers_refused(&die, &sim, ConnectionState::Disconnecting).await;
}

#[test]
fn lifecycle_rejects_skipped_states() {
    let (die, _sim) = detached(SimConfig::default());
    assert!(die.set_connection_state(ConnectionState::Ready).is_err());
    die.set_connection_state(ConnectionState::Available).unwrap();
    assert!(die.set_connection_state(ConnectionState::Identifying).is_err());
    assert_eq!(die.state(), ConnectionState::Available);
}

#[test]
fn fallback_to_available_records_the_reason() {
    let (die, _sim) = detached(SimConfig::default());
    die.set_connection_state(ConnectionState::Available).unwrap();
    die.set_connection_state(ConnectionState::Connecting).unwrap();
    die.set_connection_state(ConnectionState::Available).unwrap();
    assert_eq!(die.last_error(), LastError::ConnectionError);

    for s in [
        ConnectionState::Connecting,
        ConnectionState::Identifying,
        ConnectionState::Ready,
        ConnectionState::Available,
    ] {
        die.set_connection_state(s).unwrap();
    }
    assert_eq!(die.last_error(), LastError::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn identify_moves_to_ready_and_stores_info() {
    let (die, sim) = SimulatedDie::attach(SimConfig::default(), TransferOpts::default()).unwrap();
    assert_eq!(die.state(), ConnectionState::Identifying);

    let info = die.identify().await.unwrap();
    assert_eq!(info.face_count, 20);
    assert_eq!(info.data_set_hash, 0);
    assert_eq!(die.state(), ConnectionState::Ready);
    assert_eq!(die.status().info, Some(info));
    assert_eq!(sim.count(MessageType::WhoAreYou), 1);
}

#[tokio::test(start_paused = true)]
async fn identify_reports_a_transport_failure_even_when_ready() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    let info = die.identify().await.unwrap();
    assert_eq!(die.state(), ConnectionState::Ready);

    die.report_link_error("radio reset");
    assert_eq!(die.identify().await.unwrap(), info);

    sim.set_fail_sends(true);
    let err = die.identify().await.unwrap_err();
    assert!(matches!(err, PixelsError::Link(_)), "{err}");
    assert_eq!(die.state(), ConnectionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn silent_die_times_out_identification() {
    let cfg = SimConfig {
        silent: true,
        ..SimConfig::default()
    };
    let (die, _sim) = SimulatedDie::attach(cfg, TransferOpts::default()).unwrap();
    let err = die.identify().await.unwrap_err();
    assert!(matches!(
        err,
        PixelsError::ProtocolTimeout {
            awaiting: MessageType::IAmADie,
            ..
        }
    ));
    assert_eq!(die.state(), ConnectionState::Identifying);
    assert_eq!(die.handler_count(MessageType::IAmADie), 0);
}

#[tokio::test(start_paused = true)]
async fn queries_return_the_die_readings() {
    let cfg = SimConfig {
        face: 7,
        battery: 0.5,
        rssi: -42,
        ..SimConfig::default()
    };
    let (die, _sim) = SimulatedDie::connect(cfg, TransferOpts::default())
        .await
        .unwrap();

    assert_eq!(die.get_battery_level().await.unwrap(), 0.5);
    assert_eq!(die.get_rssi().await.unwrap(), -42);
    assert_eq!(die.request_state().await.unwrap(), (RollState::OnFace, 7));
    // The default State handler also saw the reply.
    assert_eq!(die.status().face, 7);
    die.flash(2, Rgb8::new(255, 0, 0)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn play_animation_is_fire_and_forget() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    die.play_animation(3, 5, 2).await.unwrap();
    die.stop_animation(3, 5).await.unwrap();
    assert_eq!(sim.played(), vec![(3, 5, 2)]);
    assert_eq!(sim.count(MessageType::StopAnim), 1);
}

#[tokio::test(start_paused = true)]
async fn telemetry_is_switched_by_first_and_last_subscriber() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    let frames = Arc::new(AtomicUsize::new(0));

    let n = Arc::clone(&frames);
    let first = die
        .subscribe_telemetry(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    let second = die.subscribe_telemetry(|_| {}).await.unwrap();
    assert!(sim.telemetry_enabled());
    assert_eq!(sim.count(MessageType::RequestTelemetry), 1);

    sim.emit(Message::Telemetry {
        frames: Default::default(),
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    drop(first);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(sim.telemetry_enabled());
    drop(second);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!sim.telemetry_enabled());
    assert_eq!(sim.count(MessageType::RequestTelemetry), 2);
    assert_eq!(die.handler_count(MessageType::Telemetry), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_fails_the_operation() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    sim.set_fail_sends(true);

    let err = die
        .set_all_leds_to_color(Rgb8::new(0, 0, 255))
        .await
        .unwrap_err();
    assert!(matches!(err, PixelsError::Link(_)));
    assert_eq!(
        die.last_link_error().as_deref(),
        Some("link error: simulated transport failure")
    );

    sim.set_fail_sends(false);
    die.set_all_leds_to_color(Rgb8::new(0, 0, 255)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn debug_log_and_state_pushes_are_handled_by_default() {
    let (die, sim) = SimulatedDie::connect(SimConfig::default(), TransferOpts::default())
        .await
        .unwrap();
    assert_eq!(die.handler_count(MessageType::State), 1);
    assert_eq!(die.handler_count(MessageType::DebugLog), 1);

    sim.emit(Message::State {
        roll_state: RollState::Rolling,
        face: 11,
    });
    sim.emit(Message::DebugLog {
        text: "hello".into(),
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    let status = die.status();
    assert_eq!(status.roll_state, RollState::Rolling);
    assert_eq!(status.face, 11);
}
