//! Switch role: boot, bounce filtering, factory reset and bound dumps.

use zb_onoff::adapters::system::EspSystem;
use zb_onoff::adapters::zigbee::ZigbeeAdapter;
use zb_onoff::app::commands::OnOffCommand;
use zb_onoff::app::events::AppEvent;
use zb_onoff::app::network::{BoundDevice, Lifecycle};
use zb_onoff::app::ports::NetworkPort;
use zb_onoff::app::service::{DeviceService, Step};
use zb_onoff::config::{DeviceConfig, EDGE_QUEUE_CAP};
use zb_onoff::drivers::button::ButtonLine;
use zb_onoff::error::NetworkError;
use zb_onoff::events::{EdgeQueue, SwitchFunction};

use crate::mock_hw::{MockBoard, RecordingSink};

const LINE: ButtonLine = ButtonLine::new(9, SwitchFunction::Toggle);

fn light_peer() -> BoundDevice {
    BoundDevice {
        endpoint: 10,
        short_addr: 0x7c21,
        ieee: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
        manufacturer: None,
        model: None,
    }
}

/// Drive the event loop until `until_ms` or the session ends, sending
/// every activation to the bound peers.
fn run_until<const N: usize>(
    service: &mut DeviceService,
    queue: &EdgeQueue<N>,
    board: &mut MockBoard<'_, N>,
    zb: &mut ZigbeeAdapter,
    system: &mut EspSystem,
    sink: &mut RecordingSink,
    until_ms: u64,
) -> Vec<Step> {
    let mut steps = Vec::new();
    while board.now() < until_ms {
        let step = service.run_once(queue, board, zb, system, sink);
        if let Step::Activation(a) = step {
            service.dispatch(a, zb, sink);
        }
        steps.push(step);
        if step == Step::Terminated {
            break;
        }
    }
    steps
}

#[test]
fn boot_waits_for_join_then_bind() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.join_after(5);
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();

    let config = DeviceConfig::switch();
    let join_poll = u64::from(config.join_poll_ms);
    let mut service = DeviceService::new(config, &[LINE]);
    assert_eq!(
        service.boot(&mut zb, &mut board, &mut system, &mut sink),
        Lifecycle::Bound
    );

    assert_eq!(board.now(), 5 * join_poll);
    assert_eq!(
        &sink.events[..3],
        &[
            AppEvent::Started(zb_onoff::config::Role::Switch),
            AppEvent::Joined,
            AppEvent::Bound(1),
        ]
    );
    assert_eq!(service.network().session().bound_devices(), &[light_peer()]);
}

#[test]
fn bound_list_is_empty_until_a_light_binds() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);

    assert!(zb.bound_devices().is_empty());
    assert!(service.network().session().bound_devices().is_empty());

    zb.sim().bind(light_peer());
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    let snapshot = sink.events.iter().find_map(|e| match e {
        AppEvent::BoundDevices(list) => Some(list.clone()),
        _ => None,
    });
    assert_eq!(snapshot.as_deref(), Some(&[light_peer()][..]));
    assert_eq!(
        light_peer().ieee_display().to_string(),
        "88:77:66:55:44:33:22:11"
    );
}

#[test]
fn start_failure_restarts_the_device() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    zb.sim().fail_start(-1);
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);

    assert_eq!(
        service.boot(&mut zb, &mut board, &mut system, &mut sink),
        Lifecycle::Restarting
    );
    assert_eq!(system.restarts(), 1);
    assert_eq!(
        sink.events,
        vec![
            AppEvent::StartFailed(NetworkError::StartFailed(-1)),
            AppEvent::Restarting("network start failed"),
        ]
    );
    assert_eq!(
        service.run_once(&queue, &mut board, &mut zb, &mut system, &mut sink),
        Step::Terminated
    );
}

#[test]
fn bouncy_press_sends_one_toggle() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    let t0 = board.now();
    board.bouncy_press(t0 + 7, t0 + 200, &[1, 2]);
    let steps = run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 1000);

    let activations = steps
        .iter()
        .filter(|s| matches!(s, Step::Activation(_)))
        .count();
    assert_eq!(activations, 1);
    assert_eq!(sim.sent(), vec![OnOffCommand::Toggle]);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CommandSent { .. })),
        1
    );
    assert_eq!(board.edges_delivered, 3);
    assert!(board.irq_enabled());
    assert_eq!(queue.dropped(), 0);
    assert_eq!(service.dispatcher().sent(), 1);
}

#[test]
fn masked_bounces_never_reach_the_queue() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    // Bounces land after the consumer has gated the interrupt.
    let t0 = board.now();
    board.bouncy_press(t0 + 10, t0 + 150, &[15, 30, 45]);
    run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 1000);

    assert_eq!(sim.sent(), vec![OnOffCommand::Toggle]);
    assert_eq!(board.edges_delivered, 1);
    assert_eq!(board.edges_masked, 3);
}

#[test]
fn two_presses_send_two_toggles() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    let t0 = board.now();
    board.press(t0 + 10, t0 + 120).press(t0 + 400, t0 + 480);
    run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 2000);

    assert_eq!(sim.sent(), vec![OnOffCommand::Toggle, OnOffCommand::Toggle]);
}

#[test]
fn long_hold_factory_resets_exactly_once() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    let t0 = board.now();
    board
        .bouncy_press(t0 + 7, t0 + 3500, &[1, 2])
        .press(t0 + 6000, t0 + 6100);
    let steps = run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 60_000);

    assert_eq!(steps.iter().filter(|s| **s == Step::FactoryReset).count(), 1);
    assert_eq!(steps.last(), Some(&Step::Terminated));
    assert_eq!(sim.factory_resets(), 1);
    assert_eq!(system.restarts(), 1);
    assert!(sim.sent().is_empty(), "a reset hold must not also toggle");
    assert_eq!(sink.count(|e| *e == AppEvent::FactoryReset), 1);
    assert_eq!(
        sink.count(|e| *e == AppEvent::Restarting("factory reset")),
        1
    );
    assert!(!board.irq_enabled());
    assert_eq!(service.network().lifecycle(), Lifecycle::Restarting);
}

#[test]
fn bound_devices_are_dumped_every_ten_seconds() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    zb.sim().bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);
    let t0 = board.now();

    run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 30_000);

    // One dump at boot plus one per elapsed interval.
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::BoundDevices(_))),
        4
    );
}

#[test]
fn hold_below_threshold_toggles_and_keeps_the_network() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);

    let t0 = board.now();
    board.press(t0 + 7, t0 + 1007);
    let steps = run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 5000);

    assert!(!steps.contains(&Step::FactoryReset));
    assert_eq!(sim.sent(), vec![OnOffCommand::Toggle]);
    assert_eq!(sim.factory_resets(), 0);
    assert_eq!(system.restarts(), 0);
    assert!(board.irq_enabled());
    assert_eq!(service.network().lifecycle(), Lifecycle::Bound);
}

#[test]
fn rebooted_switch_uses_its_stored_bindings() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    DeviceService::new(DeviceConfig::switch(), &[LINE]).boot(&mut zb, &mut board, &mut system, &mut sink);

    // Power cycle: no light announces itself this time.
    sim.reboot();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    assert_eq!(
        service.boot(&mut zb, &mut board, &mut system, &mut sink),
        Lifecycle::Bound
    );
    assert_eq!(service.network().session().bound_devices(), &[light_peer()]);

    let t0 = board.now();
    board.press(t0 + 10, t0 + 120);
    run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 1000);
    assert_eq!(sim.sent(), vec![OnOffCommand::Toggle]);
}

#[test]
fn dump_reports_manufacturer_and_model() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut zb = ZigbeeAdapter::new();
    let sim = zb.sim();
    sim.bind(light_peer());
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::switch(), &[LINE]);
    service.boot(&mut zb, &mut board, &mut system, &mut sink);
    assert!(sim.basic_reads().contains(&light_peer().short_addr));

    assert!(sim.answer_basic_read(light_peer().short_addr, "Espressif", "ZBLightBulb"));
    let t0 = board.now();
    run_until(&mut service, &queue, &mut board, &mut zb, &mut system, &mut sink, t0 + 10_000);

    let latest = sink
        .events
        .iter()
        .rev()
        .find_map(|e| match e {
            AppEvent::BoundDevices(list) => Some(list.clone()),
            _ => None,
        })
        .expect("a bound-device dump");
    assert_eq!(latest[0].manufacturer.as_deref(), Some("Espressif"));
    assert_eq!(latest[0].model.as_deref(), Some("ZBLightBulb"));
}
