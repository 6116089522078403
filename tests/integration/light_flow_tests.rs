//! Light role: inbound commands, local toggles and signal sampling.

use std::sync::Arc;

use zb_onoff::adapters::log_sink::LogEventSink;
use zb_onoff::adapters::system::EspSystem;
use zb_onoff::adapters::zigbee::ZigbeeAdapter;
use zb_onoff::app::dispatcher::Dispatch;
use zb_onoff::app::events::AppEvent;
use zb_onoff::app::commands::OnOffCommand;
use zb_onoff::app::light::{InboundLight, LightController, LocalLight, SharedLight};
use zb_onoff::app::network::Lifecycle;
use zb_onoff::app::ports::OnOffTarget;
use zb_onoff::app::sampler::{SignalMonitor, SignalSampler};
use zb_onoff::app::service::{DeviceService, Step};
use zb_onoff::config::{DeviceConfig, EDGE_QUEUE_CAP, Role};
use zb_onoff::drivers::button::ButtonLine;
use zb_onoff::events::{EdgeQueue, SwitchFunction};

use crate::mock_hw::{MockBoard, MockLed, RecordingSink};

const LINE: ButtonLine = ButtonLine::new(9, SwitchFunction::Toggle);

struct Bulb {
    zb: ZigbeeAdapter,
    light: SharedLight<MockLed>,
    signal: Arc<SignalMonitor>,
}

fn bulb() -> Bulb {
    let mut zb = ZigbeeAdapter::new();
    let light = SharedLight::new(LightController::new(MockLed::default(), false));
    let signal = Arc::new(SignalMonitor::new());
    zb.set_light_handler(Box::new(InboundLight::new(
        light.clone(),
        zb.radio(),
        Arc::clone(&signal),
        LogEventSink::new(),
    )));
    Bulb { zb, light, signal }
}

#[test]
fn light_boots_without_waiting_for_binding() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut b = bulb();
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::light(), &[LINE]);

    assert_eq!(
        service.boot(&mut b.zb, &mut board, &mut system, &mut sink),
        Lifecycle::Joined
    );
    assert_eq!(
        sink.events,
        vec![AppEvent::Started(Role::Light), AppEvent::Joined]
    );
}

#[test]
fn inbound_commands_drive_the_output() {
    let b = bulb();
    let sim = b.zb.sim();
    assert!(!b.light.get_state());

    sim.set_rssi(-58);
    assert!(sim.inbound(true));
    assert!(b.light.get_state());
    assert_eq!(b.signal.last_rssi(), -58);

    // Repeating the current state rewrites the level but changes nothing.
    assert!(sim.inbound(true));
    assert!(b.light.get_state());

    assert!(sim.inbound(false));
    assert!(!b.light.get_state());
    assert_eq!(
        b.light.with(|c| c.output().writes.clone()),
        vec![false, true, true, false]
    );
}

#[test]
fn local_press_toggles_the_light_once() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut b = bulb();
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::light(), &[LINE]);
    service.boot(&mut b.zb, &mut board, &mut system, &mut sink);

    board.bouncy_press(7, 200, &[1, 2]);
    let mut toggles = 0;
    // The light has no periodic jobs, so every wait ends on an edge.
    while !queue.is_empty() || board.now() < 10 {
        let step = service.run_once(&queue, &mut board, &mut b.zb, &mut system, &mut sink);
        if let Step::Activation(a) = step {
            let mut local = LocalLight::new(b.light.clone(), &mut b.zb);
            assert!(matches!(
                service.dispatch(a, &mut local, &mut sink),
                Dispatch::Sent(_)
            ));
            toggles += 1;
        }
    }

    assert_eq!(toggles, 1);
    assert!(b.light.get_state());
    assert!(b.zb.sim().sent().is_empty(), "local toggles are not sent to peers");
    assert_eq!(b.zb.sim().light_reports(), vec![true]);
    assert!(b.zb.sim().light_attribute());
}

#[test]
fn network_and_local_writers_share_one_state() {
    let mut b = bulb();
    let sim = b.zb.sim();

    sim.inbound(true);
    LocalLight::new(b.light.clone(), &mut b.zb)
        .apply(OnOffCommand::Toggle)
        .unwrap();
    assert!(!b.light.get_state());
    assert!(!sim.light_attribute());
}

#[test]
fn remote_toggle_after_local_toggle_is_visible() {
    let mut b = bulb();
    let sim = b.zb.sim();

    LocalLight::new(b.light.clone(), &mut b.zb)
        .apply(OnOffCommand::Toggle)
        .unwrap();
    assert!(b.light.get_state());

    // The stack toggles its attribute, which must match the LED.
    assert!(sim.inbound_command(OnOffCommand::Toggle));
    assert!(!b.light.get_state());
    assert!(sim.inbound_command(OnOffCommand::Toggle));
    assert!(b.light.get_state());
    assert_eq!(
        b.light.with(|c| c.output().writes.clone()),
        vec![false, true, false, true]
    );
}

#[test]
fn sampler_reads_the_radio() {
    let b = bulb();
    b.zb.sim().set_rssi(-71);
    let sampler = SignalSampler::new(Arc::clone(&b.signal), 500);
    let mut sink = RecordingSink::default();

    assert_eq!(sampler.tick(&b.zb.radio(), &mut sink), -71);
    assert_eq!(b.signal.last_rssi(), -71);
    assert_eq!(sink.events, vec![AppEvent::SignalQuality { rssi_dbm: -71 }]);
}

#[test]
fn light_hold_leaves_the_network() {
    let queue = EdgeQueue::<EDGE_QUEUE_CAP>::new();
    let mut board = MockBoard::new(&queue, LINE);
    let mut b = bulb();
    let mut system = EspSystem::new();
    let mut sink = RecordingSink::default();
    let mut service = DeviceService::new(DeviceConfig::light(), &[LINE]);
    service.boot(&mut b.zb, &mut board, &mut system, &mut sink);

    board.press(7, 5000);
    let mut steps = Vec::new();
    loop {
        let step = service.run_once(&queue, &mut board, &mut b.zb, &mut system, &mut sink);
        steps.push(step);
        if step == Step::Terminated {
            break;
        }
    }

    assert_eq!(steps, vec![Step::FactoryReset, Step::Terminated]);
    assert_eq!(b.zb.sim().factory_resets(), 1);
    assert_eq!(system.restarts(), 1);
    assert!(!b.light.get_state());
}
