//! NodeService → sensors → ADS112C04 driver over the simulated bus.

use propnode::adapters::sim::{SimBus, Transaction};
use propnode::error::{Error, SensorError};
use propnode::sensors::HISTORY_LEN;

use crate::fixtures::{MUX_AIN0_AIN1, MUX_AIN0_GND, MUX_AIN2_AIN3, bench, bench_with};

fn preload(bus: &mut SimBus) {
    bus.set_conversion(0x40, MUX_AIN0_AIN1, 0x0100);
    bus.set_conversion(0x40, MUX_AIN2_AIN3, 262);
    bus.set_conversion(0x41, MUX_AIN0_GND, 3277);
}

fn close(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn every_sensor_converts_from_its_source() {
    let mut b = bench_with(&[0x40, 0x41], preload);
    let mut read = |name: &str| b.node.sensor_mut(name).unwrap().take_data("default").unwrap();

    // 0x0100 × 5 V / 32768, gain 1
    assert!(close(read("TC1"), 0.039_062_5, 1e-6));
    // 2482 counts on the on-chip ADC ≈ 2.0 V → (2 − 1) / 4 × 1000 PSI
    assert!(close(read("PT1"), 250.0, 0.2));
    // 262 × 5 / 32768 / 8 ≈ 5 mV of a 10 mV full scale on a 500 N cell
    assert!(close(read("LC1"), 250.0, 0.2));
    // 0.5 V across 0.01 Ω × 50
    assert!(close(read("IS1"), 1.0, 1e-3));
}

#[test]
fn load_cell_units() {
    let mut b = bench_with(&[0x40], preload);
    let lc = b.node.sensor_mut("lc1").unwrap();
    let newtons = lc.take_data("N").unwrap();
    let kg = lc.take_data("kg").unwrap();
    assert!(close(kg, newtons / 9.805, 1e-3));
    assert_eq!(
        lc.take_data("PSI"),
        Err(Error::Sensor(SensorError::InvalidUnit {
            valid: &["kg", "N", "V"]
        }))
    );
}

#[test]
fn invalid_unit_message_names_valid_set() {
    let mut b = bench();
    let err = b.node.sensor_mut("PT1").unwrap().take_data("kg").unwrap_err();
    assert_eq!(err.to_string(), "sensor: invalid unit, valid units are: PSI, V");
}

#[test]
fn repeated_reads_skip_reconfiguration() {
    let mut b = bench_with(&[0x40, 0x41], preload);
    b.node.sensor_mut("TC1").unwrap().take_data("V").unwrap();
    b.node.sensor_mut("LC1").unwrap().take_data("N").unwrap();

    b.bus.with(SimBus::clear_log);
    b.node.sensor_mut("LC1").unwrap().take_data("N").unwrap();
    let log = b.bus.with(|bus| bus.transactions().to_vec());
    assert_eq!(
        log,
        [Transaction {
            addr: 0x40,
            write: vec![0x10],
            read_len: 2
        }]
    );
}

#[test]
fn switching_sensors_on_one_adc_reprograms_it() {
    let mut b = bench_with(&[0x40, 0x41], preload);
    b.node.sensor_mut("LC1").unwrap().take_data("N").unwrap();
    b.bus.with(SimBus::clear_log);

    b.node.sensor_mut("TC1").unwrap().take_data("V").unwrap();
    let log = b.bus.with(|bus| bus.transactions().to_vec());
    assert!(log.len() > 1, "channel and gain must be rewritten");
    // CONFIG0 = MUX 0000, gain ×1 (000), bypass off
    assert_eq!(b.bus.with(|bus| bus.register(0x40, 0)), 0x00);
    assert!(b.bus.with(|bus| bus.is_converting(0x40)));
}

#[test]
fn failed_reset_leaves_slot_empty() {
    let mut b = bench_with(&[0x40, 0x41], |bus| {
        preload(bus);
        bus.set_reset_value(0x40, 0x12);
    });
    assert_eq!(b.node.adc_count(), 2);
    let payload = b.node.gets_payload();
    assert!(payload.contains(" TC1:ERR"));
    assert!(payload.contains(" LC1:ERR"));
    assert!(!payload.contains("IS1:ERR"), "second converter still in use");
    assert_eq!(
        b.node.sensor_mut("TC1").unwrap().take_data("V"),
        Err(Error::Sensor(SensorError::AdcUnavailable))
    );
}

#[test]
fn missing_converter_only_fails_its_sensors() {
    let mut b = bench_with(&[0x40], preload);
    let payload = b.node.gets_payload();
    assert!(payload.contains(" IS1:ERR"));
    assert!(!payload.contains("TC1:ERR"));
    assert!(!payload.contains("PT1:ERR"));
}

#[test]
fn history_is_bounded() {
    let mut b = bench();
    let pt = b.node.sensor_mut("PT1").unwrap();
    for _ in 0..HISTORY_LEN + 40 {
        pt.take_data("PSI").unwrap();
    }
    assert_eq!(pt.history().count(), HISTORY_LEN);
    assert!(pt.last().is_some());
}

#[test]
fn control_pins_follow_default_polarity() {
    let mut b = bench();
    let valve = b.pin(10);
    let vent = b.pin(11);
    assert!(!valve.level());
    assert!(!vent.level());

    b.node.actuate("VALVE1", "OPEN").unwrap();
    b.node.actuate("VENT", "CLOSE").unwrap();
    assert!(valve.level());
    assert!(vent.level());

    b.node.actuate("VALVE1", "CLOSE").unwrap();
    assert!(!valve.level());
}
