//! Shared node fixture: two simulated ADS112C04s, a simulated on-chip ADC
//! and shared-state GPIO pins.

use core::cell::RefCell;
use std::rc::Rc;

use propnode::adapters::sim::{SimBus, SimLocalAdc, SimPin};
use propnode::app::service::NodeService;
use propnode::config::NodeConfig;
use propnode::drivers::ads112c04::{AdcSet, Reference};
use propnode::drivers::bus::{self, SharedI2c};
use propnode::sensors::SharedLocalAdc;

pub const CONFIG: &str = r#"{
    "deviceName": "Bench Node",
    "deviceType": "Sensor Monitor",
    "sensorInfo": {
        "thermocouples": {
            "TC1": { "ADCIndex": 1, "highPin": 0, "lowPin": 1, "units": "V", "type": "K" }
        },
        "pressureTransducers": {
            "PT1": { "ADCIndex": 0, "pin": 4, "maxPressure_PSI": 1000, "units": "PSI" }
        },
        "loadCells": {
            "LC1": { "ADCIndex": 1, "highPin": 2, "lowPin": 3,
                     "loadRating_N": 500, "excitation_V": 5, "sensitivity_vV": 2, "units": "N" }
        },
        "currentSensors": {
            "IS1": { "ADCIndex": 2, "pin": 0, "shuntResistor_Ohms": 0.01, "csaGain": 50 }
        }
    },
    "controls": {
        "VALVE1": { "pin": 10, "type": "valve", "defaultState": "CLOSED" },
        "VENT": { "pin": 11, "type": "valve", "defaultState": "OPEN" }
    }
}"#;

/// MUX codes used by [`CONFIG`].
pub const MUX_AIN0_AIN1: u8 = 0b0000;
pub const MUX_AIN2_AIN3: u8 = 0b0110;
pub const MUX_AIN0_GND: u8 = 0b1000;

pub struct Bench {
    pub bus: SharedI2c<SimBus>,
    pub pins: Rc<RefCell<Vec<(i32, SimPin)>>>,
    pub node: NodeService<SimPin>,
}

#[allow(dead_code)]
impl Bench {
    pub fn pin(&self, gpio: i32) -> SimPin {
        self.pins
            .borrow()
            .iter()
            .find(|(g, _)| *g == gpio)
            .map(|(_, p)| p.clone())
            .unwrap()
    }
}

/// Build the bench node.  `adcs` lists the converter addresses present on
/// the bus; `setup` can preload conversions before the scan.
pub fn bench_with(adcs: &[u8], setup: impl FnOnce(&mut SimBus)) -> Bench {
    let cfg = NodeConfig::from_json_str(CONFIG).unwrap();
    let mut sim = SimBus::new();
    for &addr in adcs {
        sim.add_ads(addr);
    }
    setup(&mut sim);
    let bus = SharedI2c::new(sim);

    let found = bus::scan(&mut bus.clone());
    let set = AdcSet::from_scan(&bus, &found, Reference::Supply(5.0));

    let mut local = SimLocalAdc::new();
    local.set(4, 2482);
    let local: SharedLocalAdc = Rc::new(RefCell::new(local));

    let pins = Rc::new(RefCell::new(Vec::new()));
    let made = Rc::clone(&pins);
    let node = NodeService::from_config(&cfg, set, &local, move |gpio| {
        let pin = SimPin::new();
        made.borrow_mut().push((gpio, pin.clone()));
        Ok(pin)
    })
    .unwrap();
    bus.with(SimBus::clear_log);
    Bench { bus, pins, node }
}

pub fn bench() -> Bench {
    bench_with(&[0x40, 0x41], |_| {})
}

pub fn conf_frame() -> String {
    NodeConfig::from_json_str(CONFIG).unwrap().conf_frame().unwrap()
}
