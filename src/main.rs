//! Propulsion node firmware — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  I2cDriver / SimBus   OneshotAdc / SimLocalAdc   GpioOutput    │
//! │  TcpServer            SSDP responder            LogEventSink   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  ConnectionFsm ──▶ rpc engine / stream ──▶ NodeService │    │
//! │  │                 sensors · controls · ADS112C04 set     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  edge-executor LocalExecutor · async-io-mini reactor           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the device the peripherals are real and the config is baked into the
//! image; on the host they are simulated and the config is read from disk.

use core::cell::RefCell;
use core::net::SocketAddr;
use std::rc::Rc;

use anyhow::Result;
use embedded_hal::digital::StatefulOutputPin;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use propnode::adapters::log_sink::LogEventSink;
use propnode::adapters::ssdp;
use propnode::adapters::tcp::TcpServer;
use propnode::app::service::NodeService;
use propnode::config::NodeConfig;
use propnode::drivers::ads112c04::{AdcSet, Reference};
use propnode::drivers::bus::{self, SharedI2c};
use propnode::error::ControlError;
use propnode::fsm::ConnectionFsm;
use propnode::pins::ADS_VREF_V;
use propnode::rpc::stream::Executor;
use propnode::sensors::SharedLocalAdc;

fn main() -> Result<()> {
    platform::main()
}

/// Everything after the peripherals exist: scan, build the node, listen.
fn serve<I2C, P>(
    cfg: &NodeConfig,
    bus: SharedI2c<I2C>,
    local: SharedLocalAdc,
    make_pin: impl FnMut(i32) -> Result<P, ControlError>,
    bind: SocketAddr,
    discovery: bool,
    stop: impl Future<Output = ()> + 'static,
) -> Result<()>
where
    I2C: I2c + 'static,
    P: StatefulOutputPin + 'static,
{
    let addresses = bus::scan(&mut bus.clone());
    let adcs = AdcSet::from_scan(&bus, &addresses, Reference::Supply(ADS_VREF_V));
    info!("{} external ADC(s) in use", adcs.len());

    let conf_frame = cfg.conf_frame()?;
    let node = NodeService::from_config(cfg, adcs, &local, make_pin)?;
    let node = Rc::new(RefCell::new(node));
    let listener = TcpServer::bind(bind)?;

    let executor: Executor<'_> = Executor::new();
    let responder = if discovery {
        ssdp::bind()
            .inspect_err(|e| warn!("SSDP unavailable ({e}), discovery disabled"))
            .ok()
            .map(|socket| executor.spawn(ssdp::serve(socket)))
    } else {
        None
    };

    // The FSM runs as a task so it shares the run queue with the stream.
    let mut fsm = ConnectionFsm::new(&executor, listener, node, LogEventSink::new(), conf_frame);
    let server = executor.spawn(async move { fsm.run_until(stop).await });
    futures_lite::future::block_on(executor.run(server));

    // Dropping the task handle cancels the responder and closes its socket.
    drop(responder);
    info!("Stopped");
    Ok(())
}

// ── Host (simulated peripherals) ──────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod platform {
    use core::cell::RefCell;
    use core::net::{IpAddr, SocketAddr};
    use std::path::PathBuf;
    use std::rc::Rc;

    use anyhow::{Context, Result};
    use clap::Parser;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use log::info;

    use propnode::adapters::sim::{SimBus, SimLocalAdc, SimPin};
    use propnode::config::NodeConfig;
    use propnode::drivers::bus::SharedI2c;
    use propnode::pins::TCP_PORT;
    use propnode::sensors::SharedLocalAdc;

    /// Run the node against simulated hardware.
    #[derive(Debug, Parser)]
    #[command(version, about)]
    struct Args {
        /// Device description (ESPConfig.json format).
        #[arg(long, default_value = "config/ESPConfig.json")]
        config: PathBuf,
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(long, default_value_t = TCP_PORT)]
        port: u16,
        /// Do not answer SSDP searches.
        #[arg(long)]
        no_ssdp: bool,
    }

    /// Raised by the Ctrl-C handler thread.
    static INTERRUPT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

    /// Two converters with a fixed code on every input pair.
    fn simulated_bus() -> SimBus {
        let mut bus = SimBus::new();
        for (addr, code) in [(0x40, 0x0400), (0x41, 0x0080)] {
            bus.add_ads(addr);
            for mux in 0..=0x0F {
                bus.set_conversion(addr, mux, code);
            }
        }
        bus
    }

    fn simulated_local_adc() -> SimLocalAdc {
        let mut adc = SimLocalAdc::new();
        for gpio in 1..=10 {
            adc.set(gpio, 1500 + 50 * gpio as u16);
        }
        adc
    }

    pub fn main() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let args = Args::parse();

        info!("propnode v{} (host simulation)", env!("CARGO_PKG_VERSION"));
        let cfg = NodeConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?;

        ctrlc::set_handler(|| {
            info!("Interrupted, closing connections");
            INTERRUPT.signal(());
        })
        .context("installing Ctrl-C handler")?;

        let bus = SharedI2c::new(simulated_bus());
        let local: SharedLocalAdc = Rc::new(RefCell::new(simulated_local_adc()));
        super::serve(
            &cfg,
            bus,
            local,
            |_| Ok(SimPin::new()),
            SocketAddr::new(args.bind, args.port),
            !args.no_ssdp,
            INTERRUPT.wait(),
        )
    }
}

// ── Device (ESP32-S3) ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use core::cell::RefCell;
    use core::net::{IpAddr, SocketAddr};
    use std::rc::Rc;

    use anyhow::Result;
    use embedded_hal::digital::OutputPin;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};

    use propnode::adapters::esp::{GpioOutput, OneshotAdc};
    use propnode::adapters::wifi::{self, Credentials};
    use propnode::config::NodeConfig;
    use propnode::drivers::bus::SharedI2c;
    use propnode::pins::{I2C_FREQ_HZ, TCP_PORT, WIFI_INDICATOR_GPIO};
    use propnode::sensors::SharedLocalAdc;

    const CONFIG_JSON: &str = include_str!("../config/ESPConfig.json");

    pub fn main() -> Result<()> {
        // ── 1. ESP-IDF bootstrap ──────────────────────────────────
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;

        info!("╔══════════════════════════════════════╗");
        info!("║  propnode v{}                     ║", env!("CARGO_PKG_VERSION"));
        info!("╚══════════════════════════════════════╝");

        // ── 2. Config (fatal if invalid) ──────────────────────────
        let cfg = NodeConfig::from_json_str(CONFIG_JSON)?;

        // ── 3. Wi-Fi ──────────────────────────────────────────────
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let mut indicator = GpioOutput::new(WIFI_INDICATOR_GPIO)?;
        let creds = Credentials::from_config(cfg.network.as_ref())?;
        let (_wifi, ip) = wifi::connect(peripherals.modem, sysloop, nvs, &creds)?;
        if indicator.set_high().is_err() {
            warn!("Wi-Fi indicator GPIO{WIFI_INDICATOR_GPIO} write failed");
        }

        // ── 4. I2C bus + on-chip ADC ──────────────────────────────
        // SDA = GPIO15, SCL = GPIO16 (pins::I2C_SDA_GPIO / I2C_SCL_GPIO)
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio15,
            peripherals.pins.gpio16,
            &I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ)),
        )?;
        let local: SharedLocalAdc = Rc::new(RefCell::new(OneshotAdc::new()?));

        // ── 5. Serve forever ──────────────────────────────────────
        super::serve(
            &cfg,
            SharedI2c::new(i2c),
            local,
            GpioOutput::new,
            SocketAddr::new(IpAddr::V4(ip), TCP_PORT),
            true,
            core::future::pending(),
        )
    }
}
