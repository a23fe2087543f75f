#![allow(dead_code)]

mod action;
mod config;
mod errors;
mod gpio;
mod irrf;
mod lightbulb;
mod model;
mod net;
mod persistence;
mod rpc;
mod runtime;
mod scheduler;
mod services;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use config::cli::Args;
use config::{ConfigDocument, GeneralConfig};
use gpio::GpioDriver;
use gpio::MemoryGpio;
use net::ReqwestNetworkClient;
use persistence::MemoryStore;
use rpc::NoopTransport;
use runtime::Runtime;

/// One main-loop throttle tick, matching the teacher's own
/// `thread::sleep(time::Duration::from_millis(1))` spin-throttle; the
/// actual per-second/per-minute gating lives inside [`Runtime::tick`].
const LOOP_THROTTLE: Duration = Duration::from_millis(1);

fn setup_tracing() {
    let subscriber = FmtSubscriber::builder().with_max_level(tracing::Level::TRACE).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn load_config(path: &std::path::Path) -> std::result::Result<ConfigDocument, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_str(&contents).map_err(|e| format!("parsing {}: {e}", path.display()))
}

/// Picks the `rppal`-backed driver when the `gpio-driver` feature is on
/// (the default), falling back to the in-memory double for the `demo`
/// feature build or if the hardware can't be claimed (e.g. not actually
/// running on the target board).
fn build_gpio_driver(general: &GeneralConfig) -> Box<dyn GpioDriver> {
    #[cfg(all(feature = "gpio-driver", not(feature = "demo")))]
    {
        match gpio::RppalGpio::new(general.ir_tx_pin, general.ir_tx_inverted, general.rf_tx_pin, general.rf_tx_inverted) {
            Ok(driver) => return Box::new(driver),
            Err(err) => tracing::error!("failed to initialize GPIO hardware: {err}, falling back to in-memory driver"),
        }
    }
    let _ = general;
    Box::new(MemoryGpio::new())
}

fn main() {
    let args = Args::parse();

    // region: SIGNALS
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");
    // endregion SIGNALS

    // region: TRACING
    setup_tracing();

    #[cfg(feature = "demo")]
    tracing::info!("DEMO MODE");
    // endregion TRACING

    tracing::info!("Using config file: {}", args.config.display());

    let doc = match load_config(&args.config) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::error!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    tracing::trace!("Building service registry from {} accessory group(s)", doc.a.len());
    let registry = match config::build_registry(&doc) {
        Ok(registry) => registry,
        Err(err) => {
            tracing::error!("failed to build service registry: {err}");
            std::process::exit(1);
        }
    };
    tracing::debug!("Registry built with {} service(s)", registry.len());

    let gpio = build_gpio_driver(&doc.c);

    // The real NVS/flash-backed store is an out-of-scope collaborator
    // (spec.md §1, §6.1); `MemoryStore` stands in as the concrete
    // backing until it's wired in, the same way `RecordingTransport`
    // stands in for the HAP/mDNS pairing stack.
    let mut runtime = Runtime::new(
        registry,
        doc.c,
        gpio,
        Box::new(ReqwestNetworkClient::new()),
        Box::new(MemoryStore::new()),
        Box::new(NoopTransport),
    );

    if args.force_setup {
        tracing::info!("--force-setup set, entering setup mode on first tick");
        runtime.request_setup_mode();
    }

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        let wall_clock = Local::now();

        if let Err(err) = runtime.tick(now, wall_clock) {
            tracing::error!("tick failed: {err}");
        }

        let requests = runtime.take_system_requests();
        if requests.any() {
            handle_system_requests(requests, &running);
        }

        std::thread::sleep(LOOP_THROTTLE);
    }

    tracing::info!("Got Ctrl-C, exiting...");
}

/// Acts on one tick's worth of process-lifecycle requests (spec.md §4.1
/// step 4). OTA update and Wi-Fi reconnect orchestration are out of
/// scope (spec.md §1); this crate only logs the request. Reboot stops
/// the main loop rather than calling `process::exit` directly, so the
/// Ctrl-C shutdown log line and any in-flight debounce flush still run.
fn handle_system_requests(requests: runtime::SystemRequests, running: &Arc<AtomicBool>) {
    if requests.enter_setup_mode {
        tracing::info!("entering setup mode");
    }
    if requests.start_ota_update {
        tracing::info!("OTA update requested (orchestration out of scope, logging only)");
    }
    if requests.wifi_reconnect {
        tracing::info!("Wi-Fi reconnect requested (orchestration out of scope, logging only)");
    }
    if requests.reboot {
        tracing::warn!("reboot requested, stopping main loop");
        running.store(false, Ordering::SeqCst);
    }
}
