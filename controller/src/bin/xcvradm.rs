// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

use anyhow::bail;
use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use itertools::Itertools;
use media_controller::config::Family;
use media_controller::config::MODULE_ALWAYS_ENABLED;
use media_controller::gpio::LatchPinGroup;
use media_controller::media;
use media_controller::sim;
use media_controller::sim::SimBus;
use media_controller::Bus;
use media_controller::DeviceConfig;
use media_controller::Error;
use media_controller::PinGroupHandle;
use media_controller::PinGroupRegistry;
use media_controller::Resource;
use media_messages::media::ChannelMonitor;
use media_messages::media::ModuleMonitor;
use media_messages::media::Threshold;
use media_messages::media::VendorField;
use media_messages::EepromAddress;
use media_messages::ADDR_A0;
use slog::Drain;
use slog::Level;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::Table;
use tabled::Tabled;

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|_| String::from("invalid log level"))
}

fn parse_family(s: &str) -> Result<Family, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, found '{s}'"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("invalid byte '{s}'"))
}

/// A module installed in the simulator.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum SimModule {
    Sfp,
    TunableSfp,
    Qsfp28,
    QsfpDd,
}

impl SimModule {
    fn family(&self) -> Family {
        match self {
            SimModule::Sfp | SimModule::TunableSfp => Family::Sfp,
            SimModule::Qsfp28 => Family::Qsfp,
            SimModule::QsfpDd => Family::QsfpDD,
        }
    }

    fn install(&self, sim: &SimBus) {
        match self {
            SimModule::Sfp => sim::install_sfp(sim),
            SimModule::TunableSfp => sim::install_tunable_sfp(sim),
            SimModule::Qsfp28 => sim::install_qsfp28(sim, ADDR_A0),
            SimModule::QsfpDd => sim::install_qsfp_dd(sim, ADDR_A0, 0x30),
        }
    }
}

/// Administer pluggable transceiver modules.
///
/// This tool drives one cage, either on a Linux I2C adapter or against a
/// simulated module. The cage is described by the same attributes used in
/// platform configuration, given as `-A key=value`.
#[derive(Parser)]
#[command(version, about, long_about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// The driver family of the cage: sfp, qsfp or qsfp-dd.
    #[arg(short, long, value_parser = parse_family)]
    family: Option<Family>,

    /// The I2C adapter number, opened as /dev/i2c-N.
    #[arg(short, long, conflicts_with = "sim")]
    adapter: Option<u32>,

    /// Run against a simulated module instead of hardware.
    #[arg(long, value_enum)]
    sim: Option<SimModule>,

    /// A device attribute, as key=value.
    #[arg(short = 'A', long = "attr", value_parser = parse_key_value)]
    attrs: Vec<(String, String)>,

    /// A strapped pin group and its level, as name=level.
    #[arg(short, long = "pins", value_parser = parse_key_value)]
    pins: Vec<(String, String)>,

    /// The log-level.
    #[arg(
        short,
        long,
        default_value_t = Level::Info,
        value_parser = parse_log_level
    )]
    log_level: Level,
}

#[derive(Subcommand)]
enum Cmd {
    /// Report whether a module is inserted.
    Presence,

    /// Print the vendor information and capabilities of the module.
    Identity,

    /// Print the module and channel monitors.
    Monitors,

    /// Print the alarm and warning thresholds of the module.
    Thresholds,

    /// Read bytes of module memory.
    Read {
        offset: u8,
        len: u8,
        /// The page to select, if the module is paged.
        #[arg(short, long)]
        page: Option<u8>,
        /// An explicit device address, such as 0x51.
        #[arg(short, long, value_parser = parse_byte)]
        device: Option<u8>,
    },

    /// Write bytes of module memory.
    Write {
        offset: u8,
        #[arg(required = true, value_parser = parse_byte)]
        data: Vec<u8>,
        #[arg(short, long)]
        page: Option<u8>,
        #[arg(short, long, value_parser = parse_byte)]
        device: Option<u8>,
    },

    /// Enable or disable the transmitter of a channel.
    Tx {
        channel: u8,
        #[arg(value_enum)]
        state: TxState,
    },

    /// Tune the module to a wavelength, in nanometers.
    Wavelength { nm: f64 },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TxState {
    On,
    Off,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl Row {
    fn new(field: impl ToString, value: Result<String, Error>) -> Self {
        let value = match value {
            Ok(v) => v,
            Err(e) if e.is_not_supported() => String::from("-"),
            Err(e) => format!("error: {e}"),
        };
        Self {
            field: field.to_string(),
            value,
        }
    }
}

fn print_rows(rows: Vec<Row>) {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn address(offset: u8, page: Option<u8>, device: Option<u8>) -> EepromAddress {
    let addr = match page {
        Some(page) => EepromAddress::paged(page, offset),
        None => EepromAddress::unpaged(offset),
    };
    match device {
        Some(device) => addr.with_device(device),
        None => addr,
    }
}

fn build_resource(args: &Args, log: &slog::Logger) -> anyhow::Result<Resource> {
    let family = match (args.family, args.sim) {
        (Some(family), _) => family,
        (None, Some(module)) => module.family(),
        (None, None) => bail!("a driver family is required without --sim"),
    };

    let mut attrs: BTreeMap<String, String> = args.attrs.iter().cloned().collect();
    let mut pins: BTreeMap<String, String> = args.pins.iter().cloned().collect();
    if let Some(module) = args.sim {
        attrs
            .entry(String::from("mod_sel_bus"))
            .or_insert_with(|| String::from(MODULE_ALWAYS_ENABLED));
        attrs
            .entry(String::from("mod_pres_bus"))
            .or_insert_with(|| String::from("present"));
        attrs
            .entry(String::from("mod_pres_bitmask"))
            .or_insert_with(|| String::from("0"));
        if matches!(module, SimModule::QsfpDd) {
            attrs
                .entry(String::from("port_type"))
                .or_insert_with(|| String::from("QSFP28-DD-1"));
        }
        pins.entry(String::from("present"))
            .or_insert_with(|| String::from("1"));
    }

    let mut registry = PinGroupRegistry::new();
    for (name, level) in &pins {
        let level = match level.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => level.parse(),
        }
        .with_context(|| format!("invalid level for pin group '{name}'"))?;
        registry.insert(PinGroupHandle::new(name, LatchPinGroup::new(level)));
    }

    let config = DeviceConfig::from_attributes("xcvr", family, &attrs, &registry)
        .context("invalid device attributes")?;

    let bus = match (args.sim, args.adapter) {
        (Some(module), _) => {
            let sim = SimBus::new();
            module.install(&sim);
            Bus::new("sim", sim)
        }
        (None, Some(adapter)) => open_adapter(adapter)?,
        (None, None) => bail!("one of --adapter or --sim is required"),
    };
    Ok(Resource::register(bus, config, log))
}

#[cfg(target_os = "linux")]
fn open_adapter(adapter: u32) -> anyhow::Result<Bus> {
    let i2c = media_controller::linux::LinuxI2c::open_adapter(adapter)
        .with_context(|| format!("failed to open I2C adapter {adapter}"))?;
    Ok(Bus::new(format!("i2c-{adapter}"), i2c))
}

#[cfg(not(target_os = "linux"))]
fn open_adapter(_adapter: u32) -> anyhow::Result<Bus> {
    bail!("I2C adapters are only supported on Linux")
}

fn identity(res: &Resource) -> Vec<Row> {
    let mut rows: Vec<Row> = VendorField::ALL
        .iter()
        .map(|field| Row::new(field, media::vendor_info(res, *field)))
        .collect();
    rows.push(Row::new(
        "Compliance",
        media::transceiver_code(res).map(|c| format!("{c:?}")),
    ));
    rows.push(Row::new("Speed", media::speed(res).map(|s| s.to_string())));
    rows.push(Row::new(
        "Features",
        media::feature_support(res).map(|f| format!("{f:?}")),
    ));
    rows.push(Row::new(
        "Module",
        media::module_info(res).map(|m| format!("{m:?}")),
    ));
    rows
}

fn monitors(res: &Resource) -> Vec<Row> {
    let mut rows = vec![
        Row::new(
            "Temperature (C)",
            media::module_monitor(res, ModuleMonitor::Temperature).map(|v| format!("{v:.2}")),
        ),
        Row::new(
            "Voltage (V)",
            media::module_monitor(res, ModuleMonitor::Voltage).map(|v| format!("{v:.3}")),
        ),
    ];
    let channel_monitors = [
        (ChannelMonitor::RxPower, "rx power (dBm)"),
        (ChannelMonitor::TxPower, "tx power (dBm)"),
        (ChannelMonitor::TxBias, "tx bias (mA)"),
    ];
    for channel in 0..u8::MAX {
        for (monitor, label) in channel_monitors {
            match media::channel_monitor(res, channel, monitor) {
                Err(Error::InvalidArgument(_)) => return rows,
                result => rows.push(Row::new(
                    format!("ch{channel} {label}"),
                    result.map(|v| format!("{v:.3}")),
                )),
            }
        }
    }
    rows
}

fn thresholds(res: &Resource) -> Vec<Row> {
    Threshold::ALL
        .iter()
        .map(|t| {
            Row::new(
                format!("{t:?}"),
                media::threshold(res, *t).map(|v| format!("{v:.3}")),
            )
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, args.log_level).fuse();
    let log = slog::Logger::root(drain, slog::o!());

    if let Err(e) = usdt::register_probes() {
        slog::warn!(log, "failed to register DTrace probes"; "reason" => ?e);
    }

    let mut res = build_resource(&args, &log)?;
    let present = media::presence(&res).context("failed to read presence")?;
    if let Cmd::Presence = args.cmd {
        println!("{}", if present { "present" } else { "absent" });
        return Ok(());
    }
    if !present {
        bail!("no module present");
    }
    media::module_init(&mut res, true).context("failed to initialize module")?;

    match args.cmd {
        Cmd::Presence => {}
        Cmd::Identity => print_rows(identity(&res)),
        Cmd::Monitors => print_rows(monitors(&res)),
        Cmd::Thresholds => print_rows(thresholds(&res)),
        Cmd::Read {
            offset,
            len,
            page,
            device,
        } => {
            let addr = address(offset, page, device);
            let mut buf = vec![0u8; usize::from(len)];
            media::read_generic(&res, addr, &mut buf)
                .with_context(|| format!("failed to read {len} bytes at {addr}"))?;
            for (i, chunk) in buf.chunks(16).enumerate() {
                let line = chunk.iter().map(|b| format!("{b:02x}")).join(" ");
                println!("{:#04x}: {line}", usize::from(offset) + 16 * i);
            }
        }
        Cmd::Write {
            offset,
            data,
            page,
            device,
        } => {
            let addr = address(offset, page, device);
            media::write_generic(&res, addr, &data)
                .with_context(|| format!("failed to write {} bytes at {addr}", data.len()))?;
        }
        Cmd::Tx { channel, state } => {
            let enable = matches!(state, TxState::On);
            media::tx_control(&res, channel, enable)
                .with_context(|| format!("failed to set transmitter of channel {channel}"))?;
            let status = media::tx_control_status(&res, channel)?;
            println!("channel {channel}: {}", if status { "on" } else { "off" });
        }
        Cmd::Wavelength { nm } => {
            media::wavelength_set(&res, nm)
                .with_context(|| format!("failed to tune to {nm} nm"))?;
        }
    }
    Ok(())
}
