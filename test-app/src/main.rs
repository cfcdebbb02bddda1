// planar-cli -- command-line tool for exercising a Planar QE display over
// TCP, a serial port, or a mock transport.
//
// Usage:
//   planar-cli --host 10.0.0.40:57 power on
//   planar-cli --port /dev/ttyUSB0 --baud 19200 input set 2
//   planar-cli --host 10.0.0.40:57 --config lobby.json input select hdmiIn3
//   planar-cli --mock status
//   planar-cli --host 10.0.0.40:57 monitor --duration 120
//
// Logging honours RUST_LOG, e.g. RUST_LOG=planar_qe=debug.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use planar_core::{CommandOutcome, DisplayControl, DisplayEvent};
use planar_qe::{DeviceConfig, PlanarQe, PlanarQeBuilder};
use planar_test_harness::MockTransport;
use planar_transport::DEFAULT_BAUD_RATE;

/// How long one-shot commands wait for the display to answer.
const REPLY_WINDOW: Duration = Duration::from_millis(750);

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// planar-cli -- exercises a Planar QE display from the command line.
#[derive(Parser)]
#[command(name = "planar-cli", version, about)]
struct Cli {
    /// Display control port as host:port (e.g. 10.0.0.40:57).
    #[arg(long, conflicts_with_all = ["port", "mock"])]
    host: Option<String>,

    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, conflicts_with = "mock")]
    port: Option<String>,

    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Use a simulated display instead of real hardware.
    #[arg(long)]
    mock: bool,

    /// JSON device entry (key, name, properties).
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Power operations.
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },

    /// Input routing operations.
    Input {
        #[command(subcommand)]
        action: InputAction,
    },

    /// Poll power state (and the input, if on) and print the result.
    Status,

    /// Run the communication monitor and print events.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// List the input ports of the configured table.
    Ports,
}

#[derive(Subcommand)]
enum PowerAction {
    On,
    Off,
    Toggle,
    /// Query the power state.
    Get,
}

#[derive(Subcommand)]
enum InputAction {
    /// Route to the input at a 1-based position in the port table.
    Set { number: usize },
    /// Route to the input with a port key (e.g. hdmiIn2).
    Select { key: String },
    /// Step to the next source.
    Toggle,
    /// Query the selected input.
    Get,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

fn builder_for(cli: &Cli) -> Result<PlanarQeBuilder> {
    match cli.config.as_deref() {
        Some(path) => {
            let device = DeviceConfig::from_path(path)
                .with_context(|| format!("failed to load device config from {path}"))?;
            Ok(PlanarQeBuilder::from_device(device))
        }
        None => Ok(PlanarQeBuilder::new()),
    }
}

/// A mock that answers queries the way an idle panel on HDMI 1 does.
fn simulated_display() -> MockTransport {
    let mock = MockTransport::new();
    let handle = mock.handle();
    handle.respond_always_line("SYSTEM.STATE?", "system.state:standby");
    handle.respond_always_line("SOURCE.SELECT?", "source.select:hdmi.1");
    handle.respond_always_line("DISPLAY.POWER=ON", "system.state:powering.on");
    handle.respond_always_line("DISPLAY.POWER=OFF", "system.state:powering.down");
    mock
}

async fn connect(cli: &Cli) -> Result<PlanarQe> {
    let builder = builder_for(cli)?;

    if cli.mock {
        let display = builder
            .build_with_transport(Box::new(simulated_display()))
            .await
            .context("failed to build display with mock transport")?;
        println!("Connected (mock transport) -- {}", display.info().name);
        return Ok(display);
    }

    if let Some(host) = cli.host.as_deref() {
        let display = builder
            .build_tcp(host)
            .await
            .with_context(|| format!("failed to connect to {host}"))?;
        println!("Connected to {host} -- {}", display.info().name);
        return Ok(display);
    }

    if let Some(port) = cli.port.as_deref() {
        let display = builder
            .build_serial(port, cli.baud)
            .await
            .with_context(|| format!("failed to open {port}"))?;
        println!("Connected to {port} at {} baud -- {}", cli.baud, display.info().name);
        return Ok(display);
    }

    bail!("one of --host, --port or --mock is required");
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn report(what: &str, outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Sent => println!("{what}: sent"),
        CommandOutcome::Deferred => println!("{what}: deferred until the display is on"),
        CommandOutcome::Ignored(reason) => println!("{what}: not sent ({reason})"),
    }
}

fn print_state(display: &PlanarQe) {
    println!("Power:  {}", display.power_state());
    match display.current_input() {
        Some(key) => println!("Input:  {key} (#{})", display.current_input_number()),
        None => println!("Input:  unknown"),
    }
    println!("Comms:  {}", display.monitor_status());
}

fn cmd_ports(display: &PlanarQe) {
    println!("{:>3}  {:<16} {:<14} {:<12} token", "#", "key", "name", "signal");
    for (i, port) in display.ports().iter().enumerate() {
        println!(
            "{:>3}  {:<16} {:<14} {:<12} {}",
            i + 1,
            port.key,
            port.display_name,
            port.signal.to_string(),
            port.feedback_token
        );
    }
}

async fn cmd_monitor(display: &PlanarQe, duration_secs: u64) -> Result<()> {
    let mut event_rx = display.subscribe();
    display.initialize();

    println!("Monitoring display events (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            received = tokio::time::timeout(timeout, event_rx.recv()) => match received {
                Ok(Ok(event)) => print_event(&event),
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                    println!("Event channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_event(event: &DisplayEvent) {
    match event {
        DisplayEvent::PowerChanged { on } => println!("[power] on={on}"),
        DisplayEvent::WarmingChanged { warming } => println!("[power] warming={warming}"),
        DisplayEvent::CoolingChanged { cooling } => println!("[power] cooling={cooling}"),
        DisplayEvent::InputChanged { number, key } => {
            println!("[input] #{number} {}", key.as_deref().unwrap_or("-"))
        }
        DisplayEvent::InputFeedback { key, selected } => {
            println!("[input] {key} selected={selected}")
        }
        DisplayEvent::MonitorStatusChanged { status } => println!("[comms] {status}"),
        DisplayEvent::OnlineChanged { online } => println!("[comms] online={online}"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let display = connect(&cli).await?;

    let mut wait_for_reply = true;
    match &cli.command {
        Command::Power { action } => match action {
            PowerAction::On => report("power on", display.power_on()),
            PowerAction::Off => report("power off", display.power_off()),
            PowerAction::Toggle => report("power toggle", display.power_toggle()),
            PowerAction::Get => report("power query", display.power_get()),
        },
        Command::Input { action } => match action {
            InputAction::Set { number } => report("set input", display.set_input(*number)),
            InputAction::Select { key } => report("select input", display.select_input(key)),
            InputAction::Toggle => report("input toggle", display.input_toggle()),
            InputAction::Get => report("input query", display.input_get()),
        },
        Command::Status => display.status_get().await,
        Command::Monitor { duration } => {
            cmd_monitor(&display, *duration).await?;
            wait_for_reply = false;
        }
        Command::Ports => {
            cmd_ports(&display);
            wait_for_reply = false;
        }
    }

    if wait_for_reply {
        tokio::time::sleep(REPLY_WINDOW).await;
        print_state(&display);
    }

    display
        .shutdown()
        .await
        .context("failed to shut down display controller")?;
    Ok(())
}
