mod cli;

use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use cli_vis::source::{CpalSource, MockSource, Signal};
use cli_vis::terminal::CrosstermTerminal;
use cli_vis::{default_input_device_name, list_input_devices, Controller, SessionStats, VisError};

/// Format used by `--demo` when no explicit format is given.
const DEMO_SAMPLE_RATE: u32 = 44100;
const DEMO_CHANNELS: u16 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("cli-vis: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    if cli.list_devices {
        return list_devices();
    }

    // The controller has released the terminal by the time run() returns
    match run(&cli) {
        Ok(stats) => {
            tracing::info!(?stats, "exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("cli-vis: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SessionStats, VisError> {
    let terminal = CrosstermTerminal::new(cli.quit_key);

    if let Some(frequency) = cli.demo {
        let config = cli.pipeline_config(DEMO_SAMPLE_RATE, DEMO_CHANNELS);
        let signal = Signal::Sine {
            frequency,
            amplitude: 0.8,
        };
        let source = MockSource::for_config(signal, &config);
        return Controller::new(config, source, terminal).run();
    }

    let source = CpalSource::open(&cli.device_selection())?;
    let (native_rate, native_channels) = source.native_config()?;
    let config = cli.pipeline_config(native_rate, native_channels);
    tracing::info!(
        "Device native format {} Hz / {} ch, capturing at {} Hz / {} ch",
        native_rate,
        native_channels,
        config.sample_rate,
        config.channels
    );

    Controller::new(config, source, terminal).run()
}

/// Installs the tracing subscriber. Output never goes to the terminal being drawn on.
fn init_logging(cli: &Cli) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false);

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::sink).init(),
    }
    Ok(())
}

fn list_devices() -> ExitCode {
    match list_input_devices() {
        Ok(names) => {
            let default = default_input_device_name();
            for name in names {
                let marker = if default.as_deref() == Some(name.as_str()) { '*' } else { ' ' };
                println!("{marker} {name}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("cli-vis: {e}");
            ExitCode::FAILURE
        }
    }
}
