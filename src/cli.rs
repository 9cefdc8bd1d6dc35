use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use cli_vis::{DeviceSelection, PipelineConfig, Scaling, WindowFunction};

/// Bar height mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScaleMode {
    /// Magnitude times --gain
    Linear,
    /// Decibels above --floor-db
    Db,
}

#[derive(Parser, Debug)]
#[command(name = "cli-vis", version, about = "Live audio spectrum analyzer for the terminal")]
pub struct Cli {
    /// Transform window size in samples (power of two)
    #[arg(short = 'n', long, default_value_t = 1024)]
    pub window_size: usize,

    /// Capture sample rate in Hz [default: device native]
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Capture channel count [default: device native]
    #[arg(long)]
    pub channels: Option<u16>,

    /// Window function applied before the transform
    #[arg(long, value_enum, default_value_t = WindowFunction::Hann)]
    pub window: WindowFunction,

    /// Bar height scale
    #[arg(long, value_enum, default_value_t = ScaleMode::Db)]
    pub scale: ScaleMode,

    /// Gain for the linear scale
    #[arg(long, default_value_t = 1.0)]
    pub gain: f32,

    /// Level in dB shown as an empty bar (db scale)
    #[arg(long, default_value_t = -80.0, allow_negative_numbers = true)]
    pub floor_db: f32,

    /// Frames buffered between capture and display
    #[arg(long, default_value_t = 8)]
    pub queue_capacity: usize,

    /// Display refresh rate
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Capture from the input device with this name
    #[arg(short, long, conflicts_with = "output_device")]
    pub device: Option<String>,

    /// Capture what the default output device plays (loopback hosts only)
    #[arg(long)]
    pub output_device: bool,

    /// Character used to draw bars
    #[arg(long, default_value_t = '|')]
    pub glyph: char,

    /// Key that quits (Esc and Ctrl-C always do)
    #[arg(long, default_value_t = 'q')]
    pub quit_key: char,

    /// Show a synthetic tone at this frequency instead of capturing
    #[arg(long, value_name = "HZ")]
    pub demo: Option<f64>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Write logs to this file (logs are discarded otherwise)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn scaling(&self) -> Scaling {
        match self.scale {
            ScaleMode::Linear => Scaling::Linear { gain: self.gain },
            ScaleMode::Db => Scaling::Decibel {
                floor_db: self.floor_db,
            },
        }
    }

    pub fn device_selection(&self) -> DeviceSelection {
        match (&self.device, self.output_device) {
            (Some(name), _) => DeviceSelection::ByName(name.clone()),
            (None, true) => DeviceSelection::DefaultOutput,
            (None, false) => DeviceSelection::DefaultInput,
        }
    }

    /// Builds the run configuration; explicit flags win over the device's native format.
    pub fn pipeline_config(&self, native_rate: u32, native_channels: u16) -> PipelineConfig {
        PipelineConfig {
            window_size: self.window_size,
            sample_rate: self.sample_rate.unwrap_or(native_rate),
            channels: self.channels.unwrap_or(native_channels),
            window: self.window,
            scaling: self.scaling(),
            queue_capacity: self.queue_capacity,
            fps: self.fps,
            device: self.device_selection(),
            glyph: self.glyph,
            quit_key: self.quit_key,
            ..Default::default()
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cli-vis").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_pipeline_defaults() {
        let cli = parse(&[]);
        let config = cli.pipeline_config(48000, 2);
        let defaults = PipelineConfig::default();

        assert_eq!(config.window_size, defaults.window_size);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.window, defaults.window);
        assert_eq!(config.scaling, defaults.scaling);
        assert_eq!(config.queue_capacity, defaults.queue_capacity);
        assert_eq!(config.fps, defaults.fps);
        assert_eq!(config.device, DeviceSelection::DefaultInput);
        assert_eq!(config.glyph, '|');
        assert_eq!(config.quit_key, 'q');
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_explicit_format_overrides_native() {
        let cli = parse(&["--sample-rate", "22050", "--channels", "1"]);
        let config = cli.pipeline_config(48000, 2);
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_linear_scale_and_window() {
        let cli = parse(&["--scale", "linear", "--gain", "4", "--window", "blackman", "-n", "2048"]);
        let config = cli.pipeline_config(44100, 2);
        assert_eq!(config.scaling, Scaling::Linear { gain: 4.0 });
        assert_eq!(config.window, WindowFunction::Blackman);
        assert_eq!(config.window_size, 2048);
    }

    #[test]
    fn test_negative_floor() {
        let cli = parse(&["--floor-db", "-60"]);
        assert_eq!(cli.scaling(), Scaling::Decibel { floor_db: -60.0 });
    }

    #[test]
    fn test_device_selection() {
        assert_eq!(
            parse(&["--device", "USB Mic"]).device_selection(),
            DeviceSelection::ByName("USB Mic".to_string())
        );
        assert_eq!(parse(&["--output-device"]).device_selection(), DeviceSelection::DefaultOutput);
        assert!(Cli::try_parse_from(["cli-vis", "--device", "x", "--output-device"]).is_err());
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["-v"]).log_level(), "debug");
        assert_eq!(parse(&["-vv"]).log_level(), "trace");
    }

    #[test]
    fn test_demo_and_glyph() {
        let cli = parse(&["--demo", "440", "--glyph", "#", "--quit-key", "x"]);
        assert_eq!(cli.demo, Some(440.0));
        assert_eq!(cli.pipeline_config(44100, 2).glyph, '#');
        assert_eq!(cli.quit_key, 'x');
    }
}
