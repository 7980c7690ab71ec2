use crate::domain::config::{
    BaudRate, FlowControlConfig, LineEnding, ParityConfig, SessionConfig, Settings,
};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for SerialMon
#[derive(Parser, Debug)]
#[command(
    name = "serialmon",
    version = env!("CARGO_PKG_VERSION"),
    about = "Line-oriented serial port monitor",
    long_about = "Open a serial port, watch incoming text lines, send lines back, with optional timestamps and file logging."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress diagnostic logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports
    Ports,
    /// List supported baud rates
    Bauds,
    /// Open a port and monitor it interactively
    Monitor(MonitorArgs),
    /// Send lines to a port and print the replies
    Send(SendArgs),
    /// Settings management commands
    Settings(SettingsArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Port selection and framing shared by commands that open a port
#[derive(ClapArgs, Debug, Clone)]
pub struct PortArgs {
    /// Serial port path, e.g. /dev/ttyUSB0 or COM3
    #[arg(short, long)]
    pub port: String,

    /// Baud rate [default: from settings, else 9600]
    #[arg(short, long, value_parser = parse_baud_rate)]
    pub baud: Option<BaudRate>,

    /// Data bits
    #[arg(long, default_value = "8")]
    pub data_bits: u8,

    /// Stop bits
    #[arg(long, default_value = "1")]
    pub stop_bits: u8,

    /// Parity (none, even, odd)
    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParityArg,

    /// Flow control (none, software, hardware)
    #[arg(long, value_enum, default_value = "none")]
    pub flow_control: FlowControlArg,

    /// Terminator appended to sent lines [default: from settings, else lf]
    #[arg(long, value_enum)]
    pub line_ending: Option<LineEndingArg>,

    /// Read timeout in milliseconds [default: from settings, else 1000]
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Use an in-memory loopback port that echoes every sent line
    #[arg(long)]
    pub loopback: bool,
}

impl PortArgs {
    /// Merge command line values over the persisted defaults
    pub fn session_config(&self, settings: &Settings) -> SessionConfig {
        let defaults = &settings.serial;
        let line_ending = self
            .line_ending
            .map(LineEnding::from)
            .unwrap_or(defaults.line_ending);
        let timeout_ms = self.timeout_ms.unwrap_or(defaults.read_timeout_ms);

        let mut config = SessionConfig::new(&self.port, self.baud.unwrap_or(defaults.baud_rate))
            .with_read_timeout(Duration::from_millis(timeout_ms))
            .with_line_ending(line_ending);
        config.data_bits = self.data_bits;
        config.stop_bits = self.stop_bits;
        config.parity = self.parity.clone().into();
        config.flow_control = self.flow_control.clone().into();
        config
    }
}

/// Interactive monitor arguments
#[derive(ClapArgs, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArgs,

    /// Start logging to a file right away
    #[arg(short, long)]
    pub log: bool,

    /// Directory for log files [default: from settings, else current directory]
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Hide timestamps regardless of settings
    #[arg(long)]
    pub no_timestamps: bool,
}

/// One-shot send arguments
#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,

    /// Lines to send, in order
    #[arg(required = true)]
    pub lines: Vec<String>,

    /// How long to keep listening for replies, in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub wait_ms: u64,
}

/// Settings management arguments
#[derive(ClapArgs, Debug)]
pub struct SettingsArgs {
    /// Settings subcommand
    #[command(subcommand)]
    pub command: SettingsCommand,
}

/// Settings management subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show current settings
    Show,
    /// Print the settings file location
    Path,
    /// Write a default settings file
    Init,
    /// Switch between light and dark theme
    ToggleTheme,
    /// Turn timestamps on or off
    ToggleTimestamps,
    /// Turn auto-scroll on or off
    ToggleAutoScroll,
}

/// Parity configuration argument
#[derive(ValueEnum, Debug, Clone)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Flow control configuration argument
#[derive(ValueEnum, Debug, Clone)]
pub enum FlowControlArg {
    None,
    Software,
    Hardware,
}

/// Line ending argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LineEndingArg {
    Lf,
    Crlf,
    Cr,
}

fn parse_baud_rate(value: &str) -> Result<BaudRate, String> {
    value.parse()
}

impl From<ParityArg> for ParityConfig {
    fn from(parity: ParityArg) -> Self {
        match parity {
            ParityArg::None => Self::None,
            ParityArg::Even => Self::Even,
            ParityArg::Odd => Self::Odd,
        }
    }
}

impl From<FlowControlArg> for FlowControlConfig {
    fn from(flow_control: FlowControlArg) -> Self {
        match flow_control {
            FlowControlArg::None => Self::None,
            FlowControlArg::Software => Self::Software,
            FlowControlArg::Hardware => Self::Hardware,
        }
    }
}

impl From<LineEndingArg> for LineEnding {
    fn from(line_ending: LineEndingArg) -> Self {
        match line_ending {
            LineEndingArg::Lf => Self::Lf,
            LineEndingArg::Crlf => Self::CrLf,
            LineEndingArg::Cr => Self::Cr,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
