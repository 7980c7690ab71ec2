use crate::cli::args::OutputFormat;
use crate::domain::config::{BaudRate, Settings};
use crate::infrastructure::serial::PortDescriptor;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortDescriptor]) -> Result<(), OutputError>;
    fn write_baud_rates(&self, rates: &[BaudRate]) -> Result<(), OutputError>;
    fn write_settings(&self, settings: &Settings) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
}

impl From<OutputError> for crate::domain::error::SerialMonError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortDescriptor]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                    return Ok(());
                }
                println!("Available serial ports:");
                for port in ports {
                    match &port.description {
                        Some(desc) => println!("  {} [{}] {}", port.name, port.kind, desc),
                        None => println!("  {} [{}]", port.name, port.kind),
                    }
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(ports)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                if !ports.is_empty() {
                    let table_data: Vec<PortTableRow> =
                        ports.iter().map(PortTableRow::from).collect();
                    let table = Table::new(table_data);
                    println!("{}", table);
                }
            }
            OutputFormat::Csv => {
                print!("{}", ports_csv(ports));
            }
        }
        Ok(())
    }

    fn write_baud_rates(&self, rates: &[BaudRate]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<u32> = rates.iter().map(|r| r.value()).collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
            OutputFormat::Table => {
                let table_data: Vec<BaudTableRow> = rates
                    .iter()
                    .map(|r| BaudTableRow {
                        baud: r.value(),
                        default: *r == BaudRate::DEFAULT,
                    })
                    .collect();
                println!("{}", Table::new(table_data));
            }
            OutputFormat::Text | OutputFormat::Csv => {
                for rate in rates {
                    println!("{}", rate);
                }
            }
        }
        Ok(())
    }

    fn write_settings(&self, settings: &Settings) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("SerialMon Settings:");
                println!("  Theme: {}", settings.display.theme);
                println!("  Auto-scroll: {}", settings.display.auto_scroll);
                println!("  Timestamps: {}", settings.display.timestamps);
                println!("  Default baud rate: {}", settings.serial.baud_rate);
                println!("  Read timeout: {}ms", settings.serial.read_timeout_ms);
                println!("  Line ending: {:?}", settings.serial.line_ending);
                println!("  Log level: {}", settings.log_level);
                match &settings.log_dir {
                    Some(dir) => println!("  Log directory: {}", dir.display()),
                    None => println!("  Log directory: (current directory)"),
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(settings)?;
                println!("{}", output);
            }
            OutputFormat::Table | OutputFormat::Csv => {
                print!("{}", toml::to_string_pretty(settings)?);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for port listing
#[derive(Tabled)]
struct PortTableRow {
    port: String,
    kind: String,
    description: String,
}

impl From<&PortDescriptor> for PortTableRow {
    fn from(port: &PortDescriptor) -> Self {
        Self {
            port: port.name.clone(),
            kind: port.kind.to_string(),
            description: port.description.clone().unwrap_or_default(),
        }
    }
}

/// Table row for baud rate listing
#[derive(Tabled)]
struct BaudTableRow {
    baud: u32,
    default: bool,
}

fn ports_csv(ports: &[PortDescriptor]) -> String {
    let mut csv = "name,kind,description\n".to_string();
    for port in ports {
        csv.push_str(&format!(
            "{},{},{}\n",
            csv_field(&port.name),
            port.kind,
            csv_field(port.description.as_deref().unwrap_or(""))
        ));
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
