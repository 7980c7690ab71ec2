use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::error::SessionError;

/// Baud rates offered for selection, slowest first
pub const STANDARD_BAUD_RATES: [u32; 17] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200,
];

/// A baud rate drawn from [`STANDARD_BAUD_RATES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    pub const DEFAULT: BaudRate = BaudRate(9600);

    /// Every supported rate
    pub fn all() -> impl Iterator<Item = BaudRate> {
        STANDARD_BAUD_RATES.iter().copied().map(BaudRate)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if STANDARD_BAUD_RATES.contains(&value) {
            Ok(BaudRate(value))
        } else {
            Err(format!("Unsupported baud rate: {}", value))
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.0
    }
}

impl std::str::FromStr for BaudRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid baud rate: {}", s))?;
        BaudRate::try_from(value)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

/// Terminator appended to every written line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// Parameters fixed for the lifetime of one open session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Platform device identifier, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: BaudRate,
    /// Upper bound for one blocking read on the device
    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    #[serde(default)]
    pub line_ending: LineEnding,
}

impl SessionConfig {
    /// 8N1 with no flow control and a one second read timeout
    pub fn new(port: impl Into<String>, baud_rate: BaudRate) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: Duration::from_millis(default_read_timeout_ms()),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::None,
            flow_control: FlowControlConfig::None,
            line_ending: LineEnding::Lf,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Reject framing the serial driver cannot express
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.port.trim().is_empty() {
            return Err(SessionError::open(&self.port, "No port selected"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(SessionError::open(
                &self.port,
                format!("Invalid data bits: {}", self.data_bits),
            ));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(SessionError::open(
                &self.port,
                format!("Invalid stop bits: {}", self.stop_bits),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(SessionError::open(&self.port, "Read timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Colour scheme preference of the consuming shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Persisted settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub serial: SerialDefaults,
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for log files, current directory when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Display flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

/// Defaults applied when the command line leaves a value out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialDefaults {
    #[serde(default)]
    pub baud_rate: BaudRate,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub line_ending: LineEnding,
}

impl Settings {
    pub fn toggle_theme(&mut self) -> Theme {
        self.display.theme = match self.display.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.display.theme
    }

    pub fn toggle_timestamps(&mut self) -> bool {
        self.display.timestamps = !self.display.timestamps;
        self.display.timestamps
    }

    pub fn toggle_auto_scroll(&mut self) -> bool {
        self.display.auto_scroll = !self.display.auto_scroll;
        self.display.auto_scroll
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            auto_scroll: true,
            timestamps: true,
        }
    }
}

impl Default for SerialDefaults {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::DEFAULT,
            read_timeout_ms: default_read_timeout_ms(),
            line_ending: LineEnding::Lf,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_validation() {
        for rate in STANDARD_BAUD_RATES {
            assert_eq!(BaudRate::try_from(rate).unwrap().value(), rate);
        }
        assert!(BaudRate::try_from(14400).is_err());
        assert!(BaudRate::try_from(0).is_err());
        assert!("115200".parse::<BaudRate>().is_ok());
        assert!("fast".parse::<BaudRate>().is_err());
    }

    #[test]
    fn test_baud_rate_all_is_ordered() {
        let rates: Vec<u32> = BaudRate::all().map(BaudRate::value).collect();
        assert_eq!(rates.len(), 17);
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let toml_str = toml::to_string(&settings).unwrap();
        let deserialized: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_settings_partial_file_uses_defaults() {
        let settings: Settings = toml::from_str("[display]\ntheme = \"dark\"\n").unwrap();
        assert_eq!(settings.display.theme, Theme::Dark);
        assert!(settings.display.timestamps);
        assert!(settings.display.auto_scroll);
        assert_eq!(settings.serial.baud_rate, BaudRate::DEFAULT);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_settings_reject_nonstandard_baud() {
        let result: Result<Settings, _> = toml::from_str("[serial]\nbaud_rate = 12345\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_toggles() {
        let mut settings = Settings::default();
        assert_eq!(settings.toggle_theme(), Theme::Dark);
        assert_eq!(settings.toggle_theme(), Theme::Light);
        assert!(!settings.toggle_timestamps());
        assert!(!settings.toggle_auto_scroll());
    }

    #[test]
    fn test_session_config_validation() {
        let config = SessionConfig::new("/dev/ttyUSB0", BaudRate::DEFAULT);
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.data_bits = 9;
        assert!(matches!(bad.validate(), Err(SessionError::Open { .. })));

        let mut bad = config.clone();
        bad.stop_bits = 3;
        assert!(bad.validate().is_err());

        let bad = config.clone().with_read_timeout(Duration::ZERO);
        assert!(bad.validate().is_err());

        let bad = SessionConfig::new("  ", BaudRate::DEFAULT);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_session_config_toml() {
        let config = SessionConfig::new("COM3", BaudRate::try_from(115200).unwrap())
            .with_read_timeout(Duration::from_millis(250))
            .with_line_ending(LineEnding::CrLf);
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("read_timeout = 250"));
        let deserialized: SessionConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
