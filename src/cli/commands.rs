use crate::cli::args::{Args, Command, MonitorArgs, PortArgs, SendArgs, SettingsCommand};
use crate::cli::monitor::{spawn_stdin_reader, Monitor, HELP_TEXT};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::session::SerialSession;
use crate::core::transcript::LineKind;
use crate::domain::config::{BaudRate, Settings};
use crate::domain::error::{SerialMonError, SerialMonResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{list_ports, LoopbackConnector};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Execute CLI command, reporting a failure through the selected output format
pub async fn execute_command(args: Args) -> SerialMonResult<()> {
    let writer = ConsoleWriter::new(args.output);
    let result = run_command(args, &writer).await;
    if let Err(e) = &result {
        writer.write_error(&e.to_string())?;
    }
    result
}

async fn run_command(args: Args, writer: &ConsoleWriter) -> SerialMonResult<()> {
    let config_manager = match &args.config {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    };
    let loaded = config_manager
        .as_ref()
        .map_err(|e| e.to_string())
        .and_then(|manager| manager.load().map_err(|e| e.to_string()));
    let settings = loaded.clone().unwrap_or_default();

    if !args.quiet {
        init_logging(&settings.log_level, args.verbose)?;
    }
    if let Err(e) = loaded {
        warn!("Using default settings: {}", e);
    }

    match args.command {
        Command::Ports => {
            let ports = list_ports()?;
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Bauds => {
            let rates: Vec<BaudRate> = BaudRate::all().collect();
            writer.write_baud_rates(&rates)?;
            Ok(())
        }
        Command::Monitor(monitor_args) => execute_monitor(monitor_args, &settings).await,
        Command::Send(send_args) => execute_send(send_args, &settings).await,
        Command::Settings(settings_args) => {
            let config_manager = config_manager?;
            execute_settings_command(settings_args.command, writer, settings, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("serialmon {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

async fn execute_monitor(args: MonitorArgs, settings: &Settings) -> SerialMonResult<()> {
    let session = open_session(&args.port, settings)?;
    let poll_interval = poll_interval(&session);
    let log_dir = args
        .log_dir
        .or_else(|| settings.log_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let timestamps = settings.display.timestamps && !args.no_timestamps;

    let mut monitor = Monitor::new(Arc::clone(&session), timestamps, log_dir, io::stdout());
    monitor.emit(LineKind::Info, connected_message(&session))?;
    monitor.emit(LineKind::Info, HELP_TEXT)?;
    if args.log {
        monitor.start_logging()?;
    }

    monitor.run(spawn_stdin_reader(), poll_interval).await
}

async fn execute_send(args: SendArgs, settings: &Settings) -> SerialMonResult<()> {
    let session = open_session(&args.port, settings)?;
    let poll_interval = poll_interval(&session);
    let log_dir = settings.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    let mut monitor = Monitor::new(
        Arc::clone(&session),
        settings.display.timestamps,
        log_dir,
        io::stdout(),
    );
    monitor.emit(LineKind::Info, connected_message(&session))?;
    monitor
        .send_and_listen(&args.lines, poll_interval, Duration::from_millis(args.wait_ms))
        .await
}

fn execute_settings_command(
    command: SettingsCommand,
    writer: &ConsoleWriter,
    mut settings: Settings,
    config_manager: &ConfigManager,
) -> SerialMonResult<()> {
    match command {
        SettingsCommand::Show => {
            writer.write_settings(&settings)?;
        }
        SettingsCommand::Path => {
            writer.write_message(&config_manager.path().display().to_string())?;
        }
        SettingsCommand::Init => {
            config_manager.init()?;
            writer.write_message(&format!(
                "Settings initialized at '{}'",
                config_manager.path().display()
            ))?;
        }
        SettingsCommand::ToggleTheme => {
            let theme = settings.toggle_theme();
            config_manager.save(&settings)?;
            writer.write_message(&format!("Theme set to {}", theme))?;
        }
        SettingsCommand::ToggleTimestamps => {
            let enabled = settings.toggle_timestamps();
            config_manager.save(&settings)?;
            writer.write_message(&format!("Timestamps {}", on_off(enabled)))?;
        }
        SettingsCommand::ToggleAutoScroll => {
            let enabled = settings.toggle_auto_scroll();
            config_manager.save(&settings)?;
            writer.write_message(&format!("Auto-scroll {}", on_off(enabled)))?;
        }
    }
    Ok(())
}

fn open_session(args: &PortArgs, settings: &Settings) -> SerialMonResult<Arc<SerialSession>> {
    let config = args.session_config(settings);
    let session = if args.loopback {
        info!("Using loopback port '{}'", config.port);
        SerialSession::new(LoopbackConnector::with_ports([config.port.clone()]))
    } else {
        SerialSession::system()
    };

    session.open(config).map_err(SerialMonError::from)?;
    Ok(Arc::new(session))
}

fn poll_interval(session: &SerialSession) -> Duration {
    session
        .config()
        .map(|config| config.read_timeout)
        .unwrap_or(Duration::from_millis(1000))
}

fn connected_message(session: &SerialSession) -> String {
    match session.config() {
        Some(config) => format!("Connected to {} at {} bps", config.port, config.baud_rate),
        None => "Not connected to a serial port.".to_string(),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
