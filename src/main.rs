// SerialMon - Serial port line monitor
use clap::Parser;
use serialmon::cli::{execute_command, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // The error has already been reported in the requested output format
    if execute_command(args).await.is_err() {
        std::process::exit(1);
    }
}
