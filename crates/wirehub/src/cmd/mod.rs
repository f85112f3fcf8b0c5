use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod host;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a host and print the messages its server receives.
    Host(HostArgs),
    /// Connect to a host and send a single message.
    Send(SendArgs),
    /// Start a host and a client in-process and broadcast a greeting.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Host(args) => host::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct HostArgs {
    /// Port to listen on. 0 picks a free port.
    #[arg(long, short = 'p', default_value = "50240", allow_negative_numbers = true)]
    pub port: i64,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
    /// Message types to print (comma-separated).
    #[arg(long = "types", short = 't', value_delimiter = ',', default_value = "GenericMessage")]
    pub types: Vec<String>,
    /// Rebroadcast every printed message to all entities.
    #[arg(long)]
    pub relay: bool,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Host name or address of the server.
    pub host: String,
    /// Server port.
    #[arg(allow_negative_numbers = true)]
    pub port: i64,
    /// Message type name.
    #[arg(long = "type", short = 't', default_value = "GenericMessage")]
    pub message_type: String,
    /// Text body, written as a single string.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub text: Option<String>,
    /// JSON body, validated then written as a single string.
    #[arg(long, conflicts_with_all = ["text", "file"])]
    pub json: Option<String>,
    /// Raw body bytes read from a file.
    #[arg(long, conflicts_with_all = ["text", "json"])]
    pub file: Option<PathBuf>,
    /// Wait for one message back from the server and print it.
    #[arg(long)]
    pub wait: bool,
    /// Message type to wait for. Defaults to --type.
    #[arg(long, requires = "wait")]
    pub wait_type: Option<String>,
    /// Maximum time to wait for a reply, or for the send to reach the socket (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Port for the demo host. 0 picks a free port.
    #[arg(long, short = 'p', default_value = "50240", allow_negative_numbers = true)]
    pub port: i64,
    /// Greeting the host broadcasts.
    #[arg(long, default_value = "Hello clients from server!")]
    pub message: String,
    /// How long to wait for deliveries (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Port for a listener: 0 is allowed and lets the OS choose.
pub(crate) fn listen_port(port: i64) -> CliResult<u16> {
    if port == 0 {
        return Ok(0);
    }
    wirehub_transport::validate_port(port)
        .map_err(|err| crate::exit::transport_error("invalid port", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("  ").is_err());
    }

    #[test]
    fn listen_port_allows_zero_but_not_out_of_range() {
        assert_eq!(listen_port(0).unwrap(), 0);
        assert_eq!(listen_port(50240).unwrap(), 50240);
        assert_eq!(listen_port(-1).unwrap_err().code, USAGE);
        assert_eq!(listen_port(65_536).unwrap_err().code, USAGE);
    }
}
