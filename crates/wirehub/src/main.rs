mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wirehub", version, about = "Typed TCP messaging host and client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "wirehub",
            "send",
            "127.0.0.1",
            "50240",
            "--type",
            "Chat",
            "--text",
            "hello",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.port, 50240);
                assert_eq!(args.message_type, "Chat");
                assert_eq!(args.text.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_accepts_negative_port_for_validation() {
        let cli = Cli::try_parse_from(["wirehub", "send", "localhost", "-1"])
            .expect("negative port should reach validation");
        assert!(matches!(cli.command, Command::Send(ref args) if args.port == -1));
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "wirehub",
            "send",
            "127.0.0.1",
            "50240",
            "--json",
            "{\"x\":1}",
            "--text",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn wait_type_requires_wait() {
        let err = Cli::try_parse_from([
            "wirehub",
            "send",
            "127.0.0.1",
            "50240",
            "--wait-type",
            "Reply",
        ])
        .expect_err("--wait-type alone should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_host_types_list() {
        let cli = Cli::try_parse_from([
            "wirehub", "host", "--port", "0", "--types", "Chat,Status", "--relay",
        ])
        .expect("host args should parse");
        match cli.command {
            Command::Host(args) => {
                assert_eq!(args.port, 0);
                assert_eq!(args.types, vec!["Chat".to_string(), "Status".to_string()]);
                assert!(args.relay);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "wirehub",
            "demo",
            "--format",
            "json",
            "--log-level",
            "off",
        ])
        .expect("global flags should parse after the subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Off));
    }
}
