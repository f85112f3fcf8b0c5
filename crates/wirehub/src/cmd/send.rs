use std::fs;
use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::info;
use wirehub_message::{MessageTypeRegistry, MessageWriter};
use wirehub_peer::{Client, ClientConfig};
use wirehub_transport::validate_port;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    io_error, message_error, peer_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT,
    USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let port = validate_port(args.port).map_err(|err| transport_error("invalid port", err))?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let registry = Arc::new(MessageTypeRegistry::new());
    let message = build_message(&registry, &args)?;
    let client = Client::with_config(
        Arc::clone(&registry),
        ClientConfig::default().with_connect_timeout(Some(connect_timeout)),
    );

    // Subscribe before connecting so a fast reply is not missed.
    let (reply_tx, reply_rx) = bounded(1);
    if args.wait {
        let reply_type = registry.get(args.wait_type.as_deref().unwrap_or(&args.message_type));
        client.message_received().subscribe(&reply_type, move |reader| {
            let _ = reply_tx.try_send(reader.clone());
        });
    }

    client
        .connect(&args.host, port)
        .map_err(|err| peer_error("connect failed", err))?;
    client
        .send_to_server(&message)
        .map_err(|err| peer_error("send failed", err))?;
    info!(
        message_type = %message.message_type(),
        size = message.body_len(),
        "message sent"
    );

    if args.wait {
        let reply = reply_rx.recv_timeout(wait_timeout).map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("no reply within {}", args.wait_timeout.trim()),
            )
        })?;
        print_message(&reply, "client", format);
    } else if !client.flush(wait_timeout) {
        return Err(CliError::new(
            TIMEOUT,
            format!("message not written within {}", args.wait_timeout.trim()),
        ));
    }

    client.disconnect();
    Ok(SUCCESS)
}

fn build_message(registry: &MessageTypeRegistry, args: &SendArgs) -> CliResult<MessageWriter> {
    let mut writer = MessageWriter::new(&registry.get(&args.message_type));
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        writer
            .write_string(json)
            .map_err(|err| message_error("invalid body", err))?;
    } else if let Some(text) = &args.text {
        writer
            .write_string(text)
            .map_err(|err| message_error("invalid body", err))?;
    } else if let Some(path) = &args.file {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        writer.write_bytes(&data);
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirehub_message::MessageReader;

    fn args(extra: &[&str]) -> SendArgs {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: SendArgs,
        }

        let mut argv = vec!["send", "127.0.0.1", "50240"];
        argv.extend_from_slice(extra);
        Wrapper::try_parse_from(argv).expect("args should parse").args
    }

    fn body(writer: &MessageWriter) -> MessageReader {
        writer.to_reader()
    }

    #[test]
    fn text_body_is_one_string() {
        let registry = MessageTypeRegistry::new();
        let writer = build_message(&registry, &args(&["--type", "Chat", "--text", "hi"])).unwrap();
        assert_eq!(writer.message_type().name(), "Chat");

        let mut reader = body(&writer);
        assert_eq!(reader.read_string().unwrap(), "hi");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn json_body_must_parse() {
        let registry = MessageTypeRegistry::new();
        let err = build_message(&registry, &args(&["--json", "{nope"])).unwrap_err();
        assert_eq!(err.code, USAGE);

        let writer = build_message(&registry, &args(&["--json", "{\"a\":1}"])).unwrap();
        assert_eq!(body(&writer).read_string().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn no_body_sends_only_the_type() {
        let registry = MessageTypeRegistry::new();
        let writer = build_message(&registry, &args(&[])).unwrap();
        assert_eq!(writer.message_type().name(), "GenericMessage");
        assert_eq!(writer.body_len(), 0);
    }

    #[test]
    fn out_of_range_port_is_a_usage_error() {
        let mut bad = args(&[]);
        bad.port = 70_000;
        let err = run(bad, OutputFormat::Json).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
