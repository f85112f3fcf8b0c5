use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::unbounded;
use tracing::info;
use wirehub_message::{MessageTypeRegistry, MessageWriter};
use wirehub_peer::{Client, Host, ServerConfig};

use crate::cmd::{listen_port, parse_duration, DemoArgs};
use crate::exit::{message_error, peer_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_event, Event, OutputFormat};

const DEMO_TYPE: &str = "GenericMessage";

/// Host and client in one process: the host broadcasts a greeting and both
/// ends print what they receive.
pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let port = listen_port(args.port)?;
    let timeout = parse_duration(&args.timeout)?;
    let registry = Arc::new(MessageTypeRegistry::new());
    let ty = registry.get(DEMO_TYPE);

    let host = Host::bind(
        &format!("127.0.0.1:{port}"),
        Arc::clone(&registry),
        ServerConfig::default(),
    )
    .map_err(|err| peer_error("host failed to start", err))?;
    let client = Client::new(Arc::clone(&registry));

    let (events, incoming) = unbounded();
    let tx = events.clone();
    host.message_received().subscribe(&ty, move |reader| {
        let _ = tx.send(Event::Message {
            receiver: "host",
            message: reader.clone(),
        });
    });
    let tx = events.clone();
    client.message_received().subscribe(&ty, move |reader| {
        let _ = tx.send(Event::Message {
            receiver: "client",
            message: reader.clone(),
        });
    });
    let tx = events;
    host.server().client_connected().subscribe(move |entity| {
        let _ = tx.send(Event::Connected(entity.id(), entity.peer_addr()));
    });

    print_event(&Event::Listening(host.local_addr()), format);
    client
        .connect("127.0.0.1", host.local_addr().port())
        .map_err(|err| peer_error("client failed to connect", err))?;

    let deadline = Instant::now() + timeout;
    let mut pending = 2usize;
    let mut broadcast = false;
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = incoming.recv_timeout(remaining).map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("demo incomplete: {pending} deliveries outstanding"),
            )
        })?;
        print_event(&event, format);

        match event {
            // Broadcast only once the server lists the client.
            Event::Connected(..) if !broadcast => {
                let mut greeting = MessageWriter::new(&ty);
                greeting
                    .write_string(&args.message)
                    .map_err(|err| message_error("invalid greeting", err))?;
                let reached = host.broadcast(&greeting);
                info!(reached, "greeting broadcast");
                broadcast = true;
            }
            Event::Message { .. } => pending -= 1,
            _ => {}
        }
    }

    info!("closing host and client");
    client.disconnect();
    drop(host);
    Ok(SUCCESS)
}
