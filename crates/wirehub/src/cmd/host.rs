use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError};
use tracing::{debug, info};
use wirehub_message::MessageTypeRegistry;
use wirehub_peer::{Host, ServerConfig};

use crate::cmd::{install_ctrlc_handler, listen_port, HostArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

const POLL: Duration = Duration::from_millis(100);

pub fn run(args: HostArgs, format: OutputFormat) -> CliResult<i32> {
    let port = listen_port(args.port)?;
    let registry = Arc::new(MessageTypeRegistry::new());
    let host = Host::bind(
        &format!("{}:{port}", args.bind),
        registry,
        ServerConfig::default(),
    )
    .map_err(|err| peer_error("host failed to start", err))?;
    let running = install_ctrlc_handler()?;

    let (events, incoming) = unbounded();
    let server = host.server();

    let tx = events.clone();
    server.client_connected().subscribe(move |entity| {
        let _ = tx.send(Event::Connected(entity.id(), entity.peer_addr()));
    });
    let tx = events.clone();
    server.client_disconnected().subscribe(move |entity| {
        let _ = tx.send(Event::Disconnected(entity.id()));
    });
    for name in &args.types {
        let ty = host.registry().get(name);
        debug!(message_type = %ty, "subscribing");
        let tx = events.clone();
        server.message_received().subscribe(&ty, move |reader| {
            let _ = tx.send(Event::Message {
                receiver: "server",
                message: reader.clone(),
            });
        });
    }
    drop(events);

    print_event(&Event::Listening(host.local_addr()), format);
    info!(addr = %host.local_addr(), "host listening");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match incoming.recv_timeout(POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        print_event(&event, format);

        if let Event::Message { message, .. } = &event {
            if args.relay {
                let reached = host.broadcast(&message.to_writer());
                debug!(reached, "relayed message");
            }
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
        }
    }

    info!("host stopping");
    Ok(SUCCESS)
}
