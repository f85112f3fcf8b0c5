//! Host and client in one process exchanging a broadcast greeting.
//!
//! Run with:
//!   cargo run --example chat-demo
//!
//! While it runs, another terminal can join with:
//!   cargo run --features cli -- send 127.0.0.1 50240 --type GenericMessage --text hi

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wirehub::message::{MessageTypeRegistry, MessageWriter};
use wirehub::peer::{Client, Host};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(MessageTypeRegistry::new());
    let generic = registry.get("GenericMessage");

    let host = Host::new(50240, Arc::clone(&registry))?;
    let client = Client::new(Arc::clone(&registry));
    client.connect("127.0.0.1", 50240)?;

    host.message_received().subscribe(&generic, |reader| {
        if let Ok(text) = reader.read_string() {
            eprintln!(" - Host received message: {text}");
        }
    });
    client.message_received().subscribe(&generic, |reader| {
        if let Ok(text) = reader.read_string() {
            eprintln!(" - Client received message: {text}");
        }
    });
    host.server().message_received().subscribe(&generic, |reader| {
        if let Ok(text) = reader.read_string() {
            eprintln!(" - Server received message: {text}");
        }
    });

    // Give the accept loop time to list the client.
    thread::sleep(Duration::from_secs(1));

    let mut writer = MessageWriter::new(&generic);
    writer.write_string("Hello clients from server!")?;
    host.broadcast(&writer);

    thread::sleep(Duration::from_secs(2));

    eprintln!(" - Closing host and client");
    Ok(())
}
