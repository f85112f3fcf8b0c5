//! A tokio client speaking the wire format through `FrameCodec`.
//!
//! A blocking host runs in the same process; the async side sends it a
//! message and reads the host's relayed copy back.
//!
//! Run with:
//!   cargo run --example async-client --features async

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use wirehub::frame::FrameCodec;
use wirehub::message::{MessageReader, MessageTypeRegistry, MessageWriter};
use wirehub::peer::{Host, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(MessageTypeRegistry::new());
    let ping = registry.get("Ping");

    let host = Arc::new(Host::bind(
        "127.0.0.1:0",
        Arc::clone(&registry),
        ServerConfig::default(),
    )?);
    let relay = Arc::downgrade(&host);
    host.server().message_received().subscribe(&ping, move |reader| {
        if let Some(host) = relay.upgrade() {
            host.broadcast(&reader.to_writer());
        }
    });

    let stream = TcpStream::connect(host.local_addr()).await?;
    let mut framed = Framed::new(stream, FrameCodec::default());

    let mut writer = MessageWriter::new(&ping);
    writer.write_string("ping from tokio")?.write_u32(42);
    framed.send(writer.into_payload()).await?;

    let frame = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await?
        .ok_or("host closed the connection")??;
    let mut reply = MessageReader::from_payload(&registry, frame.payload)?;
    let text = reply.read_string()?;
    let number = reply.read_u32()?;
    eprintln!("received {} with '{text}' and {number}", reply.message_type());
    Ok(())
}
