use std::net::SocketAddr;
use std::sync::Arc;

use wirehub_message::{MessagePublisher, MessageTypeRegistry, MessageWriter};

use crate::config::ServerConfig;
use crate::entity::EntityId;
use crate::error::Result;
use crate::server::Server;

/// A peer that also runs the server.
///
/// The host is entity 1 in its own server's directory: broadcasts and
/// point sends to it are delivered in-process to [`message_received`](Self::message_received),
/// and [`send_to_server`](Self::send_to_server) enters the server's dispatcher
/// exactly as a network message would.
pub struct Host {
    server: Server,
}

impl Host {
    /// Start a host listening on every interface at `port`.
    pub fn new(port: u16, registry: Arc<MessageTypeRegistry>) -> Result<Self> {
        let server = Server::bind_port(port, registry)?;
        Self::start(server)
    }

    /// Start a host on an explicit address, e.g. `127.0.0.1:0`.
    pub fn bind(
        addr: &str,
        registry: Arc<MessageTypeRegistry>,
        config: ServerConfig,
    ) -> Result<Self> {
        let server = Server::bind(addr, registry, config)?;
        Self::start(server)
    }

    fn start(server: Server) -> Result<Self> {
        server.start()?;
        Ok(Self { server })
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn registry(&self) -> &Arc<MessageTypeRegistry> {
        self.server.registry()
    }

    /// Messages the server sends to the host.
    pub fn message_received(&self) -> &MessagePublisher {
        self.server.host_inbox()
    }

    /// Hand a message to the server's subscribers without touching the network.
    pub fn send_to_server(&self, message: &MessageWriter) -> usize {
        self.server
            .receive_message(EntityId::HOST, message.to_reader())
    }

    /// Broadcast through the server to every entity, this host included.
    pub fn broadcast(&self, message: &MessageWriter) -> usize {
        self.server.broadcast_message(message)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn host() -> Host {
        Host::bind(
            "127.0.0.1:0",
            Arc::new(MessageTypeRegistry::new()),
            ServerConfig::default(),
        )
        .expect("host should start")
    }

    #[test]
    fn send_to_server_reaches_server_subscribers() {
        let host = host();
        let ty = host.registry().get("ToServer");
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        host.server().message_received().subscribe(&ty, move |reader| {
            assert_eq!(reader.read_string().unwrap(), "local");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut writer = MessageWriter::new(&ty);
        writer.write_string("local").unwrap();
        assert_eq!(host.send_to_server(&writer), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broadcast_loops_back_to_host() {
        let host = host();
        let ty = host.registry().get("Loopback");
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        host.message_received().subscribe(&ty, move |reader| {
            assert_eq!(reader.read_u32().unwrap(), 0xFFFF_FFFF);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut writer = MessageWriter::new(&ty);
        writer.write_i32(-1);
        assert_eq!(host.broadcast(&writer), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // Point send to the host entity takes the same in-process path.
        host.server().send_message(EntityId::HOST, &writer).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
