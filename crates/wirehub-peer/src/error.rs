use crate::entity::EntityId;

/// Errors that can occur in pipe, server, and client operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wirehub_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] wirehub_frame::FrameError),

    /// Message decode or encode error.
    #[error("message error: {0}")]
    Message(#[from] wirehub_message::MessageError),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// The pipe is closing or closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The bounded outbound queue has no room.
    #[error("outbound queue full ({capacity} messages)")]
    QueueFull { capacity: usize },

    /// The client has no open connection.
    #[error("not connected")]
    NotConnected,

    /// The client is already connecting or connected.
    #[error("already connected")]
    AlreadyConnected,

    /// Every remote entity id has been handed out.
    #[error("no entity ids left for new connections")]
    EntityIdsExhausted,

    /// No entity with this id is in the server directory.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

pub type Result<T> = std::result::Result<T, PeerError>;
