use std::fmt;
use std::io;

use wirehub_frame::FrameError;
use wirehub_message::MessageError;
use wirehub_peer::PeerError;
use wirehub_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidPort(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Resolve { .. } | TransportError::Shutdown => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::Truncated { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn message_error(context: &str, err: MessageError) -> CliError {
    match err {
        MessageError::Frame(err) => frame_error(context, err),
        MessageError::StringTooLong(_) | MessageError::TypeIdCollision { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Message(err) => message_error(context, err),
        PeerError::ConnectionClosed
        | PeerError::NotConnected
        | PeerError::EntityIdsExhausted => CliError::new(FAILURE, format!("{context}: {err}")),
        PeerError::QueueFull { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PeerError::AlreadyConnected | PeerError::UnknownEntity(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        PeerError::Spawn { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirehub_peer::EntityId;

    #[test]
    fn invalid_port_is_a_usage_error() {
        let err = peer_error(
            "connect failed",
            PeerError::Transport(TransportError::InvalidPort(65_536)),
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn refused_connection_is_a_failure() {
        let source = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "127.0.0.1:9".parse().unwrap(),
                source,
            },
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn nested_errors_keep_their_codes() {
        let underrun = MessageError::BufferUnderrun {
            offset: 0,
            needed: 4,
            available: 1,
        };
        assert_eq!(peer_error("decode", PeerError::Message(underrun)).code, DATA_INVALID);

        let too_large = MessageError::Frame(FrameError::PayloadTooLarge { size: 10, max: 1 });
        assert_eq!(message_error("encode", too_large).code, DATA_INVALID);

        let timed_out = FrameError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(frame_error("read", timed_out).code, TIMEOUT);

        assert_eq!(
            peer_error("send", PeerError::UnknownEntity(EntityId::new(9))).code,
            USAGE
        );
    }
}
