use std::time::Duration;

use wirehub_frame::FrameConfig;

/// Default timeout for establishing a client connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection behavior.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Frame limits and socket timeouts. A read timeout tears down idle
    /// connections; leave it unset for long-lived peers.
    pub frame: FrameConfig,
    /// Outbound queue bound. `None` queues without limit; with `Some(n)`,
    /// enqueueing onto a full queue fails with `QueueFull`.
    pub outbound_capacity: Option<usize>,
    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            outbound_capacity: None,
            nodelay: true,
        }
    }
}

impl PipeConfig {
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = Some(capacity);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// Server behavior.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Applied to every accepted connection.
    pub pipe: PipeConfig,
}

impl ServerConfig {
    pub fn with_pipe_config(mut self, pipe: PipeConfig) -> Self {
        self.pipe = pipe;
        self
    }
}

/// Client behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub pipe: PipeConfig,
    /// Per-address connect timeout. `None` waits for the OS default.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pipe: PipeConfig::default(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

impl ClientConfig {
    pub fn with_pipe_config(mut self, pipe: PipeConfig) -> Self {
        self.pipe = pipe;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
