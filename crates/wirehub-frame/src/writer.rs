use std::io::{self, ErrorKind, Write};

use bytes::BytesMut;
use wirehub_transport::NetStream;

use crate::codec::{encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Puts whole frames on a blocking stream, header and payload in one write.
pub struct FrameWriter<T> {
    inner: T,
    max_payload: usize,
    scratch: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            max_payload,
            scratch: BytesMut::new(),
        }
    }

    /// Frame `payload` and write it out, then flush.
    ///
    /// An expired write timeout is an error, not a retry: it comes back as
    /// [`FrameError::Io`] with [`ErrorKind::TimedOut`].
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        self.scratch.clear();
        encode_frame(payload, &mut self.scratch)?;
        self.inner.write_all(&self.scratch).map_err(write_error)?;
        self.inner.flush().map_err(write_error)
    }
}

impl FrameWriter<NetStream> {
    /// Writer over a socket, with the configured write timeout applied to it.
    pub fn from_stream(stream: NetStream, config: &FrameConfig) -> Result<Self> {
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_max_payload(stream, config.max_payload_size))
    }
}

fn write_error(err: io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero => FrameError::ConnectionClosed,
        // SO_SNDTIMEO expiry shows up as EAGAIN on Linux.
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            FrameError::Io(io::Error::new(ErrorKind::TimedOut, "frame write timed out"))
        }
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::time::{Duration, Instant};

    use wirehub_transport::TcpTransport;

    use super::*;
    use crate::reader::FrameReader;

    /// Accepts `budget` bytes, then behaves like a socket whose send timeout
    /// keeps expiring.
    struct StalledSocket {
        accepted: Vec<u8>,
        budget: usize,
        calls: usize,
    }

    impl Write for StalledSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            let n = buf.len().min(self.budget - self.accepted.len());
            if n == 0 {
                return Err(ErrorKind::WouldBlock.into());
            }
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn header_and_payload_leave_in_one_write() {
        let mut writer = FrameWriter::new(StalledSocket {
            accepted: Vec::new(),
            budget: usize::MAX,
            calls: 0,
        });
        writer.send(b"\x02\x00\x00\x00ping").unwrap();

        assert_eq!(writer.inner.calls, 1);
        assert_eq!(&writer.inner.accepted[..4], &8u32.to_le_bytes());
        assert_eq!(&writer.inner.accepted[4..], b"\x02\x00\x00\x00ping");
    }

    #[test]
    fn expired_send_timeout_is_reported_once() {
        let mut writer = FrameWriter::new(StalledSocket {
            accepted: Vec::new(),
            budget: 6,
            calls: 0,
        });

        let err = writer.send(&[0xAB; 64]).unwrap_err();
        assert!(matches!(&err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut), "{err}");
        assert_eq!(writer.inner.calls, 2);
    }

    #[test]
    fn peer_refusing_bytes_is_a_close() {
        struct Refusing;

        impl Write for Refusing {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = FrameWriter::new(Refusing);
        assert!(matches!(
            writer.send(b"bye"),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let mut writer = FrameWriter::with_max_payload(
            StalledSocket {
                accepted: Vec::new(),
                budget: usize::MAX,
                calls: 0,
            },
            8,
        );

        assert!(matches!(
            writer.send(&[0u8; 9]),
            Err(FrameError::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert_eq!(writer.inner.calls, 0);
        writer.send(&[1u8; 8]).unwrap();
        assert_eq!(writer.inner.accepted.len(), 12);
    }

    #[test]
    fn socket_write_timeout_ends_a_stalled_send() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let mut idle =
            TcpTransport::connect("127.0.0.1", listener.local_addr().port(), None).unwrap();
        let (server, _addr) = listener.accept().unwrap();

        let config = FrameConfig {
            write_timeout: Some(Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::from_stream(server, &config).unwrap();

        // Nobody reads `idle`, so the kernel buffers fill up.
        let started = Instant::now();
        let payload = vec![0u8; 4 * 1024 * 1024];
        let err = loop {
            match writer.send(&payload) {
                Ok(()) => assert!(started.elapsed() < Duration::from_secs(10)),
                Err(err) => break err,
            }
        };
        assert!(matches!(&err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut), "{err}");

        let mut first = [0u8; 4];
        idle.read_exact(&mut first).unwrap();
        assert_eq!(first, (4u32 * 1024 * 1024).to_le_bytes());
    }

    #[test]
    fn frames_read_back_in_order() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let client =
            TcpTransport::connect("127.0.0.1", listener.local_addr().port(), None).unwrap();
        let (server, _addr) = listener.accept().unwrap();

        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);
        for seq in 0u32..32 {
            writer.send(&seq.to_le_bytes()).unwrap();
        }
        for seq in 0u32..32 {
            assert_eq!(reader.read_frame().unwrap().payload.as_ref(), &seq.to_le_bytes());
        }
    }
}
