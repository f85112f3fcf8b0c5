use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use wirehub_message::{MessageTypeRegistry, MessageWriter};
use wirehub_peer::{
    Client, ClientConfig, ConnectionState, EntityId, Host, PeerError, PipeConfig, ServerConfig,
};
use wirehub_transport::TransportError;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

fn start_host() -> Host {
    Host::bind(
        "127.0.0.1:0",
        Arc::new(MessageTypeRegistry::new()),
        ServerConfig::default(),
    )
    .expect("host should start")
}

fn new_client() -> Client {
    Client::new(Arc::new(MessageTypeRegistry::new()))
}

#[test]
fn server_fires_connect_and_disconnect_events() {
    let host = start_host();
    let (connected_tx, connected_rx) = unbounded();
    let (gone_tx, gone_rx) = unbounded();
    host.server().client_connected().subscribe(move |entity| {
        let _ = connected_tx.send(entity.id());
    });
    host.server().client_disconnected().subscribe(move |entity| {
        let _ = gone_tx.send(entity.id());
    });

    let client = new_client();
    client
        .connect("127.0.0.1", host.local_addr().port())
        .expect("client should connect");
    let id = connected_rx.recv_timeout(WAIT).expect("connect event");
    assert_eq!(id, EntityId::FIRST_REMOTE);
    assert!(host.server().entity(id).expect("entity listed").peer_addr().is_some());

    drop(client);

    assert_eq!(gone_rx.recv_timeout(WAIT).expect("disconnect event"), id);
    assert!(gone_rx.recv_timeout(QUIET).is_err());
    assert!(host.server().entity(id).is_none());
}

#[test]
fn disconnected_entity_is_skipped_by_broadcast() {
    let host = start_host();
    let (gone_tx, gone_rx) = unbounded();
    host.server().client_disconnected().subscribe(move |entity| {
        let _ = gone_tx.send(entity.id());
    });

    let (connected_tx, connected_rx) = unbounded();
    host.server().client_connected().subscribe(move |entity| {
        let _ = connected_tx.send(entity.id());
    });

    let staying = new_client();
    let leaving = new_client();
    let port = host.local_addr().port();
    staying.connect("127.0.0.1", port).expect("first client");
    connected_rx.recv_timeout(WAIT).expect("first admitted");
    leaving.connect("127.0.0.1", port).expect("second client");
    connected_rx.recv_timeout(WAIT).expect("second admitted");

    leaving.disconnect();
    gone_rx.recv_timeout(WAIT).expect("disconnect event");

    let message = MessageWriter::new(&host.registry().get("AfterLeave"));
    assert_eq!(host.broadcast(&message), 2);
    assert_eq!(
        host.server().entity_ids(),
        vec![EntityId::HOST, EntityId::new(2)]
    );
}

#[test]
fn entity_ids_are_monotonic_without_reuse() {
    let host = start_host();
    let (connected_tx, connected_rx) = unbounded();
    let (gone_tx, gone_rx) = unbounded();
    host.server().client_connected().subscribe(move |entity| {
        let _ = connected_tx.send(entity.id());
    });
    host.server().client_disconnected().subscribe(move |entity| {
        let _ = gone_tx.send(entity.id());
    });
    let port = host.local_addr().port();

    let first = new_client();
    first.connect("127.0.0.1", port).expect("first client");
    assert_eq!(connected_rx.recv_timeout(WAIT).unwrap(), EntityId::new(2));
    drop(first);
    assert_eq!(gone_rx.recv_timeout(WAIT).unwrap(), EntityId::new(2));

    let mut keep = Vec::new();
    for expected in 3..=5 {
        let client = new_client();
        client.connect("127.0.0.1", port).expect("client should connect");
        assert_eq!(
            connected_rx.recv_timeout(WAIT).unwrap(),
            EntityId::new(expected)
        );
        keep.push(client);
    }

    assert_eq!(
        host.server().entity_ids(),
        vec![
            EntityId::HOST,
            EntityId::new(3),
            EntityId::new(4),
            EntityId::new(5)
        ]
    );
}

#[test]
fn client_state_and_events_follow_connection() {
    let host = start_host();
    let client = new_client();
    let (up_tx, up_rx) = unbounded();
    let (down_tx, down_rx) = unbounded();
    client.connected().subscribe(move |addr| {
        let _ = up_tx.send(*addr);
    });
    client.disconnected().subscribe(move |_| {
        let _ = down_tx.send(());
    });

    assert_eq!(client.state(), ConnectionState::Disconnected);
    client
        .connect("127.0.0.1", host.local_addr().port())
        .expect("client should connect");
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(
        up_rx.recv_timeout(WAIT).expect("connected event").port(),
        host.local_addr().port()
    );

    assert!(matches!(
        client.connect("127.0.0.1", host.local_addr().port()),
        Err(PeerError::AlreadyConnected)
    ));

    client.disconnect();
    down_rx.recv_timeout(WAIT).expect("disconnected event");
    assert!(down_rx.recv_timeout(QUIET).is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        client.send_to_server(&MessageWriter::new(&client.registry().get("Late"))),
        Err(PeerError::NotConnected)
    ));

    // The same client can connect again.
    client
        .connect("127.0.0.1", host.local_addr().port())
        .expect("client should reconnect");
    assert!(client.is_connected());
}

#[test]
fn client_sees_server_shutdown_as_disconnect() {
    let host = start_host();
    let client = new_client();
    let (down_tx, down_rx) = unbounded();
    client.disconnected().subscribe(move |_| {
        let _ = down_tx.send(());
    });

    let (admitted_tx, admitted_rx) = unbounded();
    host.server().client_connected().subscribe(move |_| {
        let _ = admitted_tx.send(());
    });
    client
        .connect("127.0.0.1", host.local_addr().port())
        .expect("client should connect");
    admitted_rx.recv_timeout(WAIT).expect("server admitted client");

    drop(host);

    down_rx.recv_timeout(WAIT).expect("disconnected event");
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn connect_rejects_port_zero() {
    let client = new_client();
    let (err_tx, err_rx) = unbounded();
    client.errored().subscribe(move |err| {
        let _ = err_tx.send(err.to_string());
    });

    let err = client.connect("localhost", 0).unwrap_err();
    assert!(matches!(
        err,
        PeerError::Transport(TransportError::InvalidPort(0))
    ));
    assert_eq!(client.state(), ConnectionState::Error);
    assert!(err_rx.recv_timeout(WAIT).is_ok());
}

#[test]
fn connect_reports_unresolvable_host() {
    let client = new_client();
    let err = client.connect("testing.invalid", 80).unwrap_err();
    assert!(matches!(
        err,
        PeerError::Transport(TransportError::Resolve { .. })
    ));
    assert_eq!(client.state(), ConnectionState::Error);
}

#[test]
fn connect_reports_refused_connection() {
    let port = {
        let spare = wirehub_transport::TcpTransport::bind("127.0.0.1:0").unwrap();
        spare.local_addr().port()
    };
    let client = Client::with_config(
        Arc::new(MessageTypeRegistry::new()),
        ClientConfig::default().with_connect_timeout(Some(Duration::from_secs(1))),
    );

    let err = client.connect("127.0.0.1", port).unwrap_err();
    assert!(matches!(
        err,
        PeerError::Transport(TransportError::Connect { .. })
    ));
    assert_eq!(client.state(), ConnectionState::Error);

    // An errored client may try again once a server is up.
    let host = start_host();
    client
        .connect("127.0.0.1", host.local_addr().port())
        .expect("retry should connect");
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn bounded_outbound_queue_reports_full() {
    // Accepted by the kernel backlog but never read, so socket buffers fill up.
    let stalled = wirehub_transport::TcpTransport::bind("127.0.0.1:0").unwrap();
    let config = ClientConfig::default()
        .with_pipe_config(PipeConfig::default().with_outbound_capacity(1));
    let client = Client::with_config(Arc::new(MessageTypeRegistry::new()), config);
    client
        .connect("127.0.0.1", stalled.local_addr().port())
        .expect("client should connect");

    let mut big = MessageWriter::new(&client.registry().get("Bulk"));
    big.write_bytes(&vec![0u8; 1024 * 1024]);

    let mut saw_full = false;
    for _ in 0..256 {
        match client.send_to_server(&big) {
            Ok(()) => {}
            Err(PeerError::QueueFull { capacity }) => {
                assert_eq!(capacity, 1);
                saw_full = true;
                break;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(saw_full);
    assert!(client.is_connected());
}
