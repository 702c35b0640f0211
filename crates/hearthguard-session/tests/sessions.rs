//! Integration tests for client and server sessions over loopback TCP.
//!
//! Every test binds the server to port 0 so tests can run in parallel.
//! Sockets are non-blocking, so the helpers poll with short sleeps and a
//! deadline instead of waiting on I/O.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use hearthguard_protocol::{
    encode_frame, encode_packet, BaseHitResponse, ClientPacket, Direction, GameOverResponse,
    JoinLobbyRequest, JoinLobbyResponse, LobbyReadyRequest, PlayerMoveRequest, ServerPacket,
    StartGameResponse, Vec2,
};
use hearthguard_session::{ClientSession, ServerSession, SessionError};
use hearthguard_transport::{PeerId, SocketError};

// =========================================================================
// Helpers
// =========================================================================

const DEADLINE: Duration = Duration::from_secs(3);
const STEP: Duration = Duration::from_millis(5);

fn server() -> (ServerSession, u16) {
    let server = ServerSession::bind("127.0.0.1", 0).expect("bind");
    let port = server.local_addr().expect("addr").port();
    (server, port)
}

/// Connects a client and accepts it, so the returned id is that client's.
fn connect(server: &mut ServerSession, port: u16) -> (ClientSession, PeerId) {
    let client = ClientSession::connect("127.0.0.1", port).expect("connect");
    let deadline = Instant::now() + DEADLINE;
    loop {
        if let Some(id) = server.accept_one_peer_if_any().expect("accept") {
            return (client, id);
        }
        assert!(Instant::now() < deadline, "server never saw the client");
        thread::sleep(STEP);
    }
}

fn poll_server(server: &mut ServerSession) -> (PeerId, ClientPacket) {
    let deadline = Instant::now() + DEADLINE;
    loop {
        if let Some(message) = server.poll_message() {
            return message;
        }
        assert!(Instant::now() < deadline, "no packet reached the server");
        thread::sleep(STEP);
    }
}

fn poll_client(client: &mut ClientSession) -> ServerPacket {
    let deadline = Instant::now() + DEADLINE;
    loop {
        if let Some(packet) = client.poll_message().expect("poll") {
            return packet;
        }
        assert!(Instant::now() < deadline, "no packet reached the client");
        thread::sleep(STEP);
    }
}

/// Everything the client receives within `window`.
fn drain_client(client: &mut ClientSession, window: Duration) -> Vec<ServerPacket> {
    let until = Instant::now() + window;
    let mut packets = Vec::new();
    while Instant::now() < until {
        while let Some(packet) = client.poll_message().expect("poll") {
            packets.push(packet);
        }
        thread::sleep(STEP);
    }
    packets
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_join_lobby_roundtrip() {
    let (mut server, port) = server();
    let (mut client, id) = connect(&mut server, port);

    client.send(JoinLobbyRequest).expect("send");
    let (from, packet) = poll_server(&mut server);
    assert_eq!(from, id);
    assert_eq!(packet, ClientPacket::JoinLobby(JoinLobbyRequest));

    server
        .broadcast(JoinLobbyResponse {
            player_id: id.into_inner(),
            connected_players: 1,
        })
        .expect("broadcast");

    match poll_client(&mut client) {
        ServerPacket::JoinLobby(response) => {
            assert_eq!(response.connected_players, 1);
            assert_eq!(response.player_id, id.into_inner());
        }
        other => panic!("expected JoinLobbyResponse, got {other:?}"),
    }
}

#[test]
fn test_two_frames_in_one_stream_poll_in_order() {
    let (mut server, port) = server();
    let (mut client, id) = connect(&mut server, port);

    let first = ClientPacket::from(LobbyReadyRequest { is_ready: true });
    let second = ClientPacket::from(PlayerMoveRequest {
        direction: Direction::Left,
    });
    client.send(first.clone()).expect("send");
    client.send(second.clone()).expect("send");

    assert_eq!(poll_server(&mut server), (id, first));
    assert_eq!(poll_server(&mut server), (id, second));
    assert!(server.poll_message().is_none());
}

#[test]
fn test_move_request_applied_and_echoed() {
    let (mut server, port) = server();
    let (mut client, id) = connect(&mut server, port);
    let start = Vec2::new(32.0, 32.0);

    client
        .send(PlayerMoveRequest {
            direction: Direction::Up,
        })
        .expect("send");
    let (from, packet) = poll_server(&mut server);
    let ClientPacket::PlayerMove(request) = packet else {
        panic!("expected PlayerMoveRequest, got {packet:?}");
    };
    server
        .send_to(from, request.apply(from.into_inner(), start))
        .expect("send_to");

    match poll_client(&mut client) {
        ServerPacket::PlayerMove(response) => {
            assert_eq!(response.player_id, id.into_inner());
            assert_eq!(response.new_pos, Vec2::new(32.0, 31.0));
        }
        other => panic!("expected PlayerMoveResponse, got {other:?}"),
    }
}

// =========================================================================
// Disconnects
// =========================================================================

#[test]
fn test_broadcast_isolates_disconnected_peer() {
    let (mut server, port) = server();
    let (mut c1, id1) = connect(&mut server, port);
    let (c2, id2) = connect(&mut server, port);
    let (mut c3, id3) = connect(&mut server, port);
    assert_eq!(server.peer_count(), 3);

    drop(c2);

    // The first write to a closed peer can still succeed locally; the
    // reset shows up on a later one.
    let deadline = Instant::now() + DEADLINE;
    while server.peer_count() == 3 {
        server
            .broadcast(BaseHitResponse { new_health: 5 })
            .expect("broadcast");
        assert!(Instant::now() < deadline, "peer 2 was never removed");
        thread::sleep(STEP);
    }

    assert_eq!(server.peers().collect::<Vec<_>>(), vec![id1, id3]);
    assert!(!server.is_connected(id2));
    assert_eq!(server.take_disconnected(), vec![id2]);
    assert!(server.take_disconnected().is_empty());

    for client in [&mut c1, &mut c3] {
        let packet = poll_client(client);
        assert_eq!(packet, ServerPacket::from(BaseHitResponse { new_health: 5 }));
    }

    c1.send(JoinLobbyRequest).expect("send");
    c3.send(JoinLobbyRequest).expect("send");
    let mut senders = vec![poll_server(&mut server).0, poll_server(&mut server).0];
    senders.sort();
    assert_eq!(senders, vec![id1, id3]);
}

#[test]
fn test_peer_close_delivers_buffered_frames_then_removes() {
    let (mut server, port) = server();
    let (mut client, id) = connect(&mut server, port);

    client.send(JoinLobbyRequest).expect("send");
    client.close().expect("close");
    drop(client);

    assert_eq!(poll_server(&mut server), (id, ClientPacket::from(JoinLobbyRequest)));

    let deadline = Instant::now() + DEADLINE;
    while server.is_connected(id) {
        assert!(server.poll_message().is_none());
        assert!(Instant::now() < deadline, "closed peer was never removed");
        thread::sleep(STEP);
    }
    assert_eq!(server.take_disconnected(), vec![id]);
}

#[test]
fn test_client_poll_reports_server_close() {
    let (mut server, port) = server();
    let (mut client, _id) = connect(&mut server, port);

    server
        .broadcast(GameOverResponse { is_won: true })
        .expect("broadcast");
    server.close();

    // The packet sent before the close still arrives.
    assert_eq!(
        poll_client(&mut client),
        ServerPacket::from(GameOverResponse { is_won: true })
    );

    let deadline = Instant::now() + DEADLINE;
    let err = loop {
        match client.poll_message() {
            Ok(None) if Instant::now() < deadline => thread::sleep(STEP),
            Ok(other) => panic!("expected a disconnect, got {other:?}"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, SessionError::Socket(SocketError::Disconnected)));
    assert!(err.is_disconnect());
}

#[test]
fn test_client_poll_skips_bad_frame_before_reporting_close() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let mut client = ClientSession::connect("127.0.0.1", port).expect("connect");

    let (mut stream, _) = listener.accept().expect("accept");
    let mut bytes = encode_frame(200, &[1]).expect("frame").to_vec();
    let good = encode_packet(&ServerPacket::from(StartGameResponse)).expect("encode");
    bytes.extend_from_slice(&good);
    stream.write_all(&bytes).expect("write");
    drop(stream);

    // The valid frame behind the unknown one comes out before the close.
    let deadline = Instant::now() + DEADLINE;
    let first = loop {
        match client.poll_message() {
            Ok(None) if Instant::now() < deadline => thread::sleep(STEP),
            other => break other,
        }
    };
    assert_eq!(
        first.expect("frame before close"),
        Some(ServerPacket::from(StartGameResponse))
    );

    let err = loop {
        match client.poll_message() {
            Ok(None) if Instant::now() < deadline => thread::sleep(STEP),
            Ok(other) => panic!("expected a disconnect, got {other:?}"),
            Err(e) => break e,
        }
    };
    assert!(err.is_disconnect());
}

// =========================================================================
// Targeting and fairness
// =========================================================================

#[test]
fn test_send_to_all_except_skips_one_peer() {
    let (mut server, port) = server();
    let (mut c1, id1) = connect(&mut server, port);
    let (mut c2, _id2) = connect(&mut server, port);

    server
        .send_to_all_except(id1, BaseHitResponse { new_health: 1 })
        .expect("send");

    assert_eq!(
        poll_client(&mut c2),
        ServerPacket::from(BaseHitResponse { new_health: 1 })
    );
    assert!(drain_client(&mut c1, Duration::from_millis(100)).is_empty());
}

#[test]
fn test_poll_message_takes_turns_between_peers() {
    let (mut server, port) = server();
    let (mut c1, id1) = connect(&mut server, port);
    let (mut c2, id2) = connect(&mut server, port);

    for _ in 0..2 {
        c1.send(LobbyReadyRequest { is_ready: true }).expect("send");
        c2.send(LobbyReadyRequest { is_ready: false }).expect("send");
    }
    thread::sleep(Duration::from_millis(100));

    let order: Vec<PeerId> = (0..4).map(|_| poll_server(&mut server).0).collect();
    assert_eq!(order, vec![id1, id2, id1, id2]);
}

#[test]
fn test_wait_for_exactly_accepts_pending_peers() {
    let (mut server, port) = server();
    let _c1 = ClientSession::connect("127.0.0.1", port).expect("connect");
    let _c2 = ClientSession::connect("127.0.0.1", port).expect("connect");

    server.wait_for_exactly(2).expect("wait");
    assert_eq!(server.peer_count(), 2);

    // Back to non-blocking: nobody else is waiting.
    assert!(server.accept_one_peer_if_any().expect("accept").is_none());
}

// =========================================================================
// Malformed input
// =========================================================================

fn raw_peer(server: &mut ServerSession, port: u16) -> (TcpStream, PeerId) {
    let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    let deadline = Instant::now() + DEADLINE;
    loop {
        if let Some(id) = server.accept_one_peer_if_any().expect("accept") {
            return (stream, id);
        }
        assert!(Instant::now() < deadline, "server never saw the raw client");
        thread::sleep(STEP);
    }
}

#[test]
fn test_unknown_packet_type_is_skipped() {
    let (mut server, port) = server();
    let (mut stream, id) = raw_peer(&mut server, port);

    stream
        .write_all(&encode_frame(200, &[1, 2, 3]).expect("frame"))
        .expect("write");
    stream
        .write_all(&encode_packet(&ClientPacket::from(JoinLobbyRequest)).expect("encode"))
        .expect("write");

    assert_eq!(poll_server(&mut server), (id, ClientPacket::from(JoinLobbyRequest)));
    assert!(server.is_connected(id));
}

#[test]
fn test_corrupt_stream_drops_peer() {
    let (mut server, port) = server();
    let (mut stream, id) = raw_peer(&mut server, port);

    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").expect("write");

    let deadline = Instant::now() + DEADLINE;
    while server.is_connected(id) {
        assert!(server.poll_message().is_none());
        assert!(Instant::now() < deadline, "corrupt peer was never dropped");
        thread::sleep(STEP);
    }
    assert_eq!(server.take_disconnected(), vec![id]);
}

#[test]
fn test_client_connect_refused() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let (server, port) = server();
        drop(server);
        port
    };
    let err = ClientSession::connect("127.0.0.1", port).expect_err("refused");
    assert!(matches!(err, SessionError::Socket(_)));
}
