//! Integration tests: the connection manager against a scripted server
//! over a real TCP connection on localhost.

use std::time::Duration;

use bfrcon_core::{
    Argument, Lifecycle, MessageType, Origin, Packet, Rcon, RconCodec, RconConfig, RconError,
    Sequence, Word, words_to_strings,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;

// ── Helpers ──────────────────────────────────────────────────────

type ServerConn = Framed<TcpStream, RconCodec>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Listener on an OS-assigned port plus a config pointing at it.
async fn ephemeral_listener() -> (TcpListener, RconConfig) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, RconConfig::new(addr.ip().to_string(), addr.port()))
}

/// Connect `rcon` and accept the server side of the socket.
async fn connect(rcon: &Rcon, listener: &TcpListener) -> ServerConn {
    rcon.connect().await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    Framed::new(stream, RconCodec)
}

async fn next_frame(conn: &mut ServerConn) -> Packet {
    tokio::time::timeout(Duration::from_secs(5), conn.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("client closed the socket")
        .expect("client sent a malformed frame")
}

async fn assert_silent(conn: &mut ServerConn) {
    let next = tokio::time::timeout(Duration::from_millis(150), conn.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

async fn reply(conn: &mut ServerConn, request: &Packet, words: &[&str]) {
    let words = words.iter().map(|w| Word::from(*w)).collect();
    conn.send(Packet::response_to(request.sequence(), words))
        .await
        .unwrap();
}

fn no_args() -> Vec<Argument> {
    Vec::new()
}

/// Poll `check` until it holds or a few seconds pass.
async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}

async fn wait_for_close(events: &mut broadcast::Receiver<Lifecycle>) -> Option<String> {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no lifecycle event")
            .unwrap();
        if let Lifecycle::Closed { reason } = event {
            return reason;
        }
    }
}

// ── Round trips ──────────────────────────────────────────────────

#[tokio::test]
async fn test_ok_response_resolves_with_result_words() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let send = tokio::spawn(rcon.create_command("version", no_args()).send());

    let request = next_frame(&mut server).await;
    assert_eq!(request.to_strings(), ["version"]);
    assert_eq!(request.sequence().origin(), Origin::Client);
    assert_eq!(request.sequence().message_type(), MessageType::Request);
    reply(&mut server, &request, &["OK", "BF3", "1149"]).await;

    assert_eq!(send.await.unwrap().unwrap(), ["BF3", "1149"]);
    assert_eq!(rcon.pending_count(), 0);
}

#[tokio::test]
async fn test_formatter_shapes_the_result() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let send = tokio::spawn(
        rcon.create_command("vars.maxPlayers", no_args())
            .format(|words| words[0].to_number() as u32)
            .send(),
    );

    let request = next_frame(&mut server).await;
    reply(&mut server, &request, &["OK", "64"]).await;
    assert_eq!(send.await.unwrap().unwrap(), 64);
}

#[tokio::test]
async fn test_error_status_rejects_with_command() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let send = tokio::spawn(
        rcon.create_command("admin.kickPlayer", ["nobody"])
            .send(),
    );

    let request = next_frame(&mut server).await;
    reply(&mut server, &request, &["PlayerNotFound"]).await;

    match send.await.unwrap() {
        Err(RconError::CommandRejected { status, command }) => {
            assert_eq!(status, "PlayerNotFound");
            assert_eq!(command, ["admin.kickPlayer", "nobody"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_responses_out_of_order() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let first = tokio::spawn(rcon.create_command("vars.gamePassword", no_args()).send());
    let first_frame = next_frame(&mut server).await;
    let second = tokio::spawn(rcon.create_command("vars.serverName", no_args()).send());
    let second_frame = next_frame(&mut server).await;

    reply(&mut server, &second_frame, &["OK", "My Server"]).await;
    reply(&mut server, &first_frame, &["OK", "secret"]).await;

    assert_eq!(first.await.unwrap().unwrap(), ["secret"]);
    assert_eq!(second.await.unwrap().unwrap(), ["My Server"]);
}

// ── Inbound demultiplexing ───────────────────────────────────────

#[tokio::test]
async fn test_server_events_reach_callback() {
    let (listener, config) = ephemeral_listener().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let rcon = Rcon::new(config, move |name, words| {
        let _ = tx.send((name.to_string(), words_to_strings(words)));
    });
    let mut server = connect(&rcon, &listener).await;

    let event = Packet::new(
        Sequence::new(7, Origin::Server, MessageType::Request),
        vec![
            Word::from("player.onJoin"),
            Word::from("Soldier"),
            Word::from("EA_1234"),
        ],
    );
    server.send(event).await.unwrap();

    let (name, words) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "player.onJoin");
    assert_eq!(words, ["Soldier", "EA_1234"]);
}

#[tokio::test]
async fn test_unmatched_response_is_reported() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| panic!("not an event"));
    let mut events = rcon.subscribe();
    let mut server = connect(&rcon, &listener).await;

    let stray = Packet::new(
        Sequence::new(999, Origin::Client, MessageType::Response),
        vec![Word::from("OK")],
    );
    server.send(stray).await.unwrap();

    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            Lifecycle::Error(message) => {
                assert!(message.contains("999"), "{message}");
                break;
            }
            Lifecycle::Connected => continue,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(rcon.is_connected());
}

// ── Priority gate ────────────────────────────────────────────────

#[tokio::test]
async fn test_priority_request_holds_back_ordinary_traffic() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let login = tokio::spawn(
        rcon.create_command("login.plainText", ["secret"])
            .priorize()
            .send(),
    );
    let login_frame = next_frame(&mut server).await;
    assert!(rcon.is_waiting_for_priorized());

    let info = tokio::spawn(rcon.create_command("serverInfo", no_args()).send());
    wait_until(|| rcon.queued_count() == 1).await;
    assert_silent(&mut server).await;

    reply(&mut server, &login_frame, &["OK"]).await;
    let info_frame = next_frame(&mut server).await;
    assert_eq!(info_frame.to_strings(), ["serverInfo"]);
    reply(&mut server, &info_frame, &["OK", "My Server"]).await;

    login.await.unwrap().unwrap();
    assert_eq!(info.await.unwrap().unwrap(), ["My Server"]);
    assert!(!rcon.is_waiting_for_priorized());
}

#[tokio::test]
async fn test_held_gate_waits_for_final_priority_reply() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let salt = tokio::spawn(
        rcon.create_command("login.hashed", no_args())
            .hold_gate()
            .send(),
    );
    let salt_frame = next_frame(&mut server).await;

    let info = tokio::spawn(rcon.create_command("serverInfo", no_args()).send());
    wait_until(|| rcon.queued_count() == 1).await;

    reply(&mut server, &salt_frame, &["OK", "ABCD"]).await;
    assert_eq!(salt.await.unwrap().unwrap(), ["ABCD"]);
    assert!(rcon.is_waiting_for_priorized());
    assert_silent(&mut server).await;

    let hash = tokio::spawn(
        rcon.create_command("login.hashed", ["0123"])
            .priorize()
            .send(),
    );
    let hash_frame = next_frame(&mut server).await;
    assert_eq!(hash_frame.to_strings(), ["login.hashed", "0123"]);
    reply(&mut server, &hash_frame, &["OK"]).await;

    let info_frame = next_frame(&mut server).await;
    assert_eq!(info_frame.to_strings(), ["serverInfo"]);
    reply(&mut server, &info_frame, &["OK", "My Server"]).await;

    hash.await.unwrap().unwrap();
    assert_eq!(info.await.unwrap().unwrap(), ["My Server"]);
    assert!(!rcon.is_waiting_for_priorized());
}

#[tokio::test]
async fn test_priority_timeout_releases_gate() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let login = tokio::spawn(
        rcon.create_command("login.hashed", no_args())
            .priorize()
            .timeout(Duration::from_millis(100))
            .send(),
    );
    next_frame(&mut server).await;
    let info = tokio::spawn(rcon.create_command("serverInfo", no_args()).send());

    assert!(matches!(
        login.await.unwrap(),
        Err(RconError::RequestTimeout { .. })
    ));
    let info_frame = next_frame(&mut server).await;
    reply(&mut server, &info_frame, &["OK"]).await;
    info.await.unwrap().unwrap();
}

// ── Timeouts ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_timeout_frees_pending_slot() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut server = connect(&rcon, &listener).await;

    let send = tokio::spawn(
        rcon.create_command("admin.listPlayers", ["all"])
            .timeout(Duration::from_millis(50))
            .send(),
    );
    let request = next_frame(&mut server).await;

    match send.await.unwrap() {
        Err(RconError::RequestTimeout { command, timeout }) => {
            assert_eq!(command, ["admin.listPlayers", "all"]);
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(rcon.pending_count(), 0);

    // A late reply is now unmatched and must not panic or resolve anything.
    let mut events = rcon.subscribe();
    reply(&mut server, &request, &["OK"]).await;
    assert!(matches!(
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap(),
        Lifecycle::Error(_)
    ));
}

// ── Disconnect / reconnect ───────────────────────────────────────

#[tokio::test]
async fn test_disconnect_requeues_in_order_behind_login() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut events = rcon.subscribe();
    let mut server = connect(&rcon, &listener).await;

    let mut sends = Vec::new();
    for name in ["vars.a", "vars.b", "vars.c"] {
        sends.push(tokio::spawn(rcon.create_command(name, no_args()).send()));
        next_frame(&mut server).await;
    }
    assert_eq!(rcon.pending_count(), 3);

    drop(server);
    assert_eq!(wait_for_close(&mut events).await, None);
    assert!(rcon.phase().is_disconnected());
    assert_eq!(rcon.pending_count(), 0);
    assert_eq!(rcon.queued_count(), 3);
    assert!(rcon.is_waiting_for_priorized());

    let mut server = connect(&rcon, &listener).await;
    assert_silent(&mut server).await;

    let login = tokio::spawn(
        rcon.create_command("login.plainText", ["secret"])
            .priorize()
            .send(),
    );
    let login_frame = next_frame(&mut server).await;
    assert_eq!(login_frame.to_strings(), ["login.plainText", "secret"]);
    reply(&mut server, &login_frame, &["OK"]).await;
    login.await.unwrap().unwrap();

    let mut resent = Vec::new();
    for _ in 0..3 {
        resent.push(next_frame(&mut server).await);
    }
    let names: Vec<_> = resent.iter().map(|p| p.to_strings()[0].clone()).collect();
    assert_eq!(names, ["vars.a", "vars.b", "vars.c"]);
    let counters: Vec<_> = resent.iter().map(|p| p.sequence().counter()).collect();
    assert_eq!(counters, [0, 1, 2]);

    for frame in &resent {
        reply(&mut server, frame, &["OK"]).await;
    }
    for send in sends {
        send.await.unwrap().unwrap();
    }
    assert_silent(&mut server).await;
}

#[tokio::test]
async fn test_drop_on_disconnect_fails_instead_of_requeueing() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut events = rcon.subscribe();
    let mut server = connect(&rcon, &listener).await;

    let send = tokio::spawn(
        rcon.create_command("admin.shutDown", no_args())
            .drop_on_disconnect()
            .send(),
    );
    next_frame(&mut server).await;
    drop(server);
    wait_for_close(&mut events).await;

    assert!(matches!(
        send.await.unwrap(),
        Err(RconError::DroppedOnDisconnect { .. })
    ));
    assert_eq!(rcon.queued_count(), 0);
}

#[tokio::test]
async fn test_stop_requeues_like_remote_close() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut events = rcon.subscribe();
    let mut server = connect(&rcon, &listener).await;

    let _send = tokio::spawn(rcon.create_command("serverInfo", no_args()).send());
    next_frame(&mut server).await;

    rcon.stop();
    assert_eq!(wait_for_close(&mut events).await, None);
    assert_eq!(rcon.queued_count(), 1);

    // Server sees the socket close.
    let eof = tokio::time::timeout(Duration::from_secs(5), server.next()).await;
    assert!(matches!(eof, Ok(None) | Ok(Some(Err(_)))));
}

#[tokio::test]
async fn test_queued_before_connect_flushes_on_connect() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});

    let send = tokio::spawn(rcon.create_command("version", no_args()).send());
    wait_until(|| rcon.queued_count() == 1).await;

    let mut server = connect(&rcon, &listener).await;
    let request = next_frame(&mut server).await;
    reply(&mut server, &request, &["OK", "BF3", "1"]).await;
    assert_eq!(send.await.unwrap().unwrap(), ["BF3", "1"]);
}

// ── Connect errors ───────────────────────────────────────────────

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let (listener, config) = ephemeral_listener().await;
    drop(listener);

    let rcon = Rcon::new(config, |_, _| {});
    assert!(matches!(
        rcon.connect().await,
        Err(RconError::ConnectFailed { .. })
    ));
    assert!(rcon.phase().is_disconnected());
}

#[tokio::test]
async fn test_double_connect_is_rejected() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let _server = connect(&rcon, &listener).await;

    assert!(matches!(
        rcon.connect().await,
        Err(RconError::AlreadyConnected)
    ));
}

#[tokio::test]
async fn test_malformed_frame_closes_with_reason() {
    let (listener, config) = ephemeral_listener().await;
    let rcon = Rcon::new(config, |_, _| {});
    let mut events = rcon.subscribe();
    let server = connect(&rcon, &listener).await;

    let mut stream = server.into_inner();
    let mut garbage = Vec::new();
    garbage.extend_from_slice(&0u32.to_le_bytes());
    garbage.extend_from_slice(&u32::MAX.to_le_bytes());
    garbage.extend_from_slice(&0u32.to_le_bytes());
    tokio::io::AsyncWriteExt::write_all(&mut stream, &garbage)
        .await
        .unwrap();

    assert!(wait_for_close(&mut events).await.is_some());
    assert!(rcon.phase().is_disconnected());
}
