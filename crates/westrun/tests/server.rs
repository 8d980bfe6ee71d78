//! Integration tests for the westrun server.

use std::time::Duration;

use westrun::Arg;
use westrun::ArgKind;
use westrun::CloseCode;
use westrun::Config;
use westrun::Error;
use westrun::Globals;
use westrun::Interface;
use westrun::Message;
use westrun::MockPeer;
use westrun::MockSession;
use westrun::ObjectId;
use westrun::Packet;
use westrun::Payload;
use westrun::Server;
use westrun::SessionId;
use westrun::TransportError;
use westrun::mock_session::requests;
use westrun::registry::ERROR_EVENT;
use westrun::registry::GLOBAL_EVENT;

type R<T> = anyhow::Result<T>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A seat global whose `get_pointer` creates pointers that echo `ping` serials.
fn globals() -> Globals {
    let pointer = Interface::builder("pointer", 7)
        .request("release", &[], |ctx, _| {
            let id = ctx.object();
            ctx.destroy(id)?;
            Ok(())
        })
        .request("ping", &[ArgKind::Uint], |ctx, args| {
            let serial = args[0].as_uint().unwrap_or_default();
            let id = ctx.object();
            ctx.post_event(id, 0, vec![Arg::Uint(serial)]);
            Ok(())
        })
        .build()
        .unwrap();

    let seat = Interface::builder("seat", 8)
        .constructor("get_pointer", &[ArgKind::NewId], pointer, |_, _| Ok(()))
        .build()
        .unwrap();

    Globals::new().with(seat)
}

fn signature(message: &Message) -> Vec<ArgKind> {
    match (message.target, message.opcode) {
        (ObjectId::ROOT, GLOBAL_EVENT) => vec![ArgKind::NewId, ArgKind::String, ArgKind::Uint],
        (ObjectId::ROOT, ERROR_EVENT) => vec![ArgKind::Object, ArgKind::Uint, ArgKind::String],
        _ => vec![ArgKind::Uint],
    }
}

async fn next_packet(peer: &mut MockPeer) -> R<Packet> {
    tokio::time::timeout(TIMEOUT, peer.packet())
        .await?
        .ok_or_else(|| anyhow::anyhow!("session dropped"))
}

async fn next_events(peer: &mut MockPeer) -> R<Vec<Message>> {
    let packet = next_packet(peer).await?;
    Ok(MockPeer::decode(&packet, signature)?)
}

async fn wait_for_count(server: &Server, count: usize) -> R<()> {
    tokio::time::timeout(TIMEOUT, async {
        while server.connection_count() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}

fn payload(messages: &[Message]) -> R<Payload> {
    Ok(requests(messages)?)
}

// --- Test 1: Globals on Open ---

#[tokio::test]
async fn test_open_delivers_globals_first() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::pair(1);

    server.on_open(session).await?;
    assert_eq!(server.connection_count(), 1);

    let announced = next_events(&mut peer).await?;
    assert_eq!(announced.len(), 1);
    assert_eq!(
        announced[0],
        Message::new(
            ObjectId::ROOT,
            GLOBAL_EVENT,
            vec![Arg::NewId(ObjectId(1)), Arg::from("seat"), Arg::Uint(8)]
        )
    );
    Ok(())
}

// --- Test 2: Request Round Trip ---

#[tokio::test]
async fn test_requests_produce_events() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::pair(1);
    server.on_open(session).await?;
    next_events(&mut peer).await?;

    server.on_message(
        SessionId(1),
        payload(&[
            Message::new(ObjectId(1), 0, vec![Arg::NewId(ObjectId(2))]),
            Message::new(ObjectId(2), 1, vec![Arg::Uint(41)]),
        ])?,
    )?;
    server.on_message(SessionId(1), payload(&[Message::new(ObjectId(2), 1, vec![Arg::Uint(42)])])?)?;

    let first = next_events(&mut peer).await?;
    let second = next_events(&mut peer).await?;
    assert_eq!(first, vec![Message::new(ObjectId(2), 0, vec![Arg::Uint(41)])]);
    assert_eq!(second, vec![Message::new(ObjectId(2), 0, vec![Arg::Uint(42)])]);
    Ok(())
}

// --- Test 3: Isolation Between Connections ---

#[tokio::test]
async fn test_each_connection_starts_at_one() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let mut peers = Vec::new();

    for id in 1..=8 {
        let (session, peer) = MockSession::pair(id);
        server.on_open(session).await?;
        peers.push(peer);
    }
    assert_eq!(server.connection_count(), 8);

    for peer in &mut peers {
        let announced = next_events(peer).await?;
        assert_eq!(announced[0].args[0], Arg::NewId(ObjectId(1)));
    }
    Ok(())
}

#[tokio::test]
async fn test_violation_closes_only_that_connection() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (bad, mut bad_peer) = MockSession::pair(1);
    let (good, mut good_peer) = MockSession::pair(2);
    server.on_open(bad).await?;
    server.on_open(good).await?;
    next_events(&mut bad_peer).await?;
    next_events(&mut good_peer).await?;

    server.on_message(SessionId(1), payload(&[Message::new(ObjectId(999), 0, vec![])])?)?;

    let reported = next_events(&mut bad_peer).await?;
    assert_eq!(reported[0].opcode, ERROR_EVENT);
    assert_eq!(reported[0].args[0], Arg::Object(ObjectId(999)));

    let reason = tokio::time::timeout(TIMEOUT, bad_peer.closed()).await?;
    assert_eq!(reason.map(|r| r.code), Some(CloseCode::ProtocolError));

    wait_for_count(&server, 1).await?;
    assert_eq!(server.clients(), vec![SessionId(2)]);
    assert!(matches!(
        server.on_message(SessionId(1), Payload::binary(Vec::new())),
        Err(Error::UnknownSession(_))
    ));

    server.on_message(
        SessionId(2),
        payload(&[
            Message::new(ObjectId(1), 0, vec![Arg::NewId(ObjectId(2))]),
            Message::new(ObjectId(2), 1, vec![Arg::Uint(5)]),
        ])?,
    )?;
    let echoed = next_events(&mut good_peer).await?;
    assert_eq!(echoed[0].args, vec![Arg::Uint(5)]);
    Ok(())
}

// --- Test 4: Closing ---

#[tokio::test]
async fn test_close_twice() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::pair(1);
    server.on_open(session).await?;

    assert!(server.on_close(SessionId(1)).await);
    assert!(!server.on_close(SessionId(1)).await);
    assert_eq!(server.connection_count(), 0);
    assert!(peer.try_closed().is_none());
    Ok(())
}

#[tokio::test]
async fn test_close_after_violation() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::pair(1);
    server.on_open(session).await?;

    server.on_message(SessionId(1), Payload::Text("hi".into()))?;
    tokio::time::timeout(TIMEOUT, peer.closed()).await?;
    wait_for_count(&server, 0).await?;

    assert!(!server.on_close(SessionId(1)).await);
    Ok(())
}

#[tokio::test]
async fn test_transport_error_closes_connection() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::pair(1);
    server.on_open(session).await?;

    server.on_error(SessionId(1), TransportError::Io("broken pipe".into()))?;

    let reason = tokio::time::timeout(TIMEOUT, peer.closed()).await?;
    assert_eq!(reason.map(|r| r.code), Some(CloseCode::InternalError));
    wait_for_count(&server, 0).await?;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_everyone() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (a, mut peer_a) = MockSession::pair(1);
    let (b, mut peer_b) = MockSession::pair(2);
    server.on_open(a).await?;
    server.on_open(b).await?;

    server.shutdown().await;

    assert_eq!(server.connection_count(), 0);
    assert_eq!(peer_a.try_closed().map(|r| r.code), Some(CloseCode::Normal));
    assert_eq!(peer_b.try_closed().map(|r| r.code), Some(CloseCode::Normal));
    Ok(())
}

// --- Test 5: Session Table ---

#[tokio::test]
async fn test_refused_session_is_not_registered() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (session, mut peer) = MockSession::new(1, Some("chat"));

    let result = server.on_open(session).await;
    assert!(matches!(result, Err(Error::Negotiation { .. })));
    assert_eq!(server.connection_count(), 0);
    assert_eq!(peer.try_closed().map(|r| r.code), Some(CloseCode::ProtocolError));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_session_is_rejected() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (first, _first_peer) = MockSession::pair(1);
    let (second, _second_peer) = MockSession::pair(1);

    server.on_open(first).await?;
    let result = server.on_open(second).await;
    assert!(matches!(result, Err(Error::SessionExists(SessionId(1)))));
    assert_eq!(server.connection_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_opens_admit_one() -> R<()> {
    init_tracing();
    let server = Server::new(globals());
    let (first, first_peer) = MockSession::pair(1);
    let (second, second_peer) = MockSession::pair(1);

    let (a, b) = tokio::join!(server.on_open(first), server.on_open(second));
    let first_won = a.is_ok();
    assert_ne!(a.is_ok(), b.is_ok());
    let rejected = if first_won { b } else { a };
    assert!(matches!(rejected, Err(Error::SessionExists(SessionId(1)))));
    assert_eq!(server.connection_count(), 1);

    let mut peer = if first_won { first_peer } else { second_peer };
    next_events(&mut peer).await?;
    server.on_message(
        SessionId(1),
        payload(&[
            Message::new(ObjectId(1), 0, vec![Arg::NewId(ObjectId(2))]),
            Message::new(ObjectId(2), 1, vec![Arg::Uint(9)]),
        ])?,
    )?;
    let echoed = next_events(&mut peer).await?;
    assert_eq!(echoed, vec![Message::new(ObjectId(2), 0, vec![Arg::Uint(9)])]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_session() -> R<()> {
    let server = Server::new(globals());
    let result = server.on_message(SessionId(9), Payload::binary(Vec::new()));
    assert!(matches!(result, Err(Error::UnknownSession(SessionId(9)))));
    Ok(())
}

#[tokio::test]
async fn test_custom_config() -> R<()> {
    init_tracing();
    let config = Config::new().subprotocol("greenfield").error_event(false);
    let server = Server::with_config(globals(), config);
    let (session, mut peer) = MockSession::new(1, Some("greenfield"));
    server.on_open(session.clone()).await?;
    next_events(&mut peer).await?;

    server.on_message(SessionId(1), payload(&[Message::new(ObjectId(1), 9, vec![])])?)?;
    tokio::time::timeout(TIMEOUT, peer.closed()).await?;

    // no error event when disabled
    assert!(peer.try_packet().is_none());
    assert!(session.is_closed());
    Ok(())
}
