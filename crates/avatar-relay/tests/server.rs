//! End-to-end tests: a real relay server and real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use avatar_relay::frame::{decode_frame, encode_channel_list, encode_frame, parse_channel_list};
use avatar_relay::prelude::*;
use avatar_relay::Engine;
use avatar_relay_protocol::wire::write_string;
use avatar_relay_protocol::{
    encode_model_sync, ProtocolVariant, LEGACY_C2S, LEGACY_PACK, LEGACY_S2C, MMDSKIN_NETWORK,
    MMDSKIN_PACK,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// How long a test waits for a frame that should arrive.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test waits to be sure nothing arrives.
const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Lets the server process frames already sent by other clients.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn pid(n: u128) -> ParticipantId {
    ParticipantId::from(Uuid::from_u128(n))
}

/// Config with a join sync far enough out that it never fires mid-test.
fn quiet_config() -> RelayConfig {
    RelayConfig {
        join_sync_delay_ms: 60_000,
        ..RelayConfig::default()
    }
}

/// Starts a server on a random port; returns its address and engine.
async fn start_server(config: RelayConfig) -> (String, Arc<Engine>) {
    let server = RelayServer::builder()
        .config(config)
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let engine = server.engine();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, engine)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

/// A test client speaking the relay's framing.
struct Client {
    ws: ClientWs,
}

impl Client {
    /// Connects, logs in as `id`, and consumes the channel announcement.
    async fn join(addr: &str, id: ParticipantId) -> Self {
        let mut client = Self {
            ws: connect(addr).await,
        };
        client.send_login(&id.to_string()).await;
        let (channel, payload) = client.recv().await;
        assert_eq!(channel, REGISTER_CHANNEL, "first frame should announce channels");
        assert!(!payload.is_empty());
        client
    }

    async fn send_login(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .expect("send login");
    }

    async fn send(&mut self, channel: &str, payload: &[u8]) {
        self.ws
            .send(Message::Binary(encode_frame(channel, payload).into()))
            .await
            .expect("send frame");
    }

    async fn register(&mut self, channels: &[&str]) {
        let payload = encode_channel_list(channels.iter().copied());
        self.send(REGISTER_CHANNEL, &payload).await;
    }

    async fn unregister(&mut self, channels: &[&str]) {
        let payload = encode_channel_list(channels.iter().copied());
        self.send(UNREGISTER_CHANNEL, &payload).await;
    }

    async fn recv(&mut self) -> (String, Vec<u8>) {
        let msg = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        let data = msg.into_data();
        let (channel, payload) = decode_frame(&data).expect("frame should decode");
        (channel, payload.to_vec())
    }

    async fn assert_silent(&mut self) {
        let result = tokio::time::timeout(QUIET_PERIOD, self.ws.next()).await;
        assert!(result.is_err(), "expected no frame, got {result:?}");
    }

    /// Waits for the server to close the connection.
    async fn assert_closed(&mut self) {
        let result = tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await;
        match result {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => {}
            other => panic!("expected close, got {other:?}"),
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Raw message: opcode, participant id, then `tail`.
fn message(op: i32, id: ParticipantId, tail: &[u8]) -> Vec<u8> {
    let mut out = op.to_be_bytes().to_vec();
    let (most, least) = id.halves();
    out.extend_from_slice(&most.to_be_bytes());
    out.extend_from_slice(&least.to_be_bytes());
    out.extend_from_slice(tail);
    out
}

fn sparse_select(id: ParticipantId, model: &str) -> Vec<u8> {
    let mut tail = Vec::new();
    write_string(&mut tail, model);
    message(3, id, &tail)
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_announces_outbound_channels() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text(pid(1).to_string().into()))
        .await
        .unwrap();

    let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let data = msg.into_data();
    let (channel, payload) = decode_frame(&data).unwrap();
    assert_eq!(channel, REGISTER_CHANNEL);
    assert_eq!(
        parse_channel_list(payload),
        vec![MMDSKIN_NETWORK, MMDSKIN_PACK, LEGACY_PACK, LEGACY_S2C]
    );
}

#[tokio::test]
async fn test_invalid_login_closes_connection() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut client = Client {
        ws: connect(&addr).await,
    };

    client.send_login("definitely not a uuid").await;

    client.assert_closed().await;
}

#[tokio::test]
async fn test_duplicate_login_rejected() {
    let (addr, _) = start_server(quiet_config()).await;
    let _first = Client::join(&addr, pid(1)).await;

    let mut second = Client {
        ws: connect(&addr).await,
    };
    second.send_login(&pid(1).to_string()).await;

    second.assert_closed().await;
}

// =========================================================================
// Forwarding
// =========================================================================

#[tokio::test]
async fn test_message_forwarded_to_other_participants() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    let mut c = Client::join(&addr, pid(3)).await;
    for client in [&mut a, &mut b, &mut c] {
        client.register(&[MMDSKIN_NETWORK]).await;
    }
    settle().await;

    let raw = message(2, pid(1), &[0, 0, 0, 1]);
    a.send(MMDSKIN_NETWORK, &raw).await;

    for client in [&mut b, &mut c] {
        let (channel, payload) = client.recv().await;
        assert_eq!(channel, MMDSKIN_NETWORK);
        assert_eq!(payload, raw);
    }
    a.assert_silent().await;
}

#[tokio::test]
async fn test_short_payload_still_forwarded() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[MMDSKIN_PACK]).await;
    settle().await;

    a.send(MMDSKIN_PACK, &[1, 2, 3, 4, 5]).await;

    assert_eq!(b.recv().await, (MMDSKIN_PACK.to_string(), vec![1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn test_participant_not_listening_is_skipped() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[LEGACY_PACK]).await;
    settle().await;

    a.send(MMDSKIN_NETWORK, &message(2, pid(1), &[])).await;

    b.assert_silent().await;
}

#[tokio::test]
async fn test_participant_that_unregistered_everything_is_skipped() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[LEGACY_PACK]).await;
    b.unregister(&[LEGACY_PACK]).await;
    settle().await;

    a.send(MMDSKIN_NETWORK, &message(4, pid(1), &[0, 0, 0, 7])).await;
    a.send(LEGACY_PACK, &message(2, pid(1), &[])).await;

    b.assert_silent().await;
}

#[tokio::test]
async fn test_legacy_inbound_forwarded_on_reply_channel() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[LEGACY_C2S, LEGACY_S2C]).await;
    settle().await;

    let raw = message(2, pid(1), &[]);
    a.send(LEGACY_C2S, &raw).await;

    assert_eq!(b.recv().await, (LEGACY_S2C.to_string(), raw));
}

#[tokio::test]
async fn test_unframed_and_unknown_channel_frames_dropped() {
    let (addr, _) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[MMDSKIN_PACK]).await;
    settle().await;

    // Varint with its continuation bit set and nothing after it.
    a.ws.send(Message::Binary(vec![0xffu8].into())).await.unwrap();
    a.send("othermod:chat", b"hello").await;
    b.assert_silent().await;

    // The connection is still usable.
    a.send(MMDSKIN_PACK, &[7]).await;
    assert_eq!(b.recv().await, (MMDSKIN_PACK.to_string(), vec![7]));
}

// =========================================================================
// Model cache
// =========================================================================

#[tokio::test]
async fn test_model_select_cached_and_served_on_request() {
    let (addr, engine) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[MMDSKIN_PACK]).await;
    settle().await;

    let select = sparse_select(pid(1), "Miku");
    a.send(MMDSKIN_PACK, &select).await;
    assert_eq!(b.recv().await, (MMDSKIN_PACK.to_string(), select));
    assert_eq!(engine.cache().get(pid(1)).as_deref(), Some("Miku"));

    let mut c = Client::join(&addr, pid(3)).await;
    c.register(&[MMDSKIN_PACK]).await;
    settle().await;
    c.send(MMDSKIN_PACK, &message(10, pid(3), &[])).await;

    assert_eq!(
        c.recv().await,
        (
            MMDSKIN_PACK.to_string(),
            encode_model_sync(ProtocolVariant::Sparse, pid(1), "Miku")
        )
    );
    // The request itself is never broadcast.
    b.assert_silent().await;
    a.assert_silent().await;
}

#[tokio::test]
async fn test_join_sync_pushes_cached_models_after_delay() {
    let config = RelayConfig {
        join_sync_delay_ms: 300,
        ..RelayConfig::default()
    };
    let (addr, engine) = start_server(config).await;
    let mut a = Client::join(&addr, pid(1)).await;
    a.register(&[MMDSKIN_NETWORK]).await;
    a.send(
        MMDSKIN_NETWORK,
        &encode_model_sync(ProtocolVariant::FixedFields, pid(1), "Haku"),
    )
    .await;
    settle().await;
    assert_eq!(engine.cache().len(), 1);

    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[MMDSKIN_NETWORK]).await;

    assert_eq!(
        b.recv().await,
        (
            MMDSKIN_NETWORK.to_string(),
            encode_model_sync(ProtocolVariant::FixedFields, pid(1), "Haku")
        )
    );
}

#[tokio::test]
async fn test_disconnect_announces_empty_model() {
    let (addr, engine) = start_server(quiet_config()).await;
    let mut a = Client::join(&addr, pid(1)).await;
    let mut b = Client::join(&addr, pid(2)).await;
    b.register(&[MMDSKIN_NETWORK]).await;
    settle().await;

    let select = encode_model_sync(ProtocolVariant::FixedFields, pid(1), "Luka");
    a.send(MMDSKIN_NETWORK, &select).await;
    assert_eq!(b.recv().await.1, select);

    a.close().await;

    assert_eq!(
        b.recv().await,
        (
            MMDSKIN_NETWORK.to_string(),
            encode_model_sync(ProtocolVariant::FixedFields, pid(1), "")
        )
    );
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_rejoin_after_disconnect_succeeds() {
    let (addr, _) = start_server(quiet_config()).await;
    let a = Client::join(&addr, pid(1)).await;
    a.close().await;
    settle().await;

    // Same id, new connection: the old session is gone.
    let _again = Client::join(&addr, pid(1)).await;
}
