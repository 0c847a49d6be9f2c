//! Per-connection handler: login, channel registration, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the login frame → participant id
//!   2. Register the session, announce the relay's channels, schedule
//!      the join sync
//!   3. Loop: receive frames → register/unregister or hand to the engine
//!   4. On exit, the session guard removes the session and tells the
//!      engine the participant left

use std::sync::Arc;
use std::time::Duration;

use avatar_relay_protocol::ParticipantId;
use avatar_relay_session::{OutboundFrame, SessionError};
use avatar_relay_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::{
    decode_frame, encode_channel_list, encode_frame, parse_channel_list, REGISTER_CHANNEL,
    UNREGISTER_CHANNEL,
};
use crate::server::ServerState;
use crate::RelayError;

/// How long a new connection has to send its login frame.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that ends a participant's session when the handler exits.
///
/// Runs even if the handler panics. Both steps are synchronous, so unlike
/// an async cleanup nothing has to be spawned.
struct SessionGuard {
    participant: ParticipantId,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let participant = self.participant;
        if self.state.host.disconnect(participant).is_ok() {
            let delivered = self.state.engine.on_disconnect(participant);
            tracing::info!(%participant, delivered, "participant left");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), RelayError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Login ---
    let participant = match receive_login(&conn).await {
        Ok(participant) => participant,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // --- Step 2: Session ---
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    if let Err(e) = state.host.connect(participant, tx) {
        tracing::info!(%conn_id, %participant, error = %e, "login rejected");
        let _ = conn.close().await;
        return Err(e.into());
    }
    let guard = SessionGuard {
        participant,
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %participant, "participant joined");

    let conn = Arc::new(conn);

    // The writer drains the outbound queue until the session is removed
    // (which drops the sender) or the socket fails.
    let writer = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let bytes = encode_frame(&frame.channel, &frame.payload);
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%participant, error = %e, "write failed");
                    break;
                }
            }
        })
    };

    // Tell the client which channels the relay speaks, like a game server
    // does on join. This is also the client's login acknowledgement.
    let registry = state.engine.registry();
    let announce = encode_channel_list(registry.outbound_channels());
    state
        .host
        .send_frame(participant, OutboundFrame::new(REGISTER_CHANNEL, &announce))?;

    state.engine.on_join(participant);

    // --- Step 3: Frame loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%participant, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%participant, error = %e, "recv error");
                break;
            }
        };

        let (channel, payload) = match decode_frame(&data) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(%participant, len = data.len(), error = %e, "dropping unframed message");
                continue;
            }
        };

        route_frame(&state, participant, &channel, payload);
    }

    // --- Step 4: Cleanup ---
    drop(guard);
    writer.abort();
    Ok(())
}

/// Reads the first frame and parses it as a participant id.
async fn receive_login(conn: &WebSocketConnection) -> Result<ParticipantId, RelayError> {
    let data = match tokio::time::timeout(LOGIN_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(SessionError::InvalidLogin("connection closed before login".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(SessionError::InvalidLogin("login timed out".into()).into()),
    };

    let text = std::str::from_utf8(&data)
        .map_err(|_| SessionError::InvalidLogin("login is not UTF-8".into()))?;
    let id = Uuid::parse_str(text.trim())
        .map_err(|e| SessionError::InvalidLogin(format!("{text:?}: {e}")))?;
    Ok(ParticipantId::from(id))
}

/// Handles one decoded frame from `participant`.
fn route_frame(state: &ServerState, participant: ParticipantId, channel: &str, payload: &[u8]) {
    match channel {
        REGISTER_CHANNEL => {
            let names = parse_channel_list(payload);
            if let Err(e) = state.host.register_channels(participant, &names) {
                tracing::debug!(%participant, error = %e, "register failed");
            }
        }
        UNREGISTER_CHANNEL => {
            let names = parse_channel_list(payload);
            if let Err(e) = state.host.unregister_channels(participant, &names) {
                tracing::debug!(%participant, error = %e, "unregister failed");
            }
        }
        _ => {
            let outcome = state.engine.on_message(channel, participant, payload);
            tracing::trace!(%participant, channel, len = payload.len(), ?outcome, "dispatched");
        }
    }
}
