//! Connection endpoint: WebSocket upgrade, cookie/identity handshake, and
//! the per-session read loop (§4.2, §4.3).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

use crate::identity::{build_identity, mint_peer_id, PeerId};
use crate::lifecycle::{join_room, leave_room};
use crate::room::{resolve_room_key, RoomRegistry};
use crate::router::{dispatch, Outcome};
use crate::session::PeerSession;

/// Frames larger than this are treated as a transport error (§9 open
/// question: the source imposes no limit; we cap it to bound memory use).
const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Bound on a session's outbound queue (§5: unbounded send queues are
/// disallowed). A slow peer's excess frames are dropped, not buffered.
const SEND_QUEUE_CAPACITY: usize = 64;

const WEBRTC_PATH: &str = "/server/webrtc";
const FALLBACK_PATH: &str = "/server/fallback";

struct Handshake {
    rtc_supported: bool,
    peer_id: Option<PeerId>,
    needs_cookie: bool,
    forwarded_for: Option<String>,
    user_agent: String,
}

/// Handle one incoming TCP connection end to end: upgrade, handshake,
/// connect lifecycle, read loop, disconnect lifecycle.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, registry: Arc<RoomRegistry>) {
    let handshake_info: Arc<Mutex<Option<Handshake>>> = Arc::new(Mutex::new(None));
    let handshake_cb = handshake_info.clone();

    let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        let path = req.uri().path();
        let rtc_supported = match path {
            WEBRTC_PATH => true,
            FALLBACK_PATH => false,
            _ => {
                let mut rejection = ErrorResponse::new(Some("unknown endpoint".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                return Err(rejection);
            }
        };

        let peer_id = req
            .headers()
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_peer_id_cookie);
        let needs_cookie = peer_id.is_none();

        let forwarded_for = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let user_agent = req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if needs_cookie {
            let id = mint_peer_id();
            if let Ok(value) = HeaderValue::from_str(&format!(
                "peerid={id}; SameSite=Strict; Secure"
            )) {
                resp.headers_mut().insert("set-cookie", value);
            }
            if let Ok(mut guard) = handshake_cb.lock() {
                *guard = Some(Handshake {
                    rtc_supported,
                    peer_id: Some(id),
                    needs_cookie,
                    forwarded_for,
                    user_agent,
                });
            }
        } else if let Ok(mut guard) = handshake_cb.lock() {
            *guard = Some(Handshake {
                rtc_supported,
                peer_id,
                needs_cookie,
                forwarded_for,
                user_agent,
            });
        }

        Ok(resp)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            error!(addr = %addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let Handshake {
        rtc_supported,
        peer_id,
        forwarded_for,
        user_agent,
        ..
    } = match handshake_info.lock().ok().and_then(|mut g| g.take()) {
        Some(h) => h,
        None => {
            error!(addr = %addr, "handshake rejected before a session could be built");
            return;
        }
    };

    let peer_id = peer_id.unwrap_or_else(mint_peer_id);
    let room_key = resolve_room_key(forwarded_for.as_deref(), &addr.ip().to_string());
    let identity = build_identity(&peer_id, &user_agent);

    debug!(peer = %peer_id, room = %room_key, rtc_supported, "handshake complete");

    let (mut ws_sink, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

    let write_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.to_json_string() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "failed to serialize outbound frame"),
            }
        }
    });

    let (session, mut shutdown_rx) = PeerSession::new(
        peer_id.clone(),
        identity,
        rtc_supported,
        room_key,
        tx,
    );
    let session = Arc::new(session);

    join_room(&session, &registry);

    loop {
        tokio::select! {
            // Fires when `leave_room` calls `close_transport`, whether that
            // runs from this task (below) or from another one (keepalive
            // eviction) — either way the read loop must stop parking on the
            // socket so the connection actually closes (§4.7 step 4).
            _ = &mut shutdown_rx => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_FRAME_BYTES {
                        warn!(peer = %peer_id, size = text.len(), "dropping oversized frame, closing session");
                        break;
                    }
                    if let Outcome::Disconnected = dispatch(&text, &session, &registry).await {
                        write_task.abort();
                        return;
                    }
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(peer = %peer_id, error = %e, "WebSocket transport error");
                    break;
                }
            },
        }
    }

    leave_room(&session, &registry).await;
    write_task.abort();
}

/// Extract the `peerid` value from a raw `Cookie` header, e.g.
/// `"peerid=abc; other=1"`.
fn extract_peer_id_cookie(cookie_header: &str) -> Option<PeerId> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == "peerid").then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_peer_id_cookie_finds_value_among_others() {
        let header = "foo=bar; peerid=abc123; baz=qux";
        assert_eq!(
            extract_peer_id_cookie(header),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn extract_peer_id_cookie_absent_is_none() {
        assert_eq!(extract_peer_id_cookie("foo=bar"), None);
    }
}
