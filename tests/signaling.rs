//! End-to-end scenarios from spec §8 (S1-S3, S5-S6), driving the real
//! server over actual WebSocket connections.

use std::net::SocketAddr;
use std::time::Duration;

use drpl_signal::SignalingServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_server() -> SocketAddr {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = SignalingServer::bind(addr).await.unwrap();
    let local_addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    local_addr
}

async fn connect(
    addr: SocketAddr,
    path: &str,
    cookie: Option<&str>,
) -> (
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Option<String>,
) {
    let url = format!("ws://{addr}{path}");
    let mut request = url.into_client_request().unwrap();
    if let Some(cookie) = cookie {
        request.headers_mut().insert(
            "cookie",
            format!("peerid={cookie}").parse().unwrap(),
        );
    }

    let (stream, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    (stream, set_cookie)
}

fn peer_id_from_set_cookie(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap()
        .trim_start_matches("peerid=")
        .to_string()
}

async fn recv_json(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("transport error");
    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn s1_first_peer_gets_cookie_empty_roster_and_display_name() {
    let addr = spawn_server().await;
    let (mut a, set_cookie) = connect(addr, "/server/webrtc", None).await;

    assert!(set_cookie.is_some(), "first connection should set a cookie");

    let peers = recv_json(&mut a).await;
    assert_eq!(peers["type"], "peers");
    assert_eq!(peers["peers"].as_array().unwrap().len(), 0);

    let display_name = recv_json(&mut a).await;
    assert_eq!(display_name["type"], "display-name");
    assert!(display_name["message"]["displayName"].is_string());
}

#[tokio::test]
async fn s2_second_peer_joins_and_both_see_each_other() {
    let addr = spawn_server().await;
    let (mut a, _) = connect(addr, "/server/webrtc", None).await;
    let _ = recv_json(&mut a).await; // peers
    let _ = recv_json(&mut a).await; // display-name

    let (mut b, _) = connect(addr, "/server/fallback", None).await;

    // A sees peer-joined for B before B's own setup completes.
    let joined = recv_json(&mut a).await;
    assert_eq!(joined["type"], "peer-joined");
    assert_eq!(joined["peer"]["rtcSupported"], false);

    // B sees A (rtcSupported true) in its initial roster.
    let peers = recv_json(&mut b).await;
    assert_eq!(peers["type"], "peers");
    let roster = peers["peers"].as_array().unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["rtcSupported"], true);

    let _ = recv_json(&mut b).await; // display-name
}

#[tokio::test]
async fn s3_relay_injects_verified_sender_and_strips_to() {
    let addr = spawn_server().await;
    let (mut a, cookie_a) = connect(addr, "/server/webrtc", None).await;
    let peer_a = peer_id_from_set_cookie(&cookie_a.unwrap());
    let _ = recv_json(&mut a).await;
    let _ = recv_json(&mut a).await;

    let (mut b, cookie_b) = connect(addr, "/server/webrtc", None).await;
    let peer_b = peer_id_from_set_cookie(&cookie_b.unwrap());
    let _ = recv_json(&mut a).await; // peer-joined at A
    let _ = recv_json(&mut b).await; // peers at B
    let _ = recv_json(&mut b).await; // display-name at B

    b.send(Message::Text(
        json!({"type": "signal", "to": peer_a, "sender": "spoof", "sdp": "offer-data"})
            .to_string(),
    ))
    .await
    .unwrap();

    let relayed = recv_json(&mut a).await;
    assert_eq!(relayed["type"], "signal");
    assert_eq!(relayed["sender"], peer_b);
    assert_eq!(relayed["sdp"], "offer-data");
    assert!(relayed.get("to").is_none());
}

#[tokio::test]
async fn s5_unknown_recipient_produces_no_frame_and_session_stays_open() {
    let addr = spawn_server().await;
    let (mut a, _) = connect(addr, "/server/webrtc", None).await;
    let _ = recv_json(&mut a).await;
    let _ = recv_json(&mut a).await;

    a.send(Message::Text(
        json!({"type": "signal", "to": "ZZZ"}).to_string(),
    ))
    .await
    .unwrap();

    // No frame should arrive; confirm the session is still responsive by
    // having it relay to itself-via-a-second-connection afterward.
    let result = tokio::time::timeout(Duration::from_millis(300), a.next()).await;
    assert!(result.is_err(), "expected no frame for an unknown recipient");
}

#[tokio::test]
async fn s6_reconnect_with_same_cookie_preserves_display_name() {
    let addr = spawn_server().await;
    let (mut a, cookie) = connect(addr, "/server/webrtc", None).await;
    let peer_id = peer_id_from_set_cookie(&cookie.unwrap());
    let _ = recv_json(&mut a).await;
    let first_name = recv_json(&mut a).await;

    a.close(None).await.ok();
    drop(a);

    let (mut a2, _) = connect(addr, "/server/webrtc", Some(&peer_id)).await;
    let _ = recv_json(&mut a2).await;
    let second_name = recv_json(&mut a2).await;

    assert_eq!(
        first_name["message"]["displayName"],
        second_name["message"]["displayName"]
    );
}
