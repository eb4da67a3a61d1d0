//! End-to-end tests of the bridge server and client over loopback TCP.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use simgate_bridge::{
    ActionTable, BridgeClient, BridgeError, BridgeResponse, BridgeServer, BridgeSettings,
    HandlerError, JsonObject,
};
use simgate_core::{ExecutionContext, SimulationState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Actions: `tick` reports the state's tick, `rename` writes the server
/// name, `hold` and `slow` block the context, `missing` fails with 404.
struct TestActions;

impl ActionTable for TestActions {
    fn contains(&self, action: &str) -> bool {
        matches!(action, "tick" | "rename" | "hold" | "slow" | "missing")
    }

    fn execute(
        &self,
        action: &str,
        data: &JsonObject,
        world: &mut SimulationState,
    ) -> Result<JsonObject, HandlerError> {
        let mut body = JsonObject::new();
        match action {
            "tick" => {
                body.insert("tick".to_owned(), json!(world.tick));
                body.insert("status".to_owned(), json!("online"));
            }
            "rename" => {
                let name = data
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| HandlerError::bad_request("name is required"))?;
                world.identity.name = name.to_owned();
                body.insert("name".to_owned(), json!(world.identity.name));
            }
            "hold" => {
                std::thread::sleep(HOLD);
                world.tick = world.tick.saturating_add(1);
                body.insert("tick".to_owned(), json!(world.tick));
            }
            "slow" => std::thread::sleep(Duration::from_millis(400)),
            _ => return Err(HandlerError::not_found("Player not found")),
        }
        Ok(body)
    }
}

/// How long the `hold` action blocks the context.
const HOLD: Duration = Duration::from_millis(200);

async fn bind(workers: usize, handoff: Duration) -> (ExecutionContext, BridgeServer, String) {
    let context = ExecutionContext::spawn(
        SimulationState::default(),
        Duration::from_secs(3600),
        handoff,
    )
    .unwrap();
    let settings = BridgeSettings {
        workers,
        handoff_timeout: handoff,
        read_timeout: Duration::from_millis(500),
    };
    let server = BridgeServer::bind("127.0.0.1:0", settings, context.handle(), Arc::new(TestActions))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    (context, server, addr)
}

async fn start_with(workers: usize, handoff: Duration) -> (ExecutionContext, String) {
    let (context, server, addr) = bind(workers, handoff).await;
    tokio::spawn(server.serve());
    (context, addr)
}

async fn start(handoff: Duration) -> (ExecutionContext, String) {
    start_with(4, handoff).await
}

async fn raw_exchange(addr: &str, line: &str) -> JsonObject {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn successful_action_merges_body_with_envelope() {
    let (_context, addr) = start(Duration::from_secs(5)).await;
    let client = BridgeClient::default();

    let response = client.try_send(&addr, "tick", JsonObject::new()).await.unwrap();
    assert!(response.success);
    assert_eq!(response.status, 200);
    assert!(response.error.is_none());
    assert!(response.body.contains_key("tick"));
    // The envelope status replaced the handler's "status" field.
    assert!(!response.body.contains_key("status"));
}

#[tokio::test]
async fn actions_mutate_state_on_the_context() {
    let (context, addr) = start(Duration::from_secs(5)).await;
    let client = BridgeClient::default();

    let mut data = JsonObject::new();
    data.insert("name".to_owned(), json!("bridge-node"));
    let response = client.send(&addr, "rename", data).await;
    assert!(response.success);
    assert_eq!(response.body["name"], json!("bridge-node"));

    let state = context.shutdown().unwrap();
    assert_eq!(state.identity.name, "bridge-node");
}

#[tokio::test]
async fn unknown_action_is_rejected_with_echoed_id() {
    let (_context, addr) = start(Duration::from_secs(5)).await;

    let reply = raw_exchange(
        &addr,
        "{\"action\":\"teleport\",\"requestId\":\"req-1\",\"data\":{}}\n",
    )
    .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["status"], json!(400));
    assert_eq!(reply["requestId"], json!("req-1"));
    assert_eq!(reply["error"], json!("Unknown action: teleport"));
    assert!(reply["timestamp"].is_i64());
}

#[tokio::test]
async fn undecodable_line_gets_400_without_request_id() {
    let (_context, addr) = start(Duration::from_secs(5)).await;

    let reply = raw_exchange(&addr, "this is not json\n").await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["status"], json!(400));
    assert!(!reply.contains_key("requestId"));
    assert!(
        reply["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request format")
    );
}

#[tokio::test]
async fn handler_status_is_carried_through() {
    let (_context, addr) = start(Duration::from_secs(5)).await;
    let client = BridgeClient::default();

    let response = client.send(&addr, "missing", JsonObject::new()).await;
    assert!(!response.success);
    assert_eq!(response.status, 404);
    assert_eq!(response.error.as_deref(), Some("Player not found"));

    let response = client.send(&addr, "rename", JsonObject::new()).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn blocked_context_yields_408_after_the_handoff_timeout() {
    let (_context, addr) = start(Duration::from_millis(100)).await;
    let client = BridgeClient::default();

    let started = Instant::now();
    let response = client.send(&addr, "slow", JsonObject::new()).await;
    let elapsed = started.elapsed();

    assert!(!response.success);
    assert_eq!(response.status, 408);
    assert_eq!(response.error.as_deref(), Some("Request processing timed out"));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(400));
}

#[tokio::test]
async fn single_worker_serves_a_burst_one_connection_at_a_time() {
    // One hold fits inside the handoff timeout, two back to back do not:
    // the second request only reaches the context once the first
    // connection has been answered and its worker released.
    let (context, addr) = start_with(1, HOLD.saturating_add(Duration::from_millis(100))).await;
    let client = BridgeClient::default();

    let started = Instant::now();
    let (first, second) = tokio::join!(
        client.send(&addr, "hold", JsonObject::new()),
        client.send(&addr, "hold", JsonObject::new()),
    );
    let elapsed = started.elapsed();

    assert_eq!(first.status, 200, "first: {:?}", first.error);
    assert_eq!(second.status, 200, "second: {:?}", second.error);
    let mut ticks = vec![first.body["tick"].clone(), second.body["tick"].clone()];
    ticks.sort_by_key(|t| t.as_u64());
    assert_eq!(ticks, vec![json!(1), json!(2)]);
    assert!(elapsed >= HOLD.saturating_mul(2));

    let state = context.shutdown().unwrap();
    assert_eq!(state.tick, 2);
}

#[tokio::test]
async fn shutdown_drains_in_flight_connections() {
    let (_context, server, addr) = bind(1, Duration::from_secs(5)).await;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_until(async {
        let _ = stop_rx.await;
    }));

    let in_flight = {
        let addr = addr.clone();
        tokio::spawn(async move { BridgeClient::default().send(&addr, "hold", JsonObject::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let response = in_flight.await.unwrap();
    assert_eq!(response.status, 200);
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .unwrap()
        .unwrap();

    // The listener is closed once serving returns.
    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn silent_client_is_disconnected_after_read_timeout() {
    let (_context, addr) = start(Duration::from_secs(5)).await;

    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    let read = tokio::time::timeout(Duration::from_secs(3), reader.read_line(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, 0);
}

#[tokio::test]
async fn correlation_mismatch_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut line = String::new();
        BufReader::new(read_half).read_line(&mut line).await.unwrap();
        let reply = BridgeResponse::success("someone-else".to_owned(), JsonObject::new()).encode();
        write_half.write_all(reply.as_bytes()).await.unwrap();
    });

    let client = BridgeClient::default();
    let error = client
        .try_send(&addr, "tick", JsonObject::new())
        .await
        .unwrap_err();
    assert!(matches!(error, BridgeError::CorrelationMismatch { .. }));
}

#[tokio::test]
async fn unreachable_node_surfaces_as_synthetic_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let response = BridgeClient::default()
        .send(&addr, "tick", JsonObject::new())
        .await;
    assert!(!response.success);
    assert_eq!(response.status, 500);
    assert!(
        response
            .error
            .unwrap()
            .starts_with("TCP communication failed")
    );
}
