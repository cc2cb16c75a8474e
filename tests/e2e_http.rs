//! End-to-end test over a real TCP listener.
//!
//! Exercises a whole controller/agent session the way the deployed pieces
//! drive it: the agent registers and streams frames, the controller watches
//! the fleet and queues commands, the agent drains and acknowledges them.

use std::net::SocketAddr;

use tether::api::{router, AppState, RouterConfig};
use tether::store::Store;

async fn start_test_server() -> SocketAddr {
    let app = router(AppState::new(Store::memory()), RouterConfig::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

#[tokio::test]
async fn full_agent_controller_session() {
    let addr = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    // Agent comes up.
    let resp: serde_json::Value = client
        .post(format!("{base}/api/register"))
        .json(&serde_json::json!({
            "target_id": "abc",
            "username": "bob",
            "hostname": "desk-01",
            "os": "windows",
            "ip": "10.0.0.5"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], true);

    // Agent streams a frame.
    let frame = "j".repeat(500);
    let resp = client
        .post(format!("{base}/api/screen/abc"))
        .json(&serde_json::json!({"screen": frame, "quality": 60}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // Controller sees the agent online and pulls the frame.
    let targets: serde_json::Value = client
        .get(format!("{base}/api/targets"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(targets[0]["id"], "abc");
    assert_eq!(targets[0]["online"], true);

    let pulled: serde_json::Value = client
        .get(format!("{base}/api/screen/abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pulled["screen"], frame);
    assert_eq!(pulled["quality"], 60);

    // Controller queues a command.
    let resp: serde_json::Value = client
        .post(format!("{base}/api/commands"))
        .json(&serde_json::json!({
            "target_id": "abc",
            "command": {
                "type": "keyboard",
                "data": {"action": "type", "text": "hello"}
            }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], true);
    let command_id = resp["command_id"].as_str().unwrap().to_string();

    // Agent polls, executes, acknowledges.
    let pending: serde_json::Value = client
        .get(format!("{base}/api/commands/abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], command_id.as_str());
    assert_eq!(pending[0]["data"]["text"], "hello");

    let resp: serde_json::Value = client
        .post(format!("{base}/api/command_done"))
        .json(&serde_json::json!({"target_id": "abc", "command_id": command_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], true);

    let pending: serde_json::Value = client
        .get(format!("{base}/api/commands/abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_controllers_never_lose_a_command() {
    let addr = start_test_server().await;
    let base = format!("http://{addr}");

    let enqueue = |key: &'static str| {
        let base = base.clone();
        async move {
            let client = reqwest::Client::new();
            let resp: serde_json::Value = client
                .post(format!("{base}/api/commands"))
                .json(&serde_json::json!({
                    "target_id": "abc",
                    "command": {
                        "type": "keyboard",
                        "data": {"action": "press", "key": key}
                    }
                }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            resp["command_id"].as_str().unwrap().to_string()
        }
    };

    let (a, b) = tokio::join!(
        tokio::spawn(enqueue("enter")),
        tokio::spawn(enqueue("escape")),
    );
    let (id_a, id_b) = (a.unwrap(), b.unwrap());

    let client = reqwest::Client::new();
    let pending: serde_json::Value = client
        .get(format!("{base}/api/commands/abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = pending
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&id_a.as_str()));
    assert!(ids.contains(&id_b.as_str()));
}

#[tokio::test]
async fn unmatched_route_returns_enveloped_404() {
    let addr = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/api/definitely-not-a-route"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Not found");
}
