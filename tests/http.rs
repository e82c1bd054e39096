use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct XpShare {
    stat: String,
    amount: u32,
}

#[derive(Debug, Deserialize)]
struct PreviewResponse {
    computed_rank: String,
    total_score: f64,
    final_rank: String,
    is_manual: bool,
    xp_total: u32,
    xp_split: Vec<XpShare>,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct RankRow {
    rank: String,
    xp: u32,
    min_score_exclusive: Option<f64>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/ranks")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_gate_web"))
        .env("PORT", port.to_string())
        .env("GATE_STATS", "STR,INT,CHA,WIL,WIS")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn preview(server: &TestServer, body: serde_json::Value) -> reqwest::Response {
    Client::new()
        .post(format!("{}/api/preview", server.base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_preview_blank_form_is_e_rank() {
    let server = shared_server().await;

    let response: PreviewResponse = preview(&server, serde_json::json!({}))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(response.computed_rank, "E");
    assert_eq!(response.final_rank, "E");
    assert!((response.total_score - 6.25).abs() < 1e-9);
    assert!(!response.is_manual);
    assert_eq!(response.xp_total, 15);
    assert_eq!(response.summary, "STR: 15 XP");
}

#[tokio::test]
async fn http_preview_splits_monarch_reward() {
    let server = shared_server().await;

    let response: PreviewResponse = preview(
        &server,
        serde_json::json!({
            "duration_minutes": 500,
            "effort_level": 10,
            "impact_level": 5,
            "fear_factor": 1.5,
            "primary_stat": "STR",
            "secondary_stat": "INT"
        }),
    )
    .await
    .json()
    .await
    .unwrap();

    assert_eq!(response.final_rank, "Monarch");
    assert!((response.total_score - 300.0).abs() < 1e-9);
    assert_eq!(response.xp_split.len(), 2);
    assert_eq!(response.xp_split[0].stat, "STR");
    assert_eq!(response.xp_split[0].amount, 900);
    assert_eq!(response.xp_split[1].stat, "INT");
    assert_eq!(response.xp_split[1].amount, 600);
}

#[tokio::test]
async fn http_preview_manual_rank_overrides() {
    let server = shared_server().await;

    let response: PreviewResponse = preview(
        &server,
        serde_json::json!({ "manual_rank": "SS", "secondary_stat": "STR" }),
    )
    .await
    .json()
    .await
    .unwrap();

    assert_eq!(response.computed_rank, "E");
    assert_eq!(response.final_rank, "SS");
    assert!(response.is_manual);
    assert_eq!(response.summary, "STR: 1200 XP");
}

#[tokio::test]
async fn http_preview_rejects_unknown_rank() {
    let server = shared_server().await;

    let response = preview(&server, serde_json::json!({ "manual_rank": "Z" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_ranks_table_is_ordered() {
    let server = shared_server().await;

    let rows: Vec<RankRow> = Client::new()
        .get(format!("{}/api/ranks", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let codes: Vec<&str> = rows.iter().map(|row| row.rank.as_str()).collect();
    assert_eq!(codes, ["E", "D", "C", "B", "A", "S", "SS", "Monarch"]);
    assert_eq!(rows[0].min_score_exclusive, None);
    assert_eq!(rows[7].xp, 1500);
    assert_eq!(rows[7].min_score_exclusive, Some(280.0));
}

#[tokio::test]
async fn http_index_renders_query_preview() {
    let server = shared_server().await;

    let html = Client::new()
        .get(format!(
            "{}/?duration_minutes=240&effort_level=10&impact_level=5&fear_factor=1.0",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(html.contains("S-Rank (Score: 200.0)"));
    assert!(html.contains("STR: 700 XP"));
}
