//! End-to-end proxy behavior over real sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::SessionDocument;
use pulse_recorder::{Recorder, RecorderConfig, RecorderEvent, RecorderState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    recorder: Arc<Recorder>,
    addr: SocketAddr,
    events: mpsc::Receiver<RecorderEvent>,
    out_dir: tempfile::TempDir,
    run: JoinHandle<Result<(), pulse_recorder::RecorderError>>,
}

async fn start_recorder() -> Harness {
    let out_dir = tempfile::tempdir().unwrap();
    let config = RecorderConfig {
        addr: "127.0.0.1:0".to_string(),
        out_dir: out_dir.path().to_path_buf(),
        drain: Duration::from_millis(20),
        shutdown_deadline: Duration::from_millis(300),
        ..RecorderConfig::default()
    };
    let (recorder, events) = Recorder::new(config).unwrap();
    let recorder = Arc::new(recorder);

    let run = tokio::spawn({
        let recorder = Arc::clone(&recorder);
        async move { recorder.start().await }
    });

    let mut state = recorder.state();
    while *state.borrow() != RecorderState::Listening {
        state.changed().await.unwrap();
    }
    let addr = recorder.local_addr().unwrap();

    Harness {
        recorder,
        addr,
        events,
        out_dir,
        run,
    }
}

fn proxied_client(proxy_addr: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy_addr}")).unwrap())
        .build()
        .unwrap()
}

/// A port with nothing listening: bind, note the port, drop the listener.
async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn records_and_forwards_a_plain_request() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
        .mount(&upstream)
        .await;

    let mut harness = start_recorder().await;
    let client = proxied_client(harness.addr);

    let response = client
        .get(format!("{}/hello", upstream.uri()))
        .header("Cookie", "session=secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "hi");

    let event = harness.events.recv().await.unwrap();
    assert_eq!(event.method, "GET");
    assert_eq!(event.status, 200);
    assert_eq!(event.response, "hi");
    assert_eq!(event.body, "");

    harness.recorder.stop();
    harness.run.await.unwrap().unwrap();

    let artifact = std::fs::read_dir(harness.out_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.to_string_lossy().ends_with(".pulse.yaml"))
        .expect("artifact file");
    let session: SessionDocument =
        serde_yaml::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();

    assert_eq!(session.requests.len(), 1);
    let recorded = &session.requests[0];
    assert_eq!(recorded.method, "GET");
    assert_eq!(recorded.path, "/hello");
    assert_eq!(recorded.body, "");
    assert!(recorded
        .headers
        .keys()
        .all(|k| !k.eq_ignore_ascii_case("cookie")));
}

#[tokio::test]
async fn upstream_failure_yields_502_and_error_event() {
    let dead = closed_port().await;
    let mut harness = start_recorder().await;
    let client = proxied_client(harness.addr);

    let response = client
        .get(format!("http://{dead}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let event = harness.events.recv().await.unwrap();
    assert_eq!(event.status, 0);
    assert!(!event.err.is_empty());

    harness.recorder.stop();
    harness.run.await.unwrap().unwrap();
}

#[tokio::test]
async fn connect_to_dead_target_returns_502_and_records_once() {
    let dead = closed_port().await;
    let mut harness = start_recorder().await;

    let mut stream = tokio::net::TcpStream::connect(harness.addr).await.unwrap();
    stream
        .write_all(format!("CONNECT {dead} HTTP/1.1\r\nHost: {dead}\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let head = String::from_utf8_lossy(&buf[..n]).to_string();
    assert!(head.starts_with("HTTP/1.1 502"), "got: {head}");

    let event = harness.events.recv().await.unwrap();
    assert_eq!(event.method, "CONNECT");
    assert_eq!(event.note, "HTTPS tunnel established");
    assert!(event.response.is_empty());

    harness.recorder.stop();
    harness.run.await.unwrap().unwrap();

    let artifact = std::fs::read_dir(harness.out_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.to_string_lossy().ends_with(".pulse.yaml"))
        .expect("artifact file");
    let session: SessionDocument =
        serde_yaml::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();

    assert_eq!(session.requests.len(), 1);
    assert_eq!(session.requests[0].method, "CONNECT");
    assert!(session.requests[0].note.is_some());
    // the artifact carries no tunnel payload
    assert!(session.requests[0].body.is_empty());
}

#[tokio::test]
async fn connect_tunnel_carries_opaque_bytes() {
    // A TCP echo peer stands in for a TLS origin; the proxy must pass
    // bytes through untouched and record nothing past the CONNECT line.
    let echo = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = echo.accept().await {
            let mut buf = vec![0u8; 64];
            if let Ok(n) = socket.read(&mut buf).await {
                let _ = socket.write_all(&buf[..n]).await;
            }
        }
    });

    let mut harness = start_recorder().await;
    let mut stream = tokio::net::TcpStream::connect(harness.addr).await.unwrap();
    stream
        .write_all(format!("CONNECT {echo_addr} HTTP/1.1\r\nHost: {echo_addr}\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

    stream.write_all(b"tunnel-payload").await.unwrap();
    let mut echoed = vec![0u8; 14];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"tunnel-payload");
    drop(stream);

    let _ = harness.events.recv().await.unwrap();
    harness.recorder.stop();
    harness.run.await.unwrap().unwrap();

    let artifact = std::fs::read_dir(harness.out_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.to_string_lossy().ends_with(".pulse.yaml"))
        .expect("artifact file");
    let raw = std::fs::read_to_string(&artifact).unwrap();
    assert!(!raw.contains("tunnel-payload"));
}

#[tokio::test]
async fn stop_without_traffic_writes_no_artifact() {
    let harness = start_recorder().await;
    harness.recorder.stop();
    harness.run.await.unwrap().unwrap();
    assert_eq!(std::fs::read_dir(harness.out_dir.path()).unwrap().count(), 0);
}
