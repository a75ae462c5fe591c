use std::io::Write;
use std::sync::Arc;

use swimwatch_lib::api::{ApiError, DetectionBackend, HttpBackend};
use swimwatch_lib::config::AppConfig;
use swimwatch_lib::health::{check_backend_health, BackendHealth};
use swimwatch_lib::session::{
    LaunchError, Outcome, SessionController, SessionError, Status, Step, VideoUpload,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned reply for one request path
#[derive(Clone)]
enum Reply {
    Json { status: u16, body: String },
    EventStream(Vec<String>),
}

/// Minimal HTTP/1.1 server answering by request path, one connection at a time.
async fn spawn_server(routes: Vec<(&'static str, Reply)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                handle(socket, routes).await;
            });
        }
    });

    format!("http://{}", addr)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let lower = head.to_ascii_lowercase();
    let content_length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = lower.contains("transfer-encoding: chunked");

    let mut body = buf[header_end..].to_vec();
    if let Some(length) = content_length {
        while body.len() < length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    } else if chunked {
        while !body.ends_with(b"0\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    head.lines().next().unwrap_or_default().to_string()
}

async fn handle(mut socket: TcpStream, routes: Vec<(&'static str, Reply)>) {
    let request_line = read_request(&mut socket).await;
    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();

    let reply = routes
        .into_iter()
        .find(|(route, _)| *route == path)
        .map(|(_, reply)| reply)
        .unwrap_or(Reply::Json {
            status: 404,
            body: r#"{"error": "Not found"}"#.to_string(),
        });

    match reply {
        Reply::Json { status, body } => {
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
        Reply::EventStream(events) => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            for event in events {
                let _ = socket.write_all(format!("data: {}\n\n", event).as_bytes()).await;
                let _ = socket.flush().await;
            }
        }
    }
    let _ = socket.shutdown().await;
}

fn backend(base_url: &str) -> HttpBackend {
    let config = AppConfig {
        api_url: base_url.to_string(),
        request_timeout_secs: 5,
        ..AppConfig::default()
    };
    HttpBackend::new(&config).unwrap()
}

fn video_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(b"\x00\x00\x00\x18ftypmp42 pool footage").unwrap();
    file
}

#[tokio::test]
async fn start_live_returns_session_id() {
    let url = spawn_server(vec![(
        "/detect_live",
        Reply::Json {
            status: 200,
            body: r#"{"session_id": "abc-123", "message": "Live detection started"}"#.to_string(),
        },
    )])
    .await;

    let file = video_file();
    let video = VideoUpload::from_path(file.path()).await.unwrap();
    let backend = backend(&format!("{}/", url));
    assert_eq!(backend.base_url(), url);
    let id = backend.start_live(&video).await.unwrap();
    assert_eq!(id, "abc-123");
}

#[tokio::test]
async fn start_live_surfaces_backend_error() {
    let url = spawn_server(vec![(
        "/detect_live",
        Reply::Json {
            status: 500,
            body: r#"{"error": "Model not loaded"}"#.to_string(),
        },
    )])
    .await;

    let file = video_file();
    let video = VideoUpload::from_path(file.path()).await.unwrap();
    let err = backend(&url).start_live(&video).await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 500, .. }));
    assert_eq!(err.backend_message(), Some("Model not loaded"));
}

#[tokio::test]
async fn live_session_runs_to_completion() {
    let url = spawn_server(vec![
        (
            "/detect_live",
            Reply::Json {
                status: 200,
                body: r#"{"session_id": "s1"}"#.to_string(),
            },
        ),
        (
            "/live_updates/s1",
            Reply::EventStream(vec![
                r#"{"status": "processing", "progress": 10, "current_frame": 10, "total_frames": 100, "drowning_count": 0, "recent_detections": []}"#.to_string(),
                "not json".to_string(),
                r#"{"status": "processing", "progress": 60, "current_frame": 60, "drowning_count": 1, "recent_detections": [{"frame": 60, "label": "drowning", "confidence": 0.91, "bbox": [1, 2, 3, 4], "timestamp": 2.0}]}"#.to_string(),
                r#"{"status": "completed", "result": false, "total_detections": 1, "drowning_count": 1}"#.to_string(),
            ]),
        ),
    ])
    .await;

    let mut controller = SessionController::new(Arc::new(backend(&url)));
    let file = video_file();
    controller.select_video(file.path());
    assert_eq!(controller.start().await.unwrap(), "s1");

    let mut steps = Vec::new();
    while let Some(step) = controller.next_step().await {
        steps.push(step);
    }

    assert_eq!(steps.len(), 3);
    assert_eq!(steps[1].alerts().len(), 2);
    assert!(matches!(
        steps.last(),
        Some(Step::Finished {
            outcome: Outcome::Completed(_),
            ..
        })
    ));
    let display = controller.display();
    assert_eq!(display.status, Status::Completed);
    assert_eq!(display.progress, 60);
    assert_eq!(display.drowning_count, 1);
    assert_eq!(display.detections.len(), 1);
    assert_eq!(controller.current_session(), None);
    assert!(controller.controls().start_enabled);
}

#[tokio::test]
async fn stream_closed_early_is_connection_lost() {
    let url = spawn_server(vec![
        (
            "/detect_live",
            Reply::Json {
                status: 200,
                body: r#"{"session_id": "s2"}"#.to_string(),
            },
        ),
        (
            "/live_updates/s2",
            Reply::EventStream(vec![r#"{"status": "processing", "progress": 5}"#.to_string()]),
        ),
    ])
    .await;

    let mut controller = SessionController::new(Arc::new(backend(&url)));
    let file = video_file();
    controller.select_video(file.path());
    controller.start().await.unwrap();

    let mut last = None;
    while let Some(step) = controller.next_step().await {
        last = Some(step);
    }

    assert!(matches!(
        last,
        Some(Step::Finished {
            outcome: Outcome::Lost(_),
            ..
        })
    ));
    assert_eq!(controller.display().status, Status::Error);
    assert_eq!(controller.display().progress, 5);
}

#[tokio::test]
async fn launch_failure_reports_message() {
    let url = spawn_server(vec![(
        "/detect_live",
        Reply::Json {
            status: 400,
            body: r#"{"error": "No video file provided"}"#.to_string(),
        },
    )])
    .await;

    let mut controller = SessionController::new(Arc::new(backend(&url)));
    let file = video_file();
    controller.select_video(file.path());

    let err = controller.start().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Launch(LaunchError::FailedToStart { ref message, .. }) if message == "No video file provided"
    ));
    assert!(controller.next_step().await.is_none());
}

#[tokio::test]
async fn simple_detect_and_status() {
    let url = spawn_server(vec![
        (
            "/detect",
            Reply::Json {
                status: 200,
                body: r#"{"drowning_detected": true, "message": "Drowning detected!"}"#.to_string(),
            },
        ),
        (
            "/detection_status/s9",
            Reply::Json {
                status: 200,
                body: r#"{"session_id": "s9", "status": "processing", "progress": 40, "current_frame": 40, "total_frames": 100, "drowning_count": 0, "detections": [], "result": null, "error": null}"#.to_string(),
            },
        ),
    ])
    .await;

    let backend = backend(&url);
    let file = video_file();
    let video = VideoUpload::from_path(file.path()).await.unwrap();
    let verdict = backend.detect(&video).await.unwrap();
    assert!(verdict.drowning_detected);

    let snapshot = backend.detection_status("s9").await.unwrap();
    assert_eq!(snapshot.status, Some(Status::Processing));
    assert_eq!(snapshot.progress, Some(40));

    let err = backend.detection_status("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 404, .. }));
}

#[tokio::test]
async fn health_reports_availability() {
    let url = spawn_server(vec![(
        "/health",
        Reply::Json {
            status: 200,
            body: r#"{"status": "healthy", "model_loaded": true, "active_sessions": 2}"#.to_string(),
        },
    )])
    .await;
    assert_eq!(
        check_backend_health(&backend(&url)).await,
        BackendHealth::Available { active_sessions: 2 }
    );

    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    assert_eq!(
        check_backend_health(&backend(&dead)).await,
        BackendHealth::Unavailable
    );
}
