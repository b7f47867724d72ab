//! End-to-end bridge tests: a real listener, a real ticking scene, and
//! real sockets.
//!
//! The harness wires the same pieces `scenelink host` uses, but binds
//! an ephemeral port and ticks on a plain thread so each test owns an
//! isolated host.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use scenelink::client::BridgeClient;
use scenelink::config::Config;
use scenelink::error::BridgeError;
use scenelink::host::Extension;
use scenelink::host::listener::BridgeListener;
use scenelink::host::registry::Handler;
use scenelink::host::session::ObjectKind;
use scenelink::protocol::{Command, ErrorKind, FrameDecoder, Response, encode_frame};
use scenelink::sim::SimScene;

/// A live simulated host bound to an ephemeral port.
struct TestHost {
    port: u16,
    extension: Extension,
    shutdown: Arc<AtomicBool>,
    tick_thread: Option<std::thread::JoinHandle<SimScene>>,
    listener: Option<BridgeListener>,
    _runtime: tokio::runtime::Runtime,
}

impl TestHost {
    /// Start a host, optionally registering extra handlers first.
    fn start(configure: impl FnOnce(&Extension)) -> Self {
        let config = Config { assets_enabled: false, ..Config::default() };
        let mut extension = Extension::activate(&config);
        configure(&extension);

        let tick = extension.take_tick_bridge().expect("tick bridge");
        let outcomes = extension.take_outcomes().expect("outcome stream");

        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let listener = {
            let _guard = runtime.enter();
            BridgeListener::start(0, extension.registry(), extension.command_sink(), outcomes)
                .expect("listener")
        };
        let port = listener.local_addr().port();

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let mut tick = tick;
        let tick_thread = std::thread::spawn(move || {
            let mut scene = SimScene::default();
            while !flag.load(Ordering::Relaxed) {
                tick.drain_tick(&mut scene);
                std::thread::sleep(Duration::from_millis(10));
            }
            scene
        });

        Self {
            port,
            extension,
            shutdown,
            tick_thread: Some(tick_thread),
            listener: Some(listener),
            _runtime: runtime,
        }
    }

    fn client(&self, timeout: Duration) -> BridgeClient {
        BridgeClient::for_addr("127.0.0.1", self.port, timeout)
    }

    /// Raw socket to the host, bypassing the client façade.
    fn raw_socket(&self) -> std::net::TcpStream {
        let stream = std::net::TcpStream::connect(("127.0.0.1", self.port)).expect("connect");
        stream.set_read_timeout(Some(Duration::from_secs(5))).expect("read timeout");
        stream
    }

    /// Stop the host and hand back the final scene for inspection.
    fn stop(mut self) -> SimScene {
        self.shutdown.store(true, Ordering::Relaxed);
        let scene = self.tick_thread.take().expect("tick thread").join().expect("tick join");
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
        scene
    }
}

/// Read framed responses from a raw socket until `count` have arrived.
fn read_responses(stream: &mut std::net::TcpStream, count: usize) -> Vec<Response> {
    let mut decoder = FrameDecoder::new();
    let mut responses: Vec<Response> = Vec::new();
    let mut buf = [0u8; 4096];
    while responses.len() < count {
        let n = stream.read(&mut buf).expect("read");
        assert!(n > 0, "host closed before all responses arrived");
        responses.extend(decoder.feed::<Response>(&buf[..n]).expect("decode"));
    }
    responses
}

#[test]
fn test_end_to_end_fetch_scene() {
    let host = TestHost::start(|_| {});
    let client = host.client(Duration::from_secs(5));

    let scene = client.fetch_scene().expect("scene");
    assert_eq!(scene.name, "Scene");
    assert_eq!(scene.object_count, 3);
    assert_eq!(scene.objects[0].name, "Cube");

    host.stop();
}

#[test]
fn test_sequential_calls_mutate_and_observe() {
    let host = TestHost::start(|_| {});
    let client = host.client(Duration::from_secs(5));

    for i in 0..5 {
        let output = client.run_script(&format!("add mesh Box{i}")).expect("script");
        assert_eq!(output, format!("added Box{i}"));
    }

    let scene = client.fetch_scene().expect("scene");
    assert_eq!(scene.object_count, 8);

    let final_scene = host.stop();
    assert_eq!(final_scene.object_count(), 8);
}

#[test]
fn test_wire_level_fifo_order() {
    let host = TestHost::start(|_| {});
    let mut stream = host.raw_socket();

    // Write two commands back to back, then read both responses: they
    // must come back in frame-completion order.
    let mut params = serde_json::Map::new();
    params.insert("code".to_string(), serde_json::json!("add mesh Marker"));
    let first = Command::with_params("execute_code", params);
    let second = Command::new("get_scene_info");

    let mut frames = encode_frame(&first).expect("encode");
    frames.extend_from_slice(&encode_frame(&second).expect("encode"));
    stream.write_all(&frames).expect("write");

    let responses = read_responses(&mut stream, 2);
    match &responses[0] {
        Response::Success { result } => {
            assert_eq!(result["result"], "added Marker", "first response is the script result");
        }
        other => panic!("expected success, got: {other:?}"),
    }
    match &responses[1] {
        Response::Success { result } => {
            // The second command observed the first one's mutation
            assert_eq!(result["object_count"], 4);
        }
        other => panic!("expected success, got: {other:?}"),
    }

    host.stop();
}

#[test]
fn test_unknown_command_is_recoverable() {
    let host = TestHost::start(|_| {});
    let mut stream = host.raw_socket();

    stream
        .write_all(&encode_frame(&Command::new("frobnicate")).expect("encode"))
        .expect("write");
    let responses = read_responses(&mut stream, 1);
    assert_eq!(
        responses[0],
        Response::error(ErrorKind::CommandError, "unknown command: frobnicate")
    );

    // The connection survives a command error
    stream
        .write_all(&encode_frame(&Command::new("get_scene_info")).expect("encode"))
        .expect("write");
    let responses = read_responses(&mut stream, 1);
    assert!(responses[0].is_success());

    // Nothing reached the tick: the journal stays empty
    let scene = host.stop();
    assert!(scene.journal().is_empty());
}

#[test]
fn test_malformed_frame_poisons_connection() {
    let host = TestHost::start(|_| {});
    let mut stream = host.raw_socket();

    // A zero-length header can never be a valid frame
    stream.write_all(&[0, 0, 0, 0]).expect("write");

    let responses = read_responses(&mut stream, 1);
    match &responses[0] {
        Response::Error { kind, .. } => assert_eq!(*kind, ErrorKind::ResponseError),
        other => panic!("expected response error, got: {other:?}"),
    }

    // The host then drops the connection
    let mut buf = [0u8; 16];
    let n = stream.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "expected EOF after framing desync");

    host.stop();
}

#[test]
fn test_timeout_then_late_completion() {
    // A handler that outlives the client's deadline: the call times
    // out, the host still finishes, and the late response is never
    // delivered to a later call.
    let host = TestHost::start(|extension| {
        extension.register(Handler {
            name: "slow_marker".to_string(),
            description: "sleeps, then imports a marker object".to_string(),
            requires_main_thread: true,
            execute: std::sync::Arc::new(|session, _| {
                std::thread::sleep(Duration::from_millis(400));
                let name = session.import_asset("slow_marker", ObjectKind::Mesh)?;
                Ok(serde_json::json!({"imported": name}))
            }),
        });
    });

    let client = host.client(Duration::from_millis(100));
    let mut params = serde_json::Map::new();
    let err = match client.call("slow_marker", params.clone()) {
        Err(e) => e,
        Ok(v) => panic!("expected timeout, got: {v:?}"),
    };
    // The catalog does not know the test handler, so go below the
    // façade's validation via a generic command error check first.
    assert!(
        matches!(err, BridgeError::Command(_)),
        "catalog rejects uncataloged tools locally: {err:?}"
    );

    // Bypass the façade: raw connection with a short deadline.
    let mut conn = scenelink::Connection::new("127.0.0.1", host.port, Duration::from_secs(1));
    params.clear();
    let err = conn
        .send_and_await(&Command::new("slow_marker"), Duration::from_millis(100))
        .expect_err("should time out");
    assert!(matches!(err, BridgeError::Timeout(_)), "got: {err:?}");
    assert!(conn.is_suspect());

    // Reconnect discards the late response; the next exchange gets its
    // own answer, not the stale one.
    let response = conn
        .send_and_await(&Command::new("get_scene_info"), Duration::from_secs(5))
        .expect("post-timeout exchange");
    match response {
        Response::Success { result } => {
            assert!(result.get("object_count").is_some(), "got a scene snapshot, not the stale result");
        }
        other => panic!("expected success, got: {other:?}"),
    }

    // The host-side handler still completed its work.
    let scene = host.stop();
    assert_eq!(scene.object_count(), 4, "slow handler finished despite client timeout");
}

#[test]
fn test_concurrent_callers_are_serialized() {
    let host = TestHost::start(|_| {});
    let client = Arc::new(host.client(Duration::from_secs(5)));

    let mut threads = Vec::new();
    for i in 0..4 {
        let client = Arc::clone(&client);
        threads.push(std::thread::spawn(move || {
            client.run_script(&format!("add mesh Thread{i}")).expect("script")
        }));
    }
    for thread in threads {
        let output = thread.join().expect("join");
        assert!(output.starts_with("added Thread"), "got: {output}");
    }

    let scene = client.fetch_scene().expect("scene");
    assert_eq!(scene.object_count, 7, "all four serialized calls landed");

    host.stop();
}

#[test]
fn test_deactivate_discards_registrations() {
    let host = TestHost::start(|_| {});
    let client = host.client(Duration::from_secs(5));

    // Sanity: works while active
    client.fetch_scene().expect("scene while active");

    host.extension.deactivate();

    let err = client.fetch_scene().expect_err("deactivated host must refuse");
    match err {
        BridgeError::Command(message) => assert!(message.contains("unknown command")),
        other => panic!("expected command error, got: {other:?}"),
    }

    host.stop();
}

#[test]
fn test_asset_commands_unknown_when_disabled() {
    let host = TestHost::start(|_| {});
    let client = host.client(Duration::from_secs(5));

    // Status command is always registered
    let status = client.asset_provider_status().expect("status");
    assert_eq!(status["enabled"], false);

    // The rest are not registered when the catalog is disabled
    let err = client.search_assets("all", None).expect_err("disabled");
    match err {
        BridgeError::Command(message) => assert!(message.contains("unknown command")),
        other => panic!("expected command error, got: {other:?}"),
    }

    host.stop();
}

#[test]
fn test_screenshot_round_trips_binary_payload() {
    let host = TestHost::start(|_| {});
    let client = host.client(Duration::from_secs(5));

    let capture = client.capture_view(640).expect("capture");
    assert_eq!(capture.width, 640);
    assert_eq!(capture.height, 360);
    assert_eq!(capture.format, "png");
    assert_eq!(&capture.data[1..4], b"PNG");

    host.stop();
}
