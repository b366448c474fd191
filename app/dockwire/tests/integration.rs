//! Integration tests for the dockwire client.
//!
//! These drive the real hyper transport against an in-process fake engine
//! served over a Unix socket.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use common::{within, FakeEngine};
use dockwire::{
    CloseReason, Docker, Error, EventsOptions, Filters, LogOutput, Options, Resource, RunOptions,
    RunOutcome, RunOutput,
};
use dockwire_transport::{Outcome, RequestDescriptor, Transport};
use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncReadExt;

// ============================================================================
// Client Tests
// ============================================================================

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_returns_text_body() {
        let engine = FakeEngine::start().await;
        let pong = engine.docker().ping().await.expect("ping");
        assert_eq!(pong, "OK");
    }

    #[tokio::test]
    async fn test_list_filters_are_json_encoded() {
        let engine = FakeEngine::start().await;
        let docker = engine.docker();

        let options = Options::new()
            .flag("all", 1)
            .filters(Filters::new().with("status", "running"));
        let list = docker.list_containers(&options).await.expect("list");
        assert_eq!(list, json!([]));

        let recorded = engine.requests_to("/containers/json").await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].query_value("filters").as_deref(),
            Some(r#"{"status":["running"]}"#)
        );
        assert_eq!(recorded[0].query_value("all").as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_unknown_container_surfaces_engine_404() {
        let engine = FakeEngine::start().await;
        let err = engine
            .docker()
            .container("nope")
            .inspect()
            .await
            .expect_err("missing container");

        assert!(err.is_not_found());
        match err {
            Error::Engine(engine_err) => {
                assert_eq!(engine_err.message(), "No such container: nope");
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_socket_is_transport_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let docker = Docker::unix(dir.path().join("absent.sock")).expect("client");
        let err = docker.ping().await.expect_err("no engine");
        assert!(err.is_transport());
        assert!(err.status_code().is_none());
    }

    #[tokio::test]
    async fn test_remove_running_container_is_not_swallowed() {
        let engine = FakeEngine::start().await;
        let docker = engine.docker();
        let container = docker
            .create_container(&Options::new().set("Image", "alpine"))
            .await
            .expect("create");
        container.start().await.expect("start");

        let err = container.remove().await.expect_err("running");
        assert_eq!(err.status_code(), Some(409));
        assert!(!err.is_conflict());

        let err = container.start().await.expect_err("already started");
        assert_eq!(err.status_code(), Some(304));
    }
}

// ============================================================================
// Proxy Tests
// ============================================================================

mod proxy_tests {
    use super::*;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn execute(&self, _request: RequestDescriptor) -> dockwire::Result<Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Json(serde_json::Value::Null))
        }
    }

    #[test]
    fn test_describe_never_touches_transport() {
        let transport = Arc::new(CountingTransport::default());
        let docker = Docker::new(transport.clone());

        assert_eq!(docker.container("ghost").describe().id, "ghost");
        assert_eq!(docker.image("ghost:1").describe().id, "ghost:1");
        assert_eq!(docker.volume("v").describe().id, "v");
        assert_eq!(docker.network("n").describe().id, "n");
        assert_eq!(docker.service("s").describe().id, "s");
        assert_eq!(docker.task("t").describe().id, "t");
        assert_eq!(docker.node("nd").describe().id, "nd");
        assert_eq!(docker.exec("e").describe().id, "e");

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_container_splits_query_and_body() {
        let engine = FakeEngine::start().await;
        let container = engine
            .docker()
            .create_container(
                &Options::new()
                    .set("name", "web-1")
                    .set("Image", "nginx")
                    .flag("Tty", "1"),
            )
            .await
            .expect("create");

        assert_eq!(container.id(), "web-1");
        assert!(container.tty());

        let recorded = engine.requests_to("/containers/create").await;
        assert_eq!(recorded[0].query_value("name").as_deref(), Some("web-1"));

        let stored = engine.container("web-1").await.expect("stored");
        assert_eq!(stored.body.get("name"), None);
        assert_eq!(stored.body["Image"], "nginx");
        assert_eq!(stored.body["Tty"], true);
    }

    #[tokio::test]
    async fn test_proxy_defaults_merge_under_caller_options() {
        let engine = FakeEngine::start().await;
        let defaults = dockwire::DefaultOptions::new().with(
            "logs",
            Options::new().flag("stdout", true).set("tail", "all"),
        );
        let container = engine
            .docker()
            .create_container(&Options::new().set("Image", "alpine"))
            .await
            .expect("create")
            .with_defaults(defaults);

        let _ = container
            .logs_with(&Options::new().set("tail", "10"))
            .await
            .expect("logs");

        let recorded = engine.requests_to("/logs").await;
        assert_eq!(recorded[0].query_value("stdout").as_deref(), Some("true"));
        assert_eq!(recorded[0].query_value("tail").as_deref(), Some("10"));
    }
}

// ============================================================================
// Stream Tests
// ============================================================================

mod stream_tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_are_demultiplexed() {
        let engine = FakeEngine::start().await;
        let container = engine
            .docker()
            .create_container(&Options::new().set("Image", "alpine"))
            .await
            .expect("create");

        let logs = container
            .logs_with(&Options::new().flag("stdout", true).flag("stderr", true))
            .await
            .expect("logs");
        assert!(!logs.is_tty());

        let chunks: Vec<LogOutput> = within(logs.map(|c| c.expect("chunk")).collect()).await;
        assert_eq!(
            chunks,
            vec![
                LogOutput::StdOut(Bytes::from_static(b"hello\n")),
                LogOutput::StdErr(Bytes::from_static(b"oops\n")),
            ]
        );
    }

    #[tokio::test]
    async fn test_tty_logs_pass_through() {
        let engine = FakeEngine::start().await;
        let container = engine
            .docker()
            .create_container(&Options::new().set("Image", "alpine").set("Tty", true))
            .await
            .expect("create");

        let logs = container.logs().await.expect("logs");
        assert!(logs.is_tty());

        let chunks: Vec<LogOutput> = within(logs.map(|c| c.expect("chunk")).collect()).await;
        assert!(chunks.iter().all(|c| matches!(c, LogOutput::Console(_))));
        let text: Vec<u8> = chunks.iter().flat_map(|c| c.as_bytes().to_vec()).collect();
        assert_eq!(text, b"hello\r\n");
    }

    #[tokio::test]
    async fn test_pull_splits_tag_and_streams_progress() {
        let engine = FakeEngine::start().await;
        let docker = engine.docker();

        let stream = docker
            .pull("alpine:3.19", &Options::new(), None)
            .await
            .expect("pull");
        let events = within(docker.follow_progress(stream)).await.expect("progress");

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].status.as_deref(),
            Some("Pulling from library/alpine")
        );

        let recorded = engine.requests_to("/images/create").await;
        assert_eq!(recorded[0].query_value("fromImage").as_deref(), Some("alpine"));
        assert_eq!(recorded[0].query_value("tag").as_deref(), Some("3.19"));
    }

    #[tokio::test]
    async fn test_in_band_pull_error_becomes_engine_error() {
        let engine = FakeEngine::start().await;
        let docker = engine.docker();

        let stream = docker
            .pull("missing", &Options::new(), None)
            .await
            .expect("pull starts");
        let err = within(docker.follow_progress(stream))
            .await
            .expect_err("in-band error");

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("manifest unknown"));
    }
}

// ============================================================================
// Session Tests
// ============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_echoes_stdin_and_detaches() {
        let engine = FakeEngine::start().await;
        let container = engine
            .docker()
            .create_container(&Options::new().set("Image", "alpine").flag("OpenStdin", true))
            .await
            .expect("create");

        let mut session = container
            .attach_interactive(&Options::new().flag("stdout", true), None)
            .await
            .expect("attach");
        assert!(!session.output().is_tty());

        session.input().write(b"ping\n").await.expect("write");

        let mut echoed = Vec::new();
        while echoed.len() < 5 {
            match within(session.output().next()).await {
                Some(Ok(LogOutput::StdOut(bytes))) => echoed.extend_from_slice(&bytes),
                other => panic!("unexpected output {other:?}"),
            }
        }
        assert_eq!(echoed, b"ping\n");

        session
            .input()
            .write(&[b'x', 0x10, 0x11])
            .await
            .expect("detach write");

        let control = session.control().clone();
        assert!(control.is_closed());
        assert_eq!(control.close_reason(), Some(CloseReason::Detached));
        assert!(within(session.output().next()).await.is_none());

        let err = session.input().write(b"late").await.expect_err("closed");
        assert!(matches!(err, Error::ProtocolState(_)));
    }

    #[tokio::test]
    async fn test_resize_reaches_engine_only_while_open() {
        let engine = FakeEngine::start().await;
        let container = engine
            .docker()
            .create_container(&Options::new().set("Image", "alpine").set("Tty", true))
            .await
            .expect("create");

        let session = container
            .attach_interactive(&Options::new(), None)
            .await
            .expect("attach");
        let control = session.control().clone();

        within(control.resize(80, 24)).await.expect("resize");
        let recorded = engine.requests_to("/resize").await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].query_value("w").as_deref(), Some("80"));
        assert_eq!(recorded[0].query_value("h").as_deref(), Some("24"));

        control.close();
        assert_eq!(within(control.closed()).await, CloseReason::Closed);

        let err = within(control.resize(100, 40)).await.expect_err("closed");
        assert!(matches!(err, Error::ProtocolState(_)));
        assert_eq!(engine.requests_to("/resize").await.len(), 1);
    }
}

// ============================================================================
// Event Tests
// ============================================================================

mod event_tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_events_end_on_their_own() {
        let engine = FakeEngine::start().await;
        let options = EventsOptions {
            until: Some(Utc.timestamp_opt(1_700_000_100, 0).unwrap()),
            filters: Filters::new().with("type", "container"),
            ..EventsOptions::default()
        };
        let mut stream = engine.docker().events(options).await.expect("subscribe");

        let mut events = Vec::new();
        while let Some(event) = within(stream.next()).await {
            events.push(event.expect("event"));
        }

        let actions: Vec<&str> = events.iter().map(|e| e.action()).collect();
        assert_eq!(actions, ["create", "start"]);
        assert_eq!(events[0].actor_id(), "c1");
        assert_eq!(events[0].attribute("image"), Some("alpine"));
        assert_eq!(
            stream.last_seen(),
            Some(Utc.timestamp_opt(1_700_000_001, 5).unwrap())
        );

        let recorded = engine.requests_to("/events").await;
        assert_eq!(
            recorded[0].query_value("filters").as_deref(),
            Some(r#"{"type":["container"]}"#)
        );
        assert_eq!(
            recorded[0].query_value("until").as_deref(),
            Some("1700000100.000000000")
        );
    }

    #[tokio::test]
    async fn test_cancel_ends_unbounded_events() {
        let engine = FakeEngine::start().await;
        let mut stream = engine
            .docker()
            .events(EventsOptions::default())
            .await
            .expect("subscribe");
        let handle = stream.handle();

        assert!(within(stream.next()).await.is_some());
        assert!(within(stream.next()).await.is_some());

        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(within(stream.next()).await.is_none());
    }

    #[tokio::test]
    async fn test_resubscribe_resumes_from_last_event() {
        let engine = FakeEngine::start().await;
        let mut stream = engine
            .docker()
            .events(EventsOptions::default())
            .await
            .expect("subscribe");
        within(stream.next()).await.expect("first").expect("event");

        let _resumed = within(stream.resubscribe()).await.expect("resubscribe");

        let recorded = engine.requests_to("/events").await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].query_value("since"), None);
        assert_eq!(
            recorded[1].query_value("since").as_deref(),
            Some("1700000000.000000005")
        );
    }
}

// ============================================================================
// Service Tests
// ============================================================================

mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_stale_version_is_conflict_and_leaves_spec() {
        let engine = FakeEngine::start().await;
        let service = engine.docker().service("web");

        let info = service.inspect().await.expect("inspect");
        assert_eq!(info.version.index, 4);
        assert_eq!(info.rest["CreatedAt"], "2024-01-01T00:00:00Z");

        let new_spec = json!({ "Name": "web", "Labels": { "tier": "front" } });
        let err = service
            .update(3, &new_spec, None)
            .await
            .expect_err("stale version");
        assert!(err.is_conflict());

        let stored = engine.service("web").await.expect("service");
        assert_eq!(stored.version, 4);
        assert!(stored.spec.get("Labels").is_none());

        service
            .update(info.version.index, &new_spec, None)
            .await
            .expect("current version");
        let stored = engine.service("web").await.expect("service");
        assert_eq!(stored.version, 5);
        assert_eq!(stored.spec["Labels"]["tier"], "front");

        let recorded = engine.requests_to("/services/web/update").await;
        assert_eq!(recorded[0].query_value("version").as_deref(), Some("3"));
        assert_eq!(recorded[1].query_value("version").as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_unversioned_errors_are_not_conflicts() {
        let engine = FakeEngine::start().await;
        let err = engine
            .docker()
            .service("absent")
            .inspect()
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }
}

// ============================================================================
// Run Tests
// ============================================================================

mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let engine = FakeEngine::start().await;
        let handle = engine
            .docker()
            .run("alpine", vec!["true".to_string()], RunOptions::default());

        match within(handle.outcome()).await.expect("run") {
            RunOutcome::Exited { status, .. } => assert_eq!(status, 0),
            other => panic!("expected exit, got {other:?}"),
        }

        let paths: Vec<String> = engine
            .requests()
            .await
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("/containers/create"));
        assert!(paths[1].ends_with("/start"));
        assert!(paths[2].ends_with("/wait"));
    }

    #[tokio::test]
    async fn test_run_copies_output_into_split_sinks() {
        let engine = FakeEngine::start().await;
        let (stdout, mut stdout_reader) = tokio::io::duplex(1024);
        let (stderr, mut stderr_reader) = tokio::io::duplex(1024);
        let options = RunOptions::default().with_output(RunOutput::split(stdout, stderr));
        let handle = engine.docker().run(
            "alpine",
            vec!["echo".to_string(), "hi".to_string()],
            options,
        );

        match within(handle.outcome()).await.expect("run") {
            RunOutcome::Exited { status, .. } => assert_eq!(status, 0),
            other => panic!("expected exit, got {other:?}"),
        }

        let mut out = String::new();
        within(stdout_reader.read_to_string(&mut out)).await.expect("stdout");
        let mut err = String::new();
        within(stderr_reader.read_to_string(&mut err)).await.expect("stderr");
        assert_eq!(out, "echo hi\n");
        assert_eq!(err, "exited\n");

        let paths: Vec<String> = engine.requests().await.into_iter().map(|r| r.path).collect();
        assert_eq!(paths.len(), 4);
        assert!(paths[1].ends_with("/attach"));
        assert!(paths[2].ends_with("/start"));

        let attach = &engine.requests_to("/attach").await[0];
        for key in ["stream", "stdout", "stderr"] {
            assert_eq!(attach.query_value(key).as_deref(), Some("true"), "{key}");
        }
    }

    #[tokio::test]
    async fn test_run_combined_sink_keeps_arrival_order() {
        let engine = FakeEngine::start().await;
        let (sink, mut reader) = tokio::io::duplex(1024);
        let options = RunOptions::default().with_output(RunOutput::combined(sink));
        let handle = engine
            .docker()
            .run("alpine", vec!["date".to_string()], options);

        within(handle.outcome()).await.expect("run");
        let mut text = String::new();
        within(reader.read_to_string(&mut text)).await.expect("output");
        assert_eq!(text, "date\nexited\n");
    }

    #[tokio::test]
    async fn test_cancel_stops_the_container() {
        let engine = FakeEngine::start().await;
        let options = RunOptions {
            defaults: dockwire::DefaultOptions::new().with("stop", Options::new().set("t", 1)),
            ..RunOptions::default()
        };
        let handle = engine.docker().run(
            "alpine",
            vec!["sleep".to_string(), "60".to_string()],
            options,
        );

        within(async {
            while engine.requests_to("/wait").await.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.cancel();

        let outcome = within(handle.outcome()).await.expect("run");
        let RunOutcome::Cancelled { container } = outcome else {
            panic!("expected cancellation, got {outcome:?}");
        };

        let stored = engine.container(container.id()).await.expect("container");
        assert!(stored.stopped);
        let stops = engine.requests_to("/stop").await;
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].query_value("t").as_deref(), Some("1"));
    }
}
