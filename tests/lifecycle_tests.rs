//! Server lifecycle tests: startup, message delivery on the reactor loop
//! and shutdown via the stop handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use warthog::config::ServerConfig;
use warthog::server::{HttpServer, StartupError};

fn loopback_config() -> ServerConfig {
    ServerConfig {
        listen_address: "127.0.0.1".to_string(),
        listen_port: 0,
        ..ServerConfig::default()
    }
}

#[test]
fn test_run_exits_cleanly_on_stop_handle() {
    let server = HttpServer::builder(loopback_config()).build();
    let stop = server.stop_handle();

    let runner = thread::spawn(move || server.run());
    stop.stop();

    let result = runner.join().expect("runner thread");
    assert!(result.is_ok());
}

#[test]
fn test_messages_sent_while_running_are_delivered() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered_in = delivered.clone();

    let server = HttpServer::builder(loopback_config())
        .on_message("ping", move |_| {
            delivered_in.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let sender = server.sender();
    let stop = server.stop_handle();

    let runner = thread::spawn(move || server.run());
    sender.send("ping", Box::new(()));

    // Delivery happens on the reactor loop; wait for it before requesting
    // shutdown, since teardown discards anything still queued.
    let deadline = Instant::now() + Duration::from_secs(2);
    while delivered.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    stop.stop();
    runner.join().expect("runner thread").expect("clean shutdown");
}

#[test]
fn test_unresolvable_listen_address_is_a_bind_error() {
    let config = ServerConfig {
        listen_address: "definitely.not.a.host.invalid".to_string(),
        listen_port: 1,
        ..ServerConfig::default()
    };
    let server = HttpServer::builder(config).build();

    match server.run() {
        Err(StartupError::Bind { addr, .. }) => {
            assert_eq!(addr, "definitely.not.a.host.invalid:1");
        }
        other => panic!("expected a bind error, got {other:?}"),
    }
}
