use archive_mirror::config::RemoteConfig;
use archive_mirror::remote::ftp::FtpConnector;
use archive_mirror::remote::Connector;
use archive_mirror::signal::{run_interruptible, Interrupt, RunEnd};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

/// A server that accepts the control connection and never greets.
fn silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => held.push(stream),
                Err(_) => break,
            }
        }
    });
    port
}

fn connector(port: u16, timeout_secs: u64) -> FtpConnector {
    FtpConnector::new(&RemoteConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "backup".to_string(),
        password: "secret".to_string(),
        directory: "/backups".to_string(),
        timeout_secs,
        connect_retries: 1,
        connect_retry_delay_secs: 1,
    })
}

#[test]
fn interrupt_during_stalled_connect_returns_promptly() {
    let connector = connector(silent_server(), 60);

    let started = Instant::now();
    let end = run_interruptible(
        async move { connector.connect().await.is_ok() },
        async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Interrupt::Interrupt
        },
    )
    .unwrap();

    assert!(matches!(end, RunEnd::Interrupted(Interrupt::Interrupt)));
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
}

#[test]
fn missing_greeting_times_out() {
    let connector = connector(silent_server(), 1);

    let started = Instant::now();
    let end = run_interruptible(
        async move { connector.connect().await.map(|_| ()) },
        std::future::pending::<Interrupt>(),
    )
    .unwrap();

    match end {
        RunEnd::Finished(result) => assert!(result.is_err()),
        RunEnd::Interrupted(_) => panic!("no interrupt was sent"),
    }
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
}
