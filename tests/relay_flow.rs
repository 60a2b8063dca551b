//! End-to-end relay over plaintext loopback: control server -> agent ->
//! executor -> report sender -> collector.

use bytes::Bytes;
use relay_agent::{Agent, AgentConfig};
use relay_server::{ChannelSource, CollectedReport, Collector, ControlServer};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

struct Harness {
    commands: mpsc::Sender<String>,
    reports: mpsc::UnboundedReceiver<CollectedReport>,
    config: AgentConfig,
}

async fn start() -> Harness {
    let (commands, source) = ChannelSource::new(16);
    let control = ControlServer::bind("127.0.0.1:0".parse().unwrap(), None, source)
        .await
        .unwrap();
    let control_addr = control.local_addr().unwrap();
    tokio::spawn(control.run());

    let (report_tx, reports) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let collector_addr = listener.local_addr().unwrap();
    tokio::spawn(Collector::with_sink(report_tx).serve(listener, None));

    let config = AgentConfig {
        control_url: format!("ws://{control_addr}/ws"),
        collector_url: format!("http://{collector_addr}/"),
        trust_anchor: None,
        ..Default::default()
    };

    Harness {
        commands,
        reports,
        config,
    }
}

async fn next_report(reports: &mut mpsc::UnboundedReceiver<CollectedReport>) -> Bytes {
    timeout(Duration::from_secs(10), reports.recv())
        .await
        .expect("report should arrive")
        .expect("collector sink open")
        .body
}

#[tokio::test]
async fn test_commands_flow_through_both_channels() {
    let Harness {
        commands,
        mut reports,
        config,
    } = start().await;

    let agent = Agent::new(config).unwrap();
    let session = tokio::spawn(async move { agent.run().await });

    commands.send("echo hello".into()).await.unwrap();
    assert_eq!(next_report(&mut reports).await, Bytes::from_static(b"hello\n"));

    // Empty command produces no report; the next report belongs to the next command
    commands.send(String::new()).await.unwrap();
    commands.send("nonexistent-binary-for-relay-tests".into()).await.unwrap();
    let failure = next_report(&mut reports).await;
    assert!(String::from_utf8_lossy(&failure).starts_with("failed to start"));

    // Same command twice, two independent reports
    commands.send("echo again".into()).await.unwrap();
    commands.send("echo again".into()).await.unwrap();
    assert_eq!(next_report(&mut reports).await, Bytes::from_static(b"again\n"));
    assert_eq!(next_report(&mut reports).await, Bytes::from_static(b"again\n"));

    // Exhausting the source closes the control channel and ends the session
    drop(commands);
    let summary = timeout(Duration::from_secs(10), session)
        .await
        .expect("session should end")
        .unwrap()
        .expect("remote close is a clean end");

    assert_eq!(summary.received, 5);
    assert_eq!(summary.skipped_empty, 1);
    assert_eq!(summary.executed, 4);
    assert_eq!(summary.reports_delivered, 4);
    assert!(reports.try_recv().is_err());
}

#[tokio::test]
async fn test_unreachable_collector_does_not_stop_session() {
    let Harness {
        commands,
        mut reports,
        mut config,
    } = start().await;

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    config.collector_url = format!("http://{}/", closed.local_addr().unwrap());
    drop(closed);

    let agent = Agent::new(config).unwrap();
    let session = tokio::spawn(async move { agent.run().await });

    commands.send("echo lost".into()).await.unwrap();
    commands.send("echo also-lost".into()).await.unwrap();
    drop(commands);

    let summary = timeout(Duration::from_secs(10), session)
        .await
        .expect("session should end")
        .unwrap()
        .unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(summary.reports_failed, 2);
    assert!(reports.try_recv().is_err());
}
