use std::sync::Arc;

use sluice_client::{Context, Error, PublishOptions};
use sluice_sim::StreamServer;
use sluice_transport::MemoryBus;

async fn setup() -> (StreamServer, Context) {
    let bus = MemoryBus::new();
    let server = StreamServer::start(bus.clone()).await.expect("server starts");
    server
        .add_stream("FOO", &["FOO.>"])
        .await
        .expect("stream registered");
    let context = Context::connect(Arc::new(bus)).await.expect("context probes");
    (server, context)
}

#[tokio::test]
async fn dedup_publish_reports_duplicate() {
    let (server, context) = setup().await;

    let ack = context
        .publish("FOO.bar", "x", PublishOptions::new().msg_id("abc"))
        .await
        .expect("first publish");
    assert_eq!(ack.stream, "FOO");
    assert_eq!(ack.seq, 1);
    assert!(!ack.duplicate);

    let ack = context
        .publish("FOO.bar", "x", PublishOptions::new().msg_id("abc"))
        .await
        .expect("second publish");
    assert_eq!(ack.stream, "FOO");
    assert_eq!(ack.seq, 1);
    assert!(ack.duplicate);

    assert_eq!(server.message_count("FOO"), 1);

    let ack = context
        .publish("FOO.bar", "y", PublishOptions::new().msg_id("def"))
        .await
        .expect("fresh id publishes");
    assert_eq!(ack.seq, 2);
    assert!(!ack.duplicate);
}

#[tokio::test]
async fn publish_without_stream_reports_no_stream_response() {
    let (_server, context) = setup().await;
    let err = context
        .publish("BARE.subject", "x", PublishOptions::new())
        .await
        .expect_err("nothing ingests the subject");
    assert!(matches!(err, Error::NoStreamResponse));
}

#[tokio::test]
async fn expected_stream_mismatch_is_rejected() {
    let (_server, context) = setup().await;
    let err = context
        .publish("FOO.bar", "x", PublishOptions::new().expect_stream("OTHER"))
        .await
        .expect_err("wrong expected stream");
    assert_eq!(err.to_string(), "expected stream does not match");
}

#[tokio::test]
async fn expected_last_sequence_guards_the_write() {
    let (server, context) = setup().await;

    context
        .publish("FOO.bar", "one", PublishOptions::new())
        .await
        .expect("seed message");

    let ack = context
        .publish("FOO.bar", "two", PublishOptions::new().expect_last_sequence(1))
        .await
        .expect("matching expectation");
    assert_eq!(ack.seq, 2);

    let err = context
        .publish("FOO.bar", "three", PublishOptions::new().expect_last_sequence(1))
        .await
        .expect_err("stale expectation");
    assert_eq!(err.to_string(), "wrong last sequence: 2");
    assert_eq!(server.message_count("FOO"), 2);
}

#[tokio::test]
async fn expected_last_msg_id_guards_the_write() {
    let (_server, context) = setup().await;

    context
        .publish("FOO.bar", "one", PublishOptions::new().msg_id("a"))
        .await
        .expect("seed message");

    context
        .publish(
            "FOO.bar",
            "two",
            PublishOptions::new().expect_last_msg_id("a"),
        )
        .await
        .expect("matching last id");

    let err = context
        .publish(
            "FOO.bar",
            "three",
            PublishOptions::new().expect_last_msg_id("a"),
        )
        .await
        .expect_err("last id moved on");
    assert_eq!(err.to_string(), "wrong last msg ID");
}
