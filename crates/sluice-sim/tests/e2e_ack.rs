use std::sync::Arc;
use std::time::Duration;

use sluice_client::{
    Context, Error, FetchOptions, PublishOptions, SubscribeOptions, Subscription,
};
use sluice_sim::StreamServer;
use sluice_transport::MemoryBus;

async fn setup() -> (StreamServer, Context, Subscription) {
    let bus = MemoryBus::new();
    let server = StreamServer::start(bus.clone()).await.expect("server starts");
    server
        .add_stream("ORDERS", &["ORDERS.*"])
        .await
        .expect("stream registered");
    let context = Context::connect(Arc::new(bus)).await.expect("context probes");
    let sub = context
        .pull_subscribe("ORDERS.new", SubscribeOptions::new().durable("worker"))
        .await
        .expect("pull subscription");
    (server, context, sub)
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

async fn fetch_one(sub: &Subscription) -> sluice_client::StreamMessage {
    let mut msgs = sub
        .fetch(1, FetchOptions::new().timeout(Duration::from_secs(1)))
        .await
        .expect("one message");
    msgs.remove(0)
}

#[tokio::test]
async fn ack_reaches_the_server() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "job", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.ack().await.expect("ack");

    let server_ref = &server;
    eventually(move || server_ref.acked("ORDERS", "worker") == vec![1]).await;
}

#[tokio::test]
async fn ack_sync_waits_for_the_server_response() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "job", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.ack_sync(PublishOptions::new()).await.expect("sync ack");
    assert!(msg.is_acked());
    assert_eq!(server.acked("ORDERS", "worker"), vec![1]);
}

#[tokio::test]
async fn terminal_acks_are_idempotent_end_to_end() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "job", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.ack().await.expect("first ack");
    assert!(matches!(msg.ack().await, Err(Error::InvalidAck)));
    assert!(matches!(msg.nak().await, Err(Error::InvalidAck)));
    assert!(matches!(msg.term().await, Err(Error::InvalidAck)));

    let server_ref = &server;
    eventually(move || server_ref.acked("ORDERS", "worker").len() == 1).await;
    assert!(server.naks("ORDERS", "worker").is_empty());
    assert!(server.terms("ORDERS", "worker").is_empty());
}

#[tokio::test]
async fn nak_requests_redelivery() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "flaky", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.nak().await.expect("nak");

    let server_ref = &server;
    eventually(move || server_ref.naks("ORDERS", "worker") == vec![1]).await;

    // the server rewinds its cursor: the message comes again
    let again = fetch_one(&sub).await;
    assert_eq!(&again.payload()[..], b"flaky");
    again.ack().await.expect("ack after redelivery");
}

#[tokio::test]
async fn term_prevents_redelivery_state() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "poison", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.term().await.expect("term");

    let server_ref = &server;
    eventually(move || server_ref.terms("ORDERS", "worker") == vec![1]).await;
    assert!(server.acked("ORDERS", "worker").is_empty());
}

#[tokio::test]
async fn in_progress_repeats_then_terminal_ack_wins() {
    let (server, context, sub) = setup().await;
    context
        .publish("ORDERS.new", "slow", PublishOptions::new())
        .await
        .expect("publish");

    let msg = fetch_one(&sub).await;
    msg.in_progress().await.expect("first progress");
    msg.in_progress().await.expect("second progress");
    msg.ack().await.expect("terminal ack");
    assert!(matches!(msg.in_progress().await, Err(Error::InvalidAck)));

    let server_ref = &server;
    eventually(move || server_ref.in_progress_count("ORDERS", "worker") == 2).await;
    eventually(move || server_ref.acked("ORDERS", "worker") == vec![1]).await;
}
