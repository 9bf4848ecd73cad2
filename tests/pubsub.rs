mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{memory_with_store, CODECS};
use serialized_redis::{CodecKind, Error, Message, MessageKind, Reply, Store, Value};

const WAIT: Option<Duration> = Some(Duration::from_secs(1));

fn ack(kind: MessageKind, channel: &str, count: i64) -> Message {
    let pattern = matches!(kind, MessageKind::Psubscribe | MessageKind::Punsubscribe)
        .then(|| channel.to_string());
    Message {
        kind,
        pattern,
        channel: channel.to_string(),
        data: Reply::Int(count),
    }
}

#[tokio::test]
async fn subscription_acknowledgements() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);

    let mut pubsub = subscriber.pubsub();
    pubsub.subscribe(&["a", "b"]).await.unwrap();
    pubsub.psubscribe(&["c*"]).await.unwrap();

    assert_eq!(pubsub.get_message(WAIT).await.unwrap(), Some(ack(MessageKind::Subscribe, "a", 1)));
    assert_eq!(pubsub.get_message(WAIT).await.unwrap(), Some(ack(MessageKind::Subscribe, "b", 2)));
    assert_eq!(pubsub.get_message(WAIT).await.unwrap(), Some(ack(MessageKind::Psubscribe, "c*", 3)));

    pubsub.unsubscribe(&["a"]).await.unwrap();
    assert_eq!(pubsub.get_message(WAIT).await.unwrap(), Some(ack(MessageKind::Unsubscribe, "a", 2)));
    assert!(pubsub.subscribed());
    assert!(pubsub.channels().contains("b"));
}

#[tokio::test]
async fn payloads_are_decoded() {
    let mut map = BTreeMap::new();
    map.insert(Value::from("id"), Value::from(7));
    map.insert(Value::from("tags"), Value::from(vec!["x", "y"]));
    let payloads = [
        Value::from("hello"),
        Value::from(42),
        Value::Float(1.5),
        Value::from(vec![1, 2, 3]),
        Value::Map(map),
    ];

    for kind in CODECS {
        let store = Store::new();
        let mut subscriber = memory_with_store(kind, &store);
        let mut publisher = memory_with_store(kind, &store);

        let mut pubsub = subscriber.pubsub().ignore_subscribe_messages(true);
        pubsub.subscribe(&["events"]).await.unwrap();
        assert_eq!(pubsub.get_message(WAIT).await.unwrap(), None);

        for payload in payloads.iter().cloned() {
            let receivers = publisher.publish("events", payload.clone()).await.unwrap();
            assert_eq!(receivers, 1);

            let message = pubsub.get_message(WAIT).await.unwrap().unwrap();
            assert_eq!(message.kind, MessageKind::Message);
            assert_eq!(message.channel, "events");
            assert_eq!(message.pattern, None);
            assert_eq!(message.data, Reply::Value(payload), "codec {}", kind);
        }
    }
}

#[tokio::test]
async fn pattern_messages_name_the_pattern() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Msgpack, &store);
    let mut publisher = memory_with_store(CodecKind::Msgpack, &store);

    let mut pubsub = subscriber.pubsub().ignore_subscribe_messages(true);
    pubsub.psubscribe(&["news.*"]).await.unwrap();
    pubsub.get_message(WAIT).await.unwrap();

    assert_eq!(publisher.publish("news.tech", vec![1, 2]).await.unwrap(), 1);
    assert_eq!(publisher.publish("weather", "rain").await.unwrap(), 0);

    let message = pubsub.get_message(WAIT).await.unwrap().unwrap();
    assert_eq!(
        message,
        Message {
            kind: MessageKind::Pmessage,
            pattern: Some("news.*".to_string()),
            channel: "news.tech".to_string(),
            data: Reply::Value(Value::from(vec![1, 2])),
        }
    );
}

#[tokio::test]
async fn channel_and_pattern_both_deliver() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);
    let mut publisher = memory_with_store(CodecKind::Json, &store);

    let mut pubsub = subscriber.pubsub().ignore_subscribe_messages(true);
    pubsub.subscribe(&["news"]).await.unwrap();
    pubsub.psubscribe(&["n*"]).await.unwrap();
    pubsub.get_message(WAIT).await.unwrap();
    pubsub.get_message(WAIT).await.unwrap();

    assert_eq!(publisher.publish("news", "x").await.unwrap(), 2);

    let first = pubsub.get_message(WAIT).await.unwrap().unwrap();
    let second = pubsub.get_message(WAIT).await.unwrap().unwrap();
    assert_eq!(first.kind, MessageKind::Message);
    assert_eq!(second.kind, MessageKind::Pmessage);
    assert_eq!(second.pattern.as_deref(), Some("n*"));
    assert_eq!(first.data, second.data);
}

#[tokio::test]
async fn timeout_without_messages() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);

    let mut pubsub = subscriber.pubsub().ignore_subscribe_messages(true);
    pubsub.subscribe(&["quiet"]).await.unwrap();
    pubsub.get_message(WAIT).await.unwrap();

    let message = pubsub
        .get_message(Some(Duration::from_millis(20)))
        .await
        .unwrap();

    assert_eq!(message, None);
}

#[tokio::test]
async fn subscribing_needs_a_channel() {
    let mut subscriber = memory_with_store(CodecKind::Json, &Store::new());

    let mut pubsub = subscriber.pubsub();
    let err = pubsub.subscribe(&[]).await.unwrap_err();

    assert!(matches!(err, Error::InvalidArgumentShape(_)));
}

#[tokio::test]
async fn close_restores_regular_commands() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);
    let mut publisher = memory_with_store(CodecKind::Json, &store);

    let mut pubsub = subscriber.pubsub();
    pubsub.subscribe(&["a", "b"]).await.unwrap();
    pubsub.psubscribe(&["p*"]).await.unwrap();
    publisher.publish("a", 1).await.unwrap();
    pubsub.close().await.unwrap();

    assert!(subscriber.set("k", "v").await.unwrap());
    assert_eq!(subscriber.get("k").await.unwrap(), Some(Value::from("v")));
    assert_eq!(publisher.publish("a", 2).await.unwrap(), 0);
}

#[tokio::test]
async fn dropped_subscriber_releases_the_connection() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);
    let mut publisher = memory_with_store(CodecKind::Json, &store);

    {
        let mut pubsub = subscriber.pubsub();
        pubsub.subscribe(&["a"]).await.unwrap();
        pubsub.psubscribe(&["p*"]).await.unwrap();
        publisher.publish("a", 1).await.unwrap();
    }

    assert!(subscriber.set("k", "v").await.unwrap());
    assert_eq!(subscriber.get("k").await.unwrap(), Some(Value::from("v")));
    assert_eq!(publisher.publish("a", 2).await.unwrap(), 0);
    assert_eq!(publisher.pubsub_numpat().await.unwrap(), 0);
}

#[tokio::test]
async fn introspection() {
    let store = Store::new();
    let mut subscriber = memory_with_store(CodecKind::Json, &store);
    let mut other = memory_with_store(CodecKind::Json, &store);
    let mut client = memory_with_store(CodecKind::Json, &store);

    let mut first = subscriber.pubsub();
    first.subscribe(&["news", "sport"]).await.unwrap();
    first.psubscribe(&["n*"]).await.unwrap();
    let mut second = other.pubsub();
    second.subscribe(&["news"]).await.unwrap();

    assert_eq!(
        client.pubsub_channels(None).await.unwrap(),
        vec!["news".to_string(), "sport".to_string()]
    );
    assert_eq!(client.pubsub_channels(Some("s*")).await.unwrap(), vec!["sport".to_string()]);
    assert_eq!(
        client.pubsub_numsub(&["news", "sport", "weather"]).await.unwrap(),
        vec![
            ("news".to_string(), 2),
            ("sport".to_string(), 1),
            ("weather".to_string(), 0)
        ]
    );
    assert_eq!(client.pubsub_numpat().await.unwrap(), 1);

    first.close().await.unwrap();
    assert_eq!(client.pubsub_channels(None).await.unwrap(), vec!["news".to_string()]);
    assert_eq!(client.pubsub_numpat().await.unwrap(), 0);
}
