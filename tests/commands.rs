mod common;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use common::{memory, recording, CODECS};
use serialized_redis::{
    Aggregate, CodecKind, Error, InsertPosition, KeyType, SetOptions, SortOptions, Value,
};

fn samples(kind: CodecKind) -> Vec<Value> {
    let mut map = BTreeMap::new();
    map.insert(Value::from("a"), Value::from(1));
    map.insert(Value::from("b"), Value::from(vec![true, false]));

    let mut values = vec![
        Value::Nil,
        Value::Bool(true),
        Value::Int(-7),
        Value::Int(i64::MAX),
        Value::Float(2.5),
        Value::from(""),
        Value::from("line one\r\nline two"),
        Value::from(vec![Value::from(1), Value::from("x"), Value::Nil]),
        Value::Map(map),
    ];

    match kind {
        CodecKind::Json => {}
        CodecKind::Msgpack => {
            values.push(Value::Bytes(vec![0, 159, 146, 150]));
        }
        CodecKind::Bincode => {
            values.push(Value::Bytes(vec![0, 159, 146, 150]));
            values.push(Value::Set(BTreeSet::from([Value::from(1), Value::from("1")])));

            let mut keyed = BTreeMap::new();
            keyed.insert(Value::from(1), Value::from("one"));
            values.push(Value::Map(keyed));
        }
    }
    values
}

#[tokio::test]
async fn scalar_values_round_trip() {
    for kind in CODECS {
        let mut client = memory(kind);

        for value in samples(kind) {
            assert!(client.set("k", value.clone()).await.unwrap());
            assert_eq!(
                client.get("k").await.unwrap(),
                Some(value.clone()),
                "{} codec",
                kind
            );
        }
    }
}

#[tokio::test]
async fn unsupported_values_are_rejected_before_sending() {
    let mut client = recording(CodecKind::Json, []);

    let err = client
        .set("k", Value::Bytes(vec![1, 2, 3]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedValueKind {
            codec: "json",
            kind: "bytes"
        }
    ));
    assert!(client.get_ref().sent.is_empty());
}

#[tokio::test]
async fn missing_keys_keep_their_shape() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert_eq!(client.get("missing").await.unwrap(), None);
        assert_eq!(client.hget("missing", "f").await.unwrap(), None);
        assert_eq!(client.hgetall("missing").await.unwrap(), HashMap::new());
        assert_eq!(client.smembers("missing").await.unwrap(), HashSet::new());
        assert_eq!(client.lmembers("missing").await.unwrap(), Vec::<Value>::new());
        assert_eq!(client.zscore("missing", "m").await.unwrap(), None);
        assert_eq!(client.key_type("missing").await.unwrap(), KeyType::None);
    }
}

#[tokio::test]
async fn byte_ranges_are_not_supported() {
    let mut client = recording(CodecKind::Msgpack, []);

    let err = client.getrange("missing", 0, 10).await.unwrap_err();
    assert!(matches!(err, Error::OperationNotSupported(_)));

    let err = client.setrange("k", 2, "x").await.unwrap_err();
    assert!(matches!(err, Error::OperationNotSupported(_)));

    assert!(client.get_ref().sent.is_empty());
}

#[tokio::test]
async fn set_with_conditions() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert!(client
            .set_with("k", 1, SetOptions::default().nx())
            .await
            .unwrap());
        assert!(!client
            .set_with("k", 2, SetOptions::default().nx())
            .await
            .unwrap());
        assert!(!client
            .set_with("other", 2, SetOptions::default().xx())
            .await
            .unwrap());
        assert!(client
            .set_with("k", 3, SetOptions::default().xx().ex(100))
            .await
            .unwrap());

        assert_eq!(client.get("k").await.unwrap(), Some(Value::from(3)));
        let ttl = client.ttl("k").await.unwrap();
        assert!((1..=100).contains(&ttl), "ttl {}", ttl);
        assert!(!client.setnx("k", 4).await.unwrap());
    }
}

#[tokio::test]
async fn set_with_conflicting_options() {
    let mut client = recording(CodecKind::Json, []);

    let err = client
        .set_with("k", 1, SetOptions::default().nx().xx())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgumentShape(_)));
}

#[tokio::test]
async fn getset_returns_previous_value() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert_eq!(client.getset("k", "first").await.unwrap(), None);
        assert_eq!(
            client.getset("k", vec![1, 2]).await.unwrap(),
            Some(Value::from("first"))
        );
        assert_eq!(client.get("k").await.unwrap(), Some(Value::from(vec![1, 2])));
    }
}

#[tokio::test]
async fn multi_key_set_and_get() {
    for kind in CODECS {
        let mut client = memory(kind);

        let mapping = vec![("a", Value::from(1)), ("b", Value::from("x"))];
        assert!(client.mset(mapping).await.unwrap());

        let values = client.mget(&["a", "b", "c"]).await.unwrap();
        assert_eq!(
            values,
            vec![Some(Value::from(1)), Some(Value::from("x")), None]
        );

        let mapping = vec![("b", Value::from(2)), ("c", Value::from(3))];
        assert!(!client.msetnx(mapping).await.unwrap());
        assert_eq!(client.get("c").await.unwrap(), None);
    }
}

#[tokio::test]
async fn empty_bulk_input_is_an_argument_error() {
    let mut client = memory(CodecKind::Json);

    let err = client.mset(Vec::<(&str, Value)>::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentShape(_)));

    let err = client.rpush("l", Vec::<Value>::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentShape(_)));
}

#[tokio::test]
async fn increments_under_json() {
    let mut client = memory(CodecKind::Json);

    client.set("n", 5).await.unwrap();

    assert_eq!(client.incr("n").await.unwrap(), 6);
    assert_eq!(client.incrby("n", 10).await.unwrap(), 16);
    assert_eq!(client.decrby("n", 4).await.unwrap(), 12);
    assert_eq!(client.decr("n").await.unwrap(), 11);
    assert_eq!(client.get("n").await.unwrap(), Some(Value::from(11)));

    assert_eq!(client.incrbyfloat("n", 0.5).await.unwrap(), 11.5);
    assert_eq!(client.get("n").await.unwrap(), Some(Value::from(11.5)));
}

#[tokio::test]
async fn increments_under_binary_codecs() {
    for kind in [CodecKind::Msgpack, CodecKind::Bincode] {
        let mut client = memory(kind);
        client.set("n", 5).await.unwrap();

        let err = client.incr("n").await.unwrap_err();
        assert!(matches!(err, Error::OperationNotSupported(_)));

        let err = client.hincrby("h", "f", 1).await.unwrap_err();
        assert!(matches!(err, Error::OperationNotSupported(_)));

        assert_eq!(client.get("n").await.unwrap(), Some(Value::from(5)));
    }
}

#[tokio::test]
async fn server_errors_pass_through() {
    let mut client = memory(CodecKind::Json);
    client.set("s", "text").await.unwrap();

    let err = client.incr("s").await.unwrap_err();
    assert!(matches!(err, Error::Response(ref msg) if msg.contains("not an integer")));

    let err = client.lpush("s", [1]).await.unwrap_err();
    assert!(matches!(err, Error::Response(ref msg) if msg.starts_with("WRONGTYPE")));
}

#[tokio::test]
async fn hash_fields_are_text_values_are_encoded() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert_eq!(client.hset("h", "name", "ada").await.unwrap(), 1);
        assert_eq!(client.hset("h", "name", "grace").await.unwrap(), 0);
        assert!(client
            .hmset("h", vec![("age", Value::from(36)), ("langs", Value::from(vec!["cobol"]))])
            .await
            .unwrap());
        assert!(!client.hsetnx("h", "age", 37).await.unwrap());

        assert_eq!(client.hget("h", "name").await.unwrap(), Some(Value::from("grace")));
        assert_eq!(
            client.hmget("h", &["age", "nope"]).await.unwrap(),
            vec![Some(Value::from(36)), None]
        );
        assert_eq!(client.hkeys("h").await.unwrap(), vec!["age", "langs", "name"]);
        assert_eq!(client.hlen("h").await.unwrap(), 3);
        assert!(client.hexists("h", "langs").await.unwrap());

        let all = client.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all["langs"], Value::from(vec!["cobol"]));

        assert_eq!(client.hdel("h", &["name", "nope"]).await.unwrap(), 1);
        let mut values = client.hvals("h").await.unwrap();
        values.sort();
        assert_eq!(values, vec![Value::from(36), Value::from(vec!["cobol"])]);
    }
}

#[tokio::test]
async fn field_names_resembling_encoded_values_stay_apart() {
    let mut client = memory(CodecKind::Json);

    // `"x"` is both the JSON encoding of the string x and a legal field name.
    client.hset("h", "x", "\"x\"").await.unwrap();
    client.hset("h", "\"x\"", "x").await.unwrap();

    let all = client.hgetall("h").await.unwrap();

    assert_eq!(all["x"], Value::from("\"x\""));
    assert_eq!(all["\"x\""], Value::from("x"));
}

#[tokio::test]
async fn hash_increments() {
    let mut client = memory(CodecKind::Json);

    assert_eq!(client.hincrby("h", "n", 3).await.unwrap(), 3);
    assert_eq!(client.hincrbyfloat("h", "n", 0.25).await.unwrap(), 3.25);
    assert_eq!(client.hget("h", "n").await.unwrap(), Some(Value::from(3.25)));
}

#[tokio::test]
async fn hash_scan() {
    for kind in CODECS {
        let mut client = memory(kind);
        client
            .hmset("h", vec![("user:1", Value::from(1)), ("user:2", Value::from(2)), ("x", Value::from(3))])
            .await
            .unwrap();

        let (cursor, fields) = client.hscan("h", 0, Some("user:*"), None).await.unwrap();

        assert_eq!(cursor, 0);
        assert_eq!(
            fields,
            HashMap::from([
                ("user:1".to_string(), Value::from(1)),
                ("user:2".to_string(), Value::from(2)),
            ])
        );
    }
}

#[tokio::test]
async fn set_members_are_encoded() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert_eq!(client.sadd("a", [1, 2, 3]).await.unwrap(), 3);
        assert_eq!(client.sadd("b", [2, 3, 4]).await.unwrap(), 3);
        assert_eq!(client.sadd("a", [1]).await.unwrap(), 0);

        assert!(client.sismember("a", 2).await.unwrap());
        assert!(!client.sismember("a", "2").await.unwrap());
        assert_eq!(client.scard("a").await.unwrap(), 3);

        let ints = |items: &[i64]| -> HashSet<Value> { items.iter().map(|i| Value::from(*i)).collect() };
        assert_eq!(client.smembers("a").await.unwrap(), ints(&[1, 2, 3]));
        assert_eq!(client.sinter(&["a", "b"]).await.unwrap(), ints(&[2, 3]));
        assert_eq!(client.sdiff(&["a", "b"]).await.unwrap(), ints(&[1]));
        assert_eq!(client.sunion(&["a", "b"]).await.unwrap(), ints(&[1, 2, 3, 4]));

        let mut listed = client.sunion_as_list(&["a", "b"]).await.unwrap();
        listed.sort();
        assert_eq!(listed, vec![Value::from(1), Value::from(2), Value::from(3), Value::from(4)]);

        assert_eq!(client.sinterstore("c", &["a", "b"]).await.unwrap(), 2);
        assert_eq!(client.smembers("c").await.unwrap(), ints(&[2, 3]));

        assert!(client.smove("a", "b", 1).await.unwrap());
        assert!(!client.smove("a", "b", 1).await.unwrap());
        assert_eq!(client.srem("b", [1, 4, 9]).await.unwrap(), 2);
        assert_eq!(client.smembers("b").await.unwrap(), ints(&[2, 3]));
    }
}

#[tokio::test]
async fn composite_members_as_list() {
    let mut client = memory(CodecKind::Json);
    let member = Value::from(HashMap::from([("k", 1)]));

    client.sadd("s", [member.clone()]).await.unwrap();

    assert_eq!(client.smembers_as_list("s").await.unwrap(), vec![member.clone()]);
    assert_eq!(client.spop("s").await.unwrap(), Some(member));
    assert_eq!(client.spop("s").await.unwrap(), None);
}

#[tokio::test]
async fn random_members() {
    let mut client = memory(CodecKind::Msgpack);
    client.sadd("s", ["only"]).await.unwrap();

    assert_eq!(client.srandmember("s").await.unwrap(), Some(Value::from("only")));
    assert_eq!(
        client.srandmember_count("s", -3).await.unwrap(),
        vec![Value::from("only"); 3]
    );
    assert_eq!(client.scard("s").await.unwrap(), 1);
}

#[tokio::test]
async fn sorted_set_members_are_encoded_scores_are_not() {
    for kind in CODECS {
        let mut client = memory(kind);

        let added = client
            .zadd("z", vec![("a", 1.0), ("b", 2.0), ("c", 3.0)])
            .await
            .unwrap();
        assert_eq!(added, 3);

        assert_eq!(
            client.zrange("z", 0, -1).await.unwrap(),
            vec![Value::from("a"), Value::from("b"), Value::from("c")]
        );
        assert_eq!(
            client.zrevrange_withscores("z", 0, 1).await.unwrap(),
            vec![(Value::from("c"), 3.0), (Value::from("b"), 2.0)]
        );
        assert_eq!(client.zscore("z", "b").await.unwrap(), Some(2.0));
        assert_eq!(client.zrank("z", "c").await.unwrap(), Some(2));
        assert_eq!(client.zrevrank("z", "c").await.unwrap(), Some(0));
        assert_eq!(client.zrank("z", "nope").await.unwrap(), None);
        assert_eq!(client.zcard("z").await.unwrap(), 3);
        assert_eq!(client.zcount("z", 1.5, f64::INFINITY).await.unwrap(), 2);

        assert_eq!(client.zincrby("z", 5.0, "a").await.unwrap(), 6.0);
        assert_eq!(
            client.zrangebyscore_withscores("z", 2.0, 10.0, None).await.unwrap(),
            vec![
                (Value::from("b"), 2.0),
                (Value::from("c"), 3.0),
                (Value::from("a"), 6.0)
            ]
        );
        assert_eq!(
            client
                .zrevrangebyscore("z", 10.0, 0.0, Some((1, 1)))
                .await
                .unwrap(),
            vec![Value::from("c")]
        );

        assert_eq!(client.zrem("z", ["a", "nope"]).await.unwrap(), 1);
        assert_eq!(client.zremrangebyscore("z", 0.0, 2.0).await.unwrap(), 1);
        assert_eq!(client.zmembers("z").await.unwrap(), vec![Value::from("c")]);
        assert_eq!(client.zremrangebyrank("z", 0, -1).await.unwrap(), 1);
        assert_eq!(client.key_type("z").await.unwrap(), KeyType::None);
    }
}

#[tokio::test]
async fn sorted_set_aggregation() {
    let mut client = memory(CodecKind::Bincode);
    client.zadd("x", vec![("a", 1.0), ("b", 2.0)]).await.unwrap();
    client.zadd("y", vec![("b", 5.0), ("c", 1.0)]).await.unwrap();

    assert_eq!(client.zunionstore("u", &["x", "y"], None).await.unwrap(), 3);
    assert_eq!(
        client.zrange_withscores("u", 0, -1).await.unwrap(),
        vec![
            (Value::from("a"), 1.0),
            (Value::from("c"), 1.0),
            (Value::from("b"), 7.0)
        ]
    );

    assert_eq!(
        client
            .zinterstore("i", &["x", "y"], Some(Aggregate::Max))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        client.zrange_withscores("i", 0, -1).await.unwrap(),
        vec![(Value::from("b"), 5.0)]
    );
}

#[tokio::test]
async fn list_values_are_encoded() {
    for kind in CODECS {
        let mut client = memory(kind);

        assert_eq!(client.rpush("l", [1, 2, 3]).await.unwrap(), 3);
        assert_eq!(client.lpush("l", [0]).await.unwrap(), 4);
        assert_eq!(client.rpushx("missing", 1).await.unwrap(), 0);

        assert_eq!(
            client.lmembers("l").await.unwrap(),
            vec![Value::from(0), Value::from(1), Value::from(2), Value::from(3)]
        );
        assert_eq!(client.lindex("l", -1).await.unwrap(), Some(Value::from(3)));
        assert_eq!(client.llen("l").await.unwrap(), 4);

        assert!(client.lset("l", 0, "zero").await.unwrap());
        assert_eq!(
            client
                .linsert("l", InsertPosition::After, "zero", 0.5)
                .await
                .unwrap(),
            5
        );
        assert_eq!(client.lrem("l", 0, 2).await.unwrap(), 1);
        assert_eq!(
            client.lrange("l", 0, 2).await.unwrap(),
            vec![Value::from("zero"), Value::from(0.5), Value::from(1)]
        );

        assert!(client.ltrim("l", 1, -1).await.unwrap());
        assert_eq!(client.lpop("l").await.unwrap(), Some(Value::from(0.5)));
        assert_eq!(client.rpoplpush("l", "other").await.unwrap(), Some(Value::from(3)));
        assert_eq!(client.rpop("other").await.unwrap(), Some(Value::from(3)));
        assert_eq!(client.rpop("other").await.unwrap(), None);
    }
}

#[tokio::test(start_paused = true)]
async fn blocking_pop_follows_key_priority() {
    for kind in CODECS {
        let mut client = memory(kind);
        client.rpush("a", [1, 2]).await.unwrap();
        client.rpush("b", [3, 4]).await.unwrap();

        let mut popped = Vec::new();
        while let Some(item) = client.blpop(&["a", "b"], 1).await.unwrap() {
            popped.push(item);
        }

        assert_eq!(
            popped,
            vec![
                ("a".to_string(), Value::from(1)),
                ("a".to_string(), Value::from(2)),
                ("b".to_string(), Value::from(3)),
                ("b".to_string(), Value::from(4)),
            ]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn blocking_pop_from_the_tail() {
    let mut client = memory(CodecKind::Json);
    client.rpush("src", ["x", "y"]).await.unwrap();

    assert_eq!(
        client.brpop(&["empty", "src"], 1).await.unwrap(),
        Some(("src".to_string(), Value::from("y")))
    );
    assert_eq!(
        client.brpoplpush("src", "dst", 1).await.unwrap(),
        Some(Value::from("x"))
    );
    assert_eq!(client.brpoplpush("src", "dst", 1).await.unwrap(), None);
    assert_eq!(client.lmembers("dst").await.unwrap(), vec![Value::from("x")]);
}

#[tokio::test]
async fn exact_scan_patterns_match_encoded_members() {
    for kind in CODECS {
        let mut client = memory(kind);
        client.sadd("s", ["apple", "apricot", "banana"]).await.unwrap();
        client
            .zadd("z", vec![("apple", 1.0), ("banana", 2.0)])
            .await
            .unwrap();

        let (cursor, members) = client.sscan("s", 0, Some("apricot"), None).await.unwrap();
        assert_eq!(cursor, 0);
        assert_eq!(members, vec![Value::from("apricot")]);

        let (_, scored) = client.zscan("z", 0, Some("banana"), None).await.unwrap();
        assert_eq!(scored, vec![(Value::from("banana"), 2.0)]);

        let (_, everything) = client.sscan("s", 0, Some("*"), Some(100)).await.unwrap();
        assert_eq!(everything.len(), 3);
    }
}

#[tokio::test]
async fn wildcard_scan_patterns_match_encoded_bytes() {
    let mut client = memory(CodecKind::Json);
    client.sadd("s", ["apple", "apricot"]).await.unwrap();

    // Encoded members start with a quote, so a prefix pattern finds nothing.
    let (_, members) = client.sscan("s", 0, Some("ap*"), None).await.unwrap();
    assert!(members.is_empty());

    let (_, members) = client.sscan("s", 0, Some("\"ap*"), None).await.unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn keys_and_scan_return_names() {
    let mut client = memory(CodecKind::Msgpack);
    client.set("user:1", 1).await.unwrap();
    client.set("user:2", 2).await.unwrap();
    client.set("session", 3).await.unwrap();

    assert_eq!(client.keys("user:*").await.unwrap(), vec!["user:1", "user:2"]);

    let mut cursor = 0;
    let mut seen = Vec::new();
    loop {
        let (next, keys) = client.scan(cursor, None, Some(2)).await.unwrap();
        seen.extend(keys);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    seen.sort();
    assert_eq!(seen, vec!["session", "user:1", "user:2"]);
}

#[tokio::test(start_paused = true)]
async fn key_management_passes_through() {
    for kind in CODECS {
        let mut client = memory(kind);
        client.set("a", "value").await.unwrap();

        assert_eq!(client.exists(&["a", "b", "a"]).await.unwrap(), 2);
        assert_eq!(client.key_type("a").await.unwrap(), KeyType::String);

        assert!(client.expire("a", 10).await.unwrap());
        assert_eq!(client.ttl("a").await.unwrap(), 10);
        assert!(client.pexpire("a", 5000).await.unwrap());
        let pttl = client.pttl("a").await.unwrap();
        assert!((4900..=5000).contains(&pttl), "pttl {}", pttl);
        assert!(client.persist("a").await.unwrap());
        assert_eq!(client.ttl("a").await.unwrap(), -1);

        assert!(client.rename("a", "b").await.unwrap());
        assert!(!client.renamenx("b", "b").await.unwrap());
        assert_eq!(client.get("b").await.unwrap(), Some(Value::from("value")));

        assert_eq!(client.delete(&["a", "b"]).await.unwrap(), 1);
        assert_eq!(client.ttl("b").await.unwrap(), -2);
    }
}

#[tokio::test]
async fn numeric_sort_under_json() {
    let mut client = memory(CodecKind::Json);
    client.rpush("l", [3, 10, 1]).await.unwrap();

    assert_eq!(
        client.sort("l", SortOptions::default()).await.unwrap(),
        vec![Value::from(1), Value::from(3), Value::from(10)]
    );
    assert_eq!(
        client
            .sort("l", SortOptions::default().desc().limit(0, 2))
            .await
            .unwrap(),
        vec![Value::from(10), Value::from(3)]
    );
}

#[tokio::test]
async fn sort_by_external_weights_under_json() {
    let mut client = memory(CodecKind::Json);
    client.rpush("l", ["x", "y"]).await.unwrap();
    client.set("w_\"x\"", 2).await.unwrap();
    client.set("w_\"y\"", 1).await.unwrap();

    assert_eq!(
        client.sort("l", SortOptions::default().by("w_*")).await.unwrap(),
        vec![Value::from("y"), Value::from("x")]
    );
}

#[tokio::test]
async fn alpha_sort_is_refused_under_json() {
    let mut client = memory(CodecKind::Json);
    client.rpush("l", ["a b", "a"]).await.unwrap();

    let err = client
        .sort("l", SortOptions::default().alpha())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OperationNotSupported(_)));
    assert!(client
        .sort_store("l", SortOptions::default().alpha(), "sorted")
        .await
        .is_err());
    assert_eq!(client.exists(&["sorted"]).await.unwrap(), 0);
}

#[tokio::test]
async fn sort_under_binary_codecs() {
    for kind in [CodecKind::Msgpack, CodecKind::Bincode] {
        let mut client = memory(kind);
        client.rpush("l", [3, 1, 2]).await.unwrap();

        let err = client
            .sort("l", SortOptions::default().alpha())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OperationNotSupported(_)));

        // Small integers encode to bytes that compare in numeric order.
        assert_eq!(
            client.sort("l", SortOptions::default()).await.unwrap(),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
        assert_eq!(
            client
                .sort_store("l", SortOptions::default(), "sorted")
                .await
                .unwrap(),
            3
        );
        assert_eq!(client.lindex("sorted", 0).await.unwrap(), Some(Value::from(1)));
    }
}

#[tokio::test]
async fn smart_values_keep_their_kind() {
    for kind in CODECS {
        let mut client = memory(kind);

        let mut map = BTreeMap::new();
        map.insert(Value::from("name"), Value::from("ada"));
        map.insert(Value::from("tags"), Value::from(vec!["x", "y"]));
        let values = [
            Value::Map(map),
            Value::from(vec![Value::from(1), Value::from("two"), Value::from(vec![3])]),
            Value::Set(BTreeSet::from([Value::from(1), Value::from(2)])),
            Value::from("plain"),
            Value::from(42),
        ];

        for value in values {
            assert!(client.smart_set("k", value.clone()).await.unwrap());
            assert_eq!(client.smart_get("k").await.unwrap(), Some(value), "{} codec", kind);
        }
    }
}

#[tokio::test]
async fn smart_set_replaces_the_previous_kind() {
    let mut client = memory(CodecKind::Json);

    client.smart_set("k", Value::from(vec![1, 2])).await.unwrap();
    client.smart_set("k", Value::from("v")).await.unwrap();

    assert_eq!(client.smart_get("k").await.unwrap(), Some(Value::from("v")));
}

#[tokio::test]
async fn smart_set_refuses_empty_collections() {
    let mut client = memory(CodecKind::Bincode);
    client.smart_set("k", Value::from(vec![1, 2])).await.unwrap();

    for empty in [
        Value::List(Vec::new()),
        Value::Set(BTreeSet::new()),
        Value::Map(BTreeMap::new()),
    ] {
        let err = client.smart_set("k", empty).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentShape(_)));
    }

    assert_eq!(
        client.smart_get("k").await.unwrap(),
        Some(Value::from(vec![1, 2]))
    );
}

#[tokio::test]
async fn smart_get_reads_sorted_sets_as_lists() {
    let mut client = memory(CodecKind::Msgpack);
    client.zadd("z", vec![("b", 2.0), ("a", 1.0)]).await.unwrap();

    assert_eq!(
        client.smart_get("z").await.unwrap(),
        Some(Value::from(vec!["a", "b"]))
    );
}

#[tokio::test]
async fn smart_set_needs_string_fields() {
    let mut client = memory(CodecKind::Bincode);
    let mut map = BTreeMap::new();
    map.insert(Value::from(1), Value::from("one"));

    let err = client.smart_set("k", Value::Map(map)).await.unwrap_err();

    assert!(matches!(err, Error::InvalidArgumentShape(_)));
    assert_eq!(client.key_type("k").await.unwrap(), KeyType::None);
}
