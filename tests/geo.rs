mod common;

use bytes::Bytes;
use common::{recording, CODECS};
use serialized_redis::{CodecKind, Frame, GeoMember, GeoRadiusOptions, GeoUnit, Order, Value};

fn encoded(kind: CodecKind, value: impl Into<Value>) -> Bytes {
    kind.build().serialize(&value.into()).unwrap()
}

#[tokio::test]
async fn geoadd_encodes_members_only() {
    for kind in CODECS {
        let mut client = recording(kind, [Frame::Integer(2)]);

        let added = client
            .geoadd("sicily", [(13.361389, 38.115556, "Palermo"), (15.087269, 37.502669, "Catania")])
            .await
            .unwrap();

        assert_eq!(added, 2);
        let lines = client.get_ref().lines();
        assert_eq!(
            lines[0],
            vec![
                b"GEOADD".to_vec(),
                b"sicily".to_vec(),
                b"13.361389".to_vec(),
                b"38.115556".to_vec(),
                encoded(kind, "Palermo").to_vec(),
                b"15.087269".to_vec(),
                b"37.502669".to_vec(),
                encoded(kind, "Catania").to_vec(),
            ]
        );
    }
}

#[tokio::test]
async fn geoadd_needs_a_member() {
    let mut client = recording(CodecKind::Json, []);

    let items: Vec<(f64, f64, &str)> = Vec::new();
    assert!(client.geoadd("sicily", items).await.is_err());
    assert!(client.get_ref().sent.is_empty());
}

#[tokio::test]
async fn geodist_parses_the_distance() {
    let mut client = recording(
        CodecKind::Json,
        [Frame::bulk("166.2742"), Frame::Null],
    );

    let dist = client
        .geodist("sicily", "Palermo", "Catania", Some(GeoUnit::Km))
        .await
        .unwrap();
    let missing = client.geodist("sicily", "Palermo", "Rome", None).await.unwrap();

    assert_eq!(dist, Some(166.2742));
    assert_eq!(missing, None);
    assert_eq!(
        client.get_ref().sent[0].to_string(),
        "GEODIST sicily \"Palermo\" \"Catania\" km"
    );
}

#[tokio::test]
async fn geohash_and_geopos() {
    let mut client = recording(
        CodecKind::Msgpack,
        [
            Frame::Array(vec![Frame::bulk("sqc8b49rny0"), Frame::Null]),
            Frame::Array(vec![
                Frame::Array(vec![
                    Frame::bulk("13.36138933897018433"),
                    Frame::bulk("38.11555639549629859"),
                ]),
                Frame::Null,
            ]),
        ],
    );

    let hashes = client.geohash("sicily", ["Palermo", "Nowhere"]).await.unwrap();
    let positions = client.geopos("sicily", ["Palermo", "Nowhere"]).await.unwrap();

    assert_eq!(hashes, vec![Some("sqc8b49rny0".to_string()), None]);
    assert_eq!(
        positions,
        vec![Some((13.36138933897018433, 38.11555639549629859)), None]
    );
    let lines = client.get_ref().lines();
    assert_eq!(lines[1][2], encoded(CodecKind::Msgpack, "Palermo").to_vec());
}

#[tokio::test]
async fn georadius_plain_members() {
    for kind in CODECS {
        let mut client = recording(
            kind,
            [Frame::Array(vec![
                Frame::Bulk(encoded(kind, "Palermo")),
                Frame::Bulk(encoded(kind, vec![1, 2])),
            ])],
        );

        let members = client
            .georadius("sicily", 15.0, 37.0, 200.0, GeoUnit::Km, GeoRadiusOptions::default())
            .await
            .unwrap();

        let names: Vec<Value> = members.into_iter().map(|geo| geo.member).collect();
        assert_eq!(names, vec![Value::from("Palermo"), Value::from(vec![1, 2])]);
        assert_eq!(
            client.get_ref().lines()[0][..6],
            [
                b"GEORADIUS".to_vec(),
                b"sicily".to_vec(),
                b"15".to_vec(),
                b"37".to_vec(),
                b"200".to_vec(),
                b"km".to_vec(),
            ]
        );
    }
}

#[tokio::test]
async fn georadius_decodes_only_the_member_slot() {
    let kind = CodecKind::Json;
    let mut client = recording(
        kind,
        [Frame::Array(vec![Frame::Array(vec![
            Frame::Bulk(encoded(kind, "Palermo")),
            Frame::bulk("190.4424"),
            Frame::Integer(3479099956230698),
            Frame::Array(vec![
                Frame::bulk("13.36138933897018433"),
                Frame::bulk("38.11555639549629859"),
            ]),
        ])])],
    );

    let options = GeoRadiusOptions::default()
        .with_dist()
        .with_hash()
        .with_coord()
        .count(1)
        .order(Order::Asc);
    let members = client
        .georadius("sicily", 15.0, 37.0, 200.0, GeoUnit::Km, options)
        .await
        .unwrap();

    assert_eq!(
        members,
        vec![GeoMember {
            member: Value::from("Palermo"),
            dist: Some(190.4424),
            hash: Some(3479099956230698),
            coord: Some((13.36138933897018433, 38.11555639549629859)),
        }]
    );
    assert_eq!(
        client.get_ref().sent[0].to_string(),
        "GEORADIUS sicily 15 37 200 km WITHDIST WITHCOORD WITHHASH COUNT 1 ASC"
    );
}

#[tokio::test]
async fn georadiusbymember_encodes_the_center() {
    let kind = CodecKind::Json;
    let mut client = recording(
        kind,
        [Frame::Array(vec![Frame::Array(vec![
            Frame::Bulk(encoded(kind, "Catania")),
            Frame::bulk("0.0000"),
        ])])],
    );

    let members = client
        .georadiusbymember(
            "sicily",
            "Catania",
            100.0,
            GeoUnit::Km,
            GeoRadiusOptions::default().with_dist(),
        )
        .await
        .unwrap();

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].member, Value::from("Catania"));
    assert_eq!(members[0].dist, Some(0.0));
    assert_eq!(
        client.get_ref().sent[0].to_string(),
        "GEORADIUSBYMEMBER sicily \"Catania\" 100 km WITHDIST"
    );
}

#[tokio::test]
async fn georadius_store_returns_the_count() {
    let mut client = recording(CodecKind::Json, [Frame::Integer(2), Frame::Integer(1)]);

    let stored = client
        .georadius_store("sicily", 15.0, 37.0, 200.0, GeoUnit::Km, "near", false)
        .await
        .unwrap();
    let with_dist = client
        .georadius_store("sicily", 15.0, 37.0, 50.0, GeoUnit::Km, "dists", true)
        .await
        .unwrap();

    assert_eq!(stored, 2);
    assert_eq!(with_dist, 1);
    let commands: Vec<String> = client.get_ref().sent.iter().map(|cmd| cmd.to_string()).collect();
    assert_eq!(
        commands,
        vec![
            "GEORADIUS sicily 15 37 200 km STORE near",
            "GEORADIUS sicily 15 37 50 km STOREDIST dists",
        ]
    );
}
