//! Payload fidelity through every codec.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use fightcast_codec::{Codec, CodecExt, CodecId, JsonCodec, RonCodec};
use fightcast_core::{ErrorDescriptor, ErrorKind, FightRecord};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

fn codecs() -> Vec<Box<dyn Codec>> {
    vec![Box::new(JsonCodec), Box::new(RonCodec::new()), Box::new(RonCodec::pretty())]
}

fn card() -> Vec<FightRecord> {
    vec![
        FightRecord::new("Alex Pereira", "Jamahal Hill", "Alex Pereira"),
        FightRecord::new("Zhang Weili", "Yan Xiaonan", "Zhang Weili"),
        FightRecord::new("Justin Gaethje", "Max Holloway", "Max Holloway"),
    ]
}

/// Event metadata mixing types JSON has no native form for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EventMeta {
    starts_at: DateTime<Utc>,
    card_runtime: Duration,
    bouts_by_order: BTreeMap<u32, String>,
    weight_classes: BTreeSet<String>,
}

fn event_meta() -> EventMeta {
    EventMeta {
        starts_at: Utc.with_ymd_and_hms(2024, 4, 13, 22, 0, 0).unwrap(),
        card_runtime: Duration::from_secs(5 * 60 * 60),
        bouts_by_order: BTreeMap::from([(1, "main event".to_string()), (2, "co-main".to_string())]),
        weight_classes: BTreeSet::from(["lightweight".to_string(), "strawweight".to_string()]),
    }
}

#[test]
fn test_fight_records_round_trip() {
    for codec in codecs() {
        let raw = codec.encode(&card()).unwrap();
        let back: Vec<FightRecord> = codec.decode(&raw).unwrap();
        assert_eq!(back, card(), "codec {}", codec.codec_id());
    }
}

#[test]
fn test_empty_card_round_trip() {
    for codec in codecs() {
        let raw = codec.encode(&Vec::<FightRecord>::new()).unwrap();
        let back: Vec<FightRecord> = codec.decode(&raw).unwrap();
        assert!(back.is_empty());
    }
}

#[test]
fn test_error_descriptors_round_trip() {
    let errors = [
        ErrorDescriptor::new(ErrorKind::UpstreamStatus(500), "internal server error"),
        ErrorDescriptor::new(ErrorKind::UpstreamShape, "`data` is not a sequence"),
        ErrorDescriptor::new(ErrorKind::Network, "connection refused"),
        ErrorDescriptor::new(ErrorKind::Configuration, "BACKEND_URL is not set"),
        ErrorDescriptor::new(ErrorKind::Internal, "loader task aborted"),
    ];
    for codec in codecs() {
        for error in &errors {
            let raw = codec.encode(error).unwrap();
            let back: ErrorDescriptor = codec.decode(&raw).unwrap();
            assert_eq!(&back, error);
        }
    }
}

#[test]
fn test_extended_types_keep_their_type() {
    for codec in codecs() {
        let raw = codec.encode(&event_meta()).unwrap();
        let back: EventMeta = codec.decode(&raw).unwrap();
        assert_eq!(back, event_meta());
    }
}

#[test]
fn test_composite_map_keys_need_ron() {
    let odds: HashMap<(u8, u8), String> = HashMap::from([((1, 2), "even".to_string())]);

    assert!(JsonCodec.encode(&odds).is_err());

    let raw = RonCodec::new().encode(&odds).unwrap();
    let back: HashMap<(u8, u8), String> = RonCodec::new().decode(&raw).unwrap();
    assert_eq!(back, odds);
}

#[test]
fn test_codec_id_rebuilds_codec() {
    let raw = JsonCodec.encode(&card()).unwrap();
    let codec = CodecId::Json.codec();
    let back: Vec<FightRecord> = codec.decode(&raw).unwrap();
    assert_eq!(back, card());
}

#[test]
fn test_json_rejects_trailing_data() {
    let result: Result<Vec<FightRecord>, _> = JsonCodec.decode(b"[] []");
    assert!(result.is_err());
}

#[test]
fn test_ron_rejects_trailing_data() {
    let result: Result<Vec<FightRecord>, _> = RonCodec::new().decode(b"[] []");
    assert!(result.is_err());
}

#[test]
fn test_ron_layouts_decode_alike() {
    let compact = RonCodec::new().encode(&card()).unwrap();
    let pretty = RonCodec::pretty().encode(&card()).unwrap();

    assert!(!compact.contains(&b'\n'));
    assert!(pretty.contains(&b'\n'));

    let from_compact: Vec<FightRecord> = RonCodec::pretty().decode(&compact).unwrap();
    let from_pretty: Vec<FightRecord> = RonCodec::new().decode(&pretty).unwrap();
    assert_eq!(from_compact, card());
    assert_eq!(from_pretty, card());
}
