#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn sample_asset() -> AssetInstance {
    AssetInstance::new(
        "6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e".parse().expect("uuid"),
        "cat.png",
        Position::new(12.5, 40.0),
        Size::new(15.0, 18.0),
    )
}

// =============================================================
// Wire shape
// =============================================================

#[test]
fn new_message_uses_externally_tagged_shape() {
    let state: ChannelState = std::iter::once(sample_asset()).collect();
    let text = encode_message(&SyncMessage::snapshot(&state)).expect("encode");
    let value: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(
        value,
        json!({"New": {"assets": [{
            "id": "6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e",
            "x": 12.5, "y": 40.0, "w": 15.0, "h": 18.0,
            "url": "cat.png"
        }]}})
    );
}

#[test]
fn update_message_carries_full_record() {
    let text = encode_message(&SyncMessage::update(&sample_asset())).expect("encode");
    let value: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["Update"]["id"], "6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e");
    assert_eq!(value["Update"]["x"], 12.5);
    assert_eq!(value["Update"]["url"], "cat.png");
}

#[test]
fn delete_message_is_bare_identifier() {
    let text = encode_message(&SyncMessage::delete(sample_asset().id())).expect("encode");
    assert_eq!(text, r#"{"Delete":"6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e"}"#);
}

#[test]
fn empty_snapshot_encodes_empty_list() {
    let text = encode_message(&SyncMessage::snapshot(&ChannelState::new())).expect("encode");
    assert_eq!(text, r#"{"New":{"assets":[]}}"#);
}

// =============================================================
// decode_message
// =============================================================

#[test]
fn decode_accepts_each_kind() {
    let new = decode_message(r#"{"New":{"assets":[]}}"#).expect("new");
    assert_eq!(new.kind(), MessageKind::New);

    let update = decode_message(
        r#"{"Update":{"id":"6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e","x":1,"y":2,"w":3,"h":4,"url":"a.png"}}"#,
    )
    .expect("update");
    assert_eq!(update.kind(), MessageKind::Update);

    let delete = decode_message(r#"{"Delete":"6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e"}"#).expect("delete");
    assert_eq!(delete, SyncMessage::Delete(sample_asset().id()));
}

#[test]
fn decode_reproduces_encoded_snapshot() {
    let state: ChannelState = std::iter::once(sample_asset()).collect();
    let message = SyncMessage::snapshot(&state);
    let decoded = decode_message(&encode_message(&message).expect("encode")).expect("decode");
    assert_eq!(decoded, message);
}

#[test]
fn decode_rejects_unknown_kind() {
    let err = decode_message(r#"{"Rotate":{"id":"x"}}"#).expect_err("unknown kind");
    assert!(matches!(err, CodecError::UnknownKind(ref k) if k == "Rotate"));
}

#[test]
fn decode_rejects_malformed_json() {
    let err = decode_message("{not json").expect_err("malformed");
    assert!(matches!(err, CodecError::Malformed(_)));
}

#[test]
fn decode_rejects_non_object() {
    let err = decode_message("[1,2,3]").expect_err("array");
    assert!(matches!(err, CodecError::NotAnObject));
}

#[test]
fn decode_rejects_multiple_kind_keys() {
    let err = decode_message(r#"{"New":{"assets":[]},"Delete":"x"}"#).expect_err("two keys");
    assert!(matches!(err, CodecError::Shape(2)));
    let err = decode_message("{}").expect_err("no keys");
    assert!(matches!(err, CodecError::Shape(0)));
}

#[test]
fn decode_rejects_payload_mismatch() {
    let err = decode_message(r#"{"Update":{"id":"6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e"}}"#)
        .expect_err("missing fields");
    assert!(matches!(err, CodecError::InvalidPayload { kind: MessageKind::Update, .. }));

    let err = decode_message(r#"{"Delete":42}"#).expect_err("numeric id");
    assert!(matches!(err, CodecError::InvalidPayload { kind: MessageKind::Delete, .. }));
}

#[test]
fn non_uuid_id_fails_the_whole_frame() {
    let err = decode_message(r#"{"Update":{"id":"cat-1","x":1.0,"y":2.0,"w":10.0,"h":10.0,"url":"cat.png"}}"#)
        .expect_err("non-uuid id");
    assert!(matches!(err, CodecError::InvalidPayload { kind: MessageKind::Update, .. }));

    let frame = r#"{"New":{"assets":[
        {"id":"6f1c2a9e-0f4e-4b7a-9a43-2f1d2b3c4d5e","x":1.0,"y":2.0,"w":10.0,"h":10.0,"url":"a.png"},
        {"id":"cat-1","x":1.0,"y":2.0,"w":10.0,"h":10.0,"url":"b.png"}
    ]}}"#;
    let err = decode_message(frame).expect_err("one bad id poisons the snapshot");
    assert!(matches!(err, CodecError::InvalidPayload { kind: MessageKind::New, .. }));
}

#[test]
fn legacy_snapshot_without_kind_is_rejected() {
    // The snapshot-only protocol sent bare `{"assets": [...]}` frames.
    let err = decode_message(r#"{"assets":[]}"#).expect_err("bare snapshot");
    assert!(matches!(err, CodecError::UnknownKind(ref k) if k == "assets"));
}

// =============================================================
// Model conversion
// =============================================================

#[test]
fn wire_asset_out_of_range_is_clamped_into_model() {
    let wire = WireAsset { id: AssetId::generate(), x: -3.0, y: 104.0, w: 250.0, h: 10.0, url: "a.png".into() };
    let asset = AssetInstance::from(wire);
    assert_eq!(asset.position, Position { x: 0.0, y: 100.0 });
    assert_eq!(asset.size, Size { w: 100.0, h: 10.0 });
}

#[test]
fn snapshot_into_instances_preserves_order() {
    let a = sample_asset();
    let b = AssetInstance::new(AssetId::generate(), "dog.png", Position::new(1.0, 1.0), Size::new(10.0, 10.0));
    let snapshot = Snapshot { assets: vec![WireAsset::from(&b), WireAsset::from(&a)] };
    let ids: Vec<AssetId> = snapshot.into_instances().iter().map(AssetInstance::id).collect();
    assert_eq!(ids, vec![b.id(), a.id()]);
}

#[test]
fn message_kind_display_matches_wire_key() {
    assert_eq!(MessageKind::New.to_string(), "New");
    assert_eq!(MessageKind::Update.to_string(), "Update");
    assert_eq!(MessageKind::Delete.to_string(), "Delete");
}
