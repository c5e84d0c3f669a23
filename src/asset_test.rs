#![allow(clippy::float_cmp)]

use super::*;

fn asset(x: f64, y: f64, w: f64, h: f64) -> AssetInstance {
    AssetInstance::new(AssetId::generate(), "cat.png", Position::new(x, y), Size::new(w, h))
}

// =============================================================
// clamp_percent / geometry
// =============================================================

#[test]
fn clamp_percent_bounds_values() {
    assert_eq!(clamp_percent(-5.0), 0.0);
    assert_eq!(clamp_percent(42.5), 42.5);
    assert_eq!(clamp_percent(140.0), 100.0);
    assert_eq!(clamp_percent(f64::NAN), 0.0);
    assert_eq!(clamp_percent(f64::INFINITY), 0.0);
}

#[test]
fn asset_new_clamps_geometry() {
    let a = asset(-10.0, 120.0, 150.0, -1.0);
    assert_eq!(a.position, Position { x: 0.0, y: 100.0 });
    assert_eq!(a.size, Size { w: 100.0, h: 0.0 });
}

#[test]
fn pixel_rect_scales_by_canvas() {
    let a = asset(10.0, 20.0, 30.0, 40.0);
    let rect = a.pixel_rect(CanvasSize::new(1000.0, 500.0));
    assert_eq!(rect, PixelRect { x: 100.0, y: 100.0, w: 300.0, h: 200.0 });
}

#[test]
fn pixel_rect_contains_is_inclusive() {
    let rect = PixelRect { x: 10.0, y: 10.0, w: 20.0, h: 20.0 };
    assert!(rect.contains(10.0, 10.0));
    assert!(rect.contains(30.0, 30.0));
    assert!(rect.contains(20.0, 15.0));
    assert!(!rect.contains(9.9, 15.0));
    assert!(!rect.contains(20.0, 30.1));
}

#[test]
fn pixels_to_percent_uses_each_axis() {
    let canvas = CanvasSize::new(1000.0, 500.0);
    assert_eq!(canvas.pixels_to_percent(10.0, 10.0), Some((1.0, 2.0)));
}

#[test]
fn pixels_to_percent_rejects_degenerate_canvas() {
    assert!(CanvasSize::new(0.0, 500.0).pixels_to_percent(1.0, 1.0).is_none());
    assert!(CanvasSize::new(800.0, -1.0).pixels_to_percent(1.0, 1.0).is_none());
    assert!(CanvasSize::new(f64::NAN, 1.0).is_degenerate());
}

#[test]
fn translate_clamps_at_edges() {
    let mut a = asset(99.5, 0.5, 10.0, 10.0);
    a.translate(1.0, -1.0);
    assert_eq!(a.position, Position { x: 100.0, y: 0.0 });
}

#[test]
fn assign_fields_keeps_identity() {
    let mut a = asset(1.0, 2.0, 3.0, 4.0);
    let id = a.id();
    let b = AssetInstance::new(AssetId::generate(), "dog.png", Position::new(5.0, 6.0), Size::new(7.0, 8.0));
    a.assign_fields(&b);
    assert_eq!(a.id(), id);
    assert_eq!(a.source_ref, "dog.png");
    assert_eq!(a.position, Position { x: 5.0, y: 6.0 });
    assert_eq!(a.size, Size { w: 7.0, h: 8.0 });
}

// =============================================================
// AssetId
// =============================================================

#[test]
fn asset_id_parses_and_displays_as_uuid() {
    let id = AssetId::generate();
    let parsed: AssetId = id.to_string().parse().expect("uuid string should parse");
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<AssetId>().is_err());
}

#[test]
fn asset_id_serializes_transparently() {
    let uuid = uuid::Uuid::nil();
    let json = serde_json::to_string(&AssetId::from(uuid)).expect("serialize");
    assert_eq!(json, format!("\"{uuid}\""));
}

// =============================================================
// ChannelState
// =============================================================

#[test]
fn channel_state_starts_empty() {
    let state = ChannelState::new();
    assert!(state.is_empty());
    assert_eq!(state.len(), 0);
    assert_eq!(state, ChannelState::default());
}

#[test]
fn insert_with_existing_id_replaces_in_place() {
    let a = asset(1.0, 1.0, 10.0, 10.0);
    let b = asset(2.0, 2.0, 10.0, 10.0);
    let mut state: ChannelState = [a.clone(), b.clone()].into_iter().collect();

    let mut moved = a.clone();
    moved.move_to(50.0, 50.0);
    state.insert(moved);

    let order: Vec<AssetId> = state.iter().map(AssetInstance::id).collect();
    assert_eq!(order, vec![a.id(), b.id()]);
    assert_eq!(state.get(a.id()).map(|x| x.position.x), Some(50.0));
}

#[test]
fn replace_unknown_id_returns_false() {
    let mut state = ChannelState::new();
    assert!(!state.replace(&asset(1.0, 1.0, 1.0, 1.0)));
    assert!(state.is_empty());
}

#[test]
fn remove_returns_entry_once() {
    let a = asset(1.0, 1.0, 10.0, 10.0);
    let mut state: ChannelState = std::iter::once(a.clone()).collect();
    assert_eq!(state.remove(a.id()), Some(a.clone()));
    assert_eq!(state.remove(a.id()), None);
}

#[test]
fn load_snapshot_drops_previous_entries() {
    let old = asset(1.0, 1.0, 10.0, 10.0);
    let new = asset(2.0, 2.0, 10.0, 10.0);
    let mut state: ChannelState = std::iter::once(old.clone()).collect();
    state.load_snapshot(vec![new.clone()]);
    assert!(!state.contains(old.id()));
    assert!(state.contains(new.id()));
    assert_eq!(state.len(), 1);
}

#[test]
fn load_snapshot_deduplicates_ids() {
    let a = asset(1.0, 1.0, 10.0, 10.0);
    let mut later = a.clone();
    later.move_to(9.0, 9.0);
    let state: ChannelState = vec![a.clone(), later.clone()].into_iter().collect();
    assert_eq!(state.len(), 1);
    assert_eq!(state.get(a.id()), Some(&later));
}

#[test]
fn equality_ignores_order() {
    let a = asset(1.0, 1.0, 10.0, 10.0);
    let b = asset(2.0, 2.0, 10.0, 10.0);
    let ab: ChannelState = vec![a.clone(), b.clone()].into_iter().collect();
    let ba: ChannelState = vec![b.clone(), a.clone()].into_iter().collect();
    assert_eq!(ab, ba);
}

#[test]
fn equality_compares_fields() {
    let a = asset(1.0, 1.0, 10.0, 10.0);
    let mut moved = a.clone();
    moved.move_to(3.0, 3.0);
    let left: ChannelState = std::iter::once(a).collect();
    let right: ChannelState = std::iter::once(moved).collect();
    assert_ne!(left, right);
}

#[test]
fn hit_test_prefers_later_insertions() {
    let canvas = CanvasSize::new(1000.0, 500.0);
    let a = asset(10.0, 10.0, 20.0, 20.0);
    let b = asset(15.0, 15.0, 20.0, 20.0);
    let state: ChannelState = vec![a.clone(), b.clone()].into_iter().collect();

    // (200, 100) px = (20%, 20%) is inside both boxes.
    assert_eq!(state.hit_test(canvas, 200.0, 100.0), Some(b.id()));
    // (110, 55) px = (11%, 11%) is only inside A.
    assert_eq!(state.hit_test(canvas, 110.0, 55.0), Some(a.id()));
    assert_eq!(state.hit_test(canvas, 900.0, 450.0), None);
}
