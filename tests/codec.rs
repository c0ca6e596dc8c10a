//! Encode/decode round trips and malformed-input handling.

mod common;

use aetset::aet::{
    AetSet, BlendMode, Composition, CompositionId, ContainerInfo, Layer, LayerId, LayerItem, LayerQuality, LayerVideo,
    Layout, ReadOptions, Scene, TrackMatte, TransferMode, Video, WriteOptions,
};
use aetset::anim::{FCurve, KeyFrame};
use aetset::{Endianness, Error, PtrWidth};

use common::*;

fn round_trip(set: &AetSet, options: &WriteOptions) -> (AetSet, ContainerInfo) {
    let bytes = set.to_bytes(options).unwrap();
    AetSet::read_with_info(std::io::Cursor::new(&bytes[..]), &ReadOptions::default()).unwrap()
}

/// Absolute position of the first scene record in a legacy stream.
fn legacy_scene_start(bytes: &[u8]) -> usize {
    u32_le(bytes, 0) as usize
}

#[test]
fn test_round_trip_legacy() {
    let set = sample_set();
    let (decoded, info) = round_trip(&set, &WriteOptions::legacy());
    assert_eq!(info.layout, Layout::Legacy);
    assert_eq!(info.pointer_width, PtrWidth::Bits32);
    assert_eq!(decoded, set);
}

#[test]
fn test_round_trip_modern_32() {
    let set = sample_set();
    let (decoded, info) = round_trip(&set, &WriteOptions::modern(PtrWidth::Bits32));
    assert_eq!(info.layout, Layout::Modern);
    assert_eq!(info.pointer_width, PtrWidth::Bits32);
    assert_eq!(info.endianness, Endianness::Little);
    assert_eq!(decoded, set);
}

#[test]
fn test_round_trip_modern_64() {
    let set = sample_set();
    let (decoded, info) = round_trip(&set, &WriteOptions::modern(PtrWidth::Bits64));
    assert_eq!(info.pointer_width, PtrWidth::Bits64);
    assert_eq!(decoded, set);
}

#[test]
fn test_round_trip_big_endian() {
    let set = sample_set();
    for width in [PtrWidth::Bits32, PtrWidth::Bits64] {
        let options = WriteOptions::modern(width).with_endianness(Endianness::Big);
        let (decoded, info) = round_trip(&set, &options);
        assert_eq!(info.endianness, Endianness::Big);
        assert_eq!(info.pointer_width, width);
        assert_eq!(decoded, set);
    }
}

#[test]
fn test_round_trip_without_string_pooling() {
    let set = sample_set();
    for options in [
        WriteOptions::legacy().with_string_pooling(false),
        WriteOptions::modern(PtrWidth::Bits64).with_string_pooling(false),
    ] {
        let (decoded, _) = round_trip(&set, &options);
        assert_eq!(decoded, set);
    }
}

#[test]
fn test_pointer_widths_differ_only_in_layout() {
    let set = sample_set();
    let narrow = set.to_bytes(&WriteOptions::modern(PtrWidth::Bits32)).unwrap();
    let wide = set.to_bytes(&WriteOptions::modern(PtrWidth::Bits64)).unwrap();
    assert!(wide.len() > narrow.len());

    let a = AetSet::from_bytes(&narrow, &ReadOptions::default()).unwrap();
    let b = AetSet::from_bytes(&wide, &ReadOptions::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_forced_pointer_width() {
    let set = sample_set();
    let bytes = set.to_bytes(&WriteOptions::modern(PtrWidth::Bits64)).unwrap();
    let options = ReadOptions::with_pointer_width(PtrWidth::Bits64);
    assert_eq!(AetSet::from_bytes(&bytes, &options).unwrap(), set);

    // Reading 64-bit pointers as 32-bit halves lands on garbage.
    let wrong = ReadOptions::with_pointer_width(PtrWidth::Bits32);
    match AetSet::from_bytes(&bytes, &wrong) {
        Ok(decoded) => assert_ne!(decoded, set),
        Err(err) => assert!(err.is_malformed(), "unexpected error {err}"),
    }
}

#[test]
fn test_links_survive_round_trip() {
    let set = sample_set();
    let (decoded, _) = round_trip(&set, &WriteOptions::modern(PtrWidth::Bits64));
    let scene = &decoded.scenes[0];

    let effect = scene.layer_by_name("effect").unwrap();
    assert_eq!(effect, LayerId::root(1));
    let layer = scene.layer(effect).unwrap();
    assert_eq!(layer.item, LayerItem::Composition(CompositionId::Index(0)));
    assert_eq!(layer.parent, Some(LayerId::root(0)));

    let trail = scene.layer(scene.layer_by_name("trail").unwrap()).unwrap();
    assert_eq!(trail.parent, Some(LayerId::new(CompositionId::Index(0), 0)));
    assert_eq!(trail.item, LayerItem::Video(1));

    assert_eq!(scene.parent_chain(effect), vec![LayerId::root(0)]);
    assert_eq!(scene.compositions[0].given_name, "effect");
    assert_eq!(scene.compositions[1].given_name, "");
    assert_eq!(scene.root_composition.given_name, "");
}

#[test]
fn test_string_pooling_single_copy() {
    let mut scene = Scene::new("pool_scene");
    scene.root_composition.layers = vec![
        Layer::new("shared_layer_name", 0.0, 10.0),
        Layer::new("shared_layer_name", 10.0, 20.0),
    ];
    let set = AetSet { scenes: vec![scene] };

    let pooled = set.to_bytes(&WriteOptions::legacy()).unwrap();
    assert_eq!(count_occurrences(&pooled, b"shared_layer_name\0"), 1);
    let decoded = AetSet::from_bytes(&pooled, &ReadOptions::default()).unwrap();
    for layer in &decoded.scenes[0].root_composition.layers {
        assert_eq!(layer.name, "shared_layer_name");
    }

    let unpooled = set.to_bytes(&WriteOptions::legacy().with_string_pooling(false)).unwrap();
    assert_eq!(count_occurrences(&unpooled, b"shared_layer_name\0"), 2);
    assert_eq!(AetSet::from_bytes(&unpooled, &ReadOptions::default()).unwrap(), decoded);
}

fn set_with_opacity(opacity: Option<FCurve>) -> AetSet {
    let mut scene = Scene::new("curve_scene");
    let mut layer = Layer::new("fade", 0.0, 10.0);
    layer.video = Some(LayerVideo { opacity, ..LayerVideo::default() });
    scene.root_composition.layers.push(layer);
    AetSet { scenes: vec![scene] }
}

#[test]
fn test_single_key_curve_stores_value_only() {
    let single = FCurve::new(vec![KeyFrame::new(7.0, 3.0, 0.0)]).unwrap();
    let pair = FCurve::new(vec![KeyFrame::new(0.0, 0.0, 0.0), KeyFrame::new(10.0, 1.0, 0.0)]).unwrap();

    let base = set_with_opacity(None).to_bytes(&WriteOptions::legacy()).unwrap();
    let with_single = set_with_opacity(Some(single.clone())).to_bytes(&WriteOptions::legacy()).unwrap();
    let with_pair = set_with_opacity(Some(pair)).to_bytes(&WriteOptions::legacy()).unwrap();

    // One f32 for the constant; two frames plus two (value, tangent) pairs.
    assert_eq!(with_single.len() - base.len(), 4);
    assert_eq!(with_pair.len() - base.len(), 24);

    let decoded = AetSet::from_bytes(&with_single, &ReadOptions::default()).unwrap();
    let layer = &decoded.scenes[0].root_composition.layers[0];
    let opacity = layer.video.as_ref().unwrap().opacity.as_ref().unwrap();
    assert_eq!(opacity.len(), 1);
    assert_eq!(opacity, &single);
    for frame in [-10.0, 0.0, 7.0, 100.0] {
        assert_eq!(opacity.sample(frame), 3.0);
    }
}

#[test]
fn test_sampled_values_survive_round_trip() {
    let set = sample_set();
    let (decoded, _) = round_trip(&set, &WriteOptions::modern(PtrWidth::Bits32));
    let before = &set.scenes[0].root_composition.layers[0];
    let after = &decoded.scenes[0].root_composition.layers[0];
    for frame in [0.0, 17.5, 60.0, 119.0] {
        let a = before.sample_video(frame).unwrap();
        let b = after.sample_video(frame).unwrap();
        assert_eq!(a, b);
    }
    let t = after.sample_video(120.0).unwrap();
    assert!(approx_eq(t.position.x, 640.0));
    assert!(approx_eq(t.position.y, 360.0));
}

#[test]
fn test_root_composition_written_last() {
    let mut scene = Scene::new("comp_scene");
    scene.add_composition(Composition::new(vec![Layer::new("first_sub", 0.0, 1.0)]));
    scene.add_composition(Composition::new(vec![Layer::new("second_sub", 0.0, 1.0)]));
    scene.root_composition.layers.push(Layer::new("root_layer", 0.0, 1.0));
    let set = AetSet { scenes: vec![scene] };

    let bytes = set.to_bytes(&WriteOptions::legacy()).unwrap();
    let scene_at = legacy_scene_start(&bytes);
    assert_eq!(u32_le(&bytes, scene_at + 32), 3);

    let decoded = AetSet::from_bytes(&bytes, &ReadOptions::default()).unwrap();
    let scene = &decoded.scenes[0];
    assert_eq!(scene.compositions.len(), 2);
    assert_eq!(scene.compositions[0].layers[0].name, "first_sub");
    assert_eq!(scene.compositions[1].layers[0].name, "second_sub");
    assert_eq!(scene.root_composition.layers[0].name, "root_layer");
}

#[test]
fn test_composition_pointer_past_end() {
    let set = AetSet { scenes: vec![Scene::new("broken")] };
    let mut bytes = set.to_bytes(&WriteOptions::legacy()).unwrap();
    let scene_at = legacy_scene_start(&bytes);
    let past_end = bytes.len() as u32 + 0x100;
    put_u32_le(&mut bytes, scene_at + 36, past_end);

    let err = AetSet::from_bytes(&bytes, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::BadPointer { what: "compositions", .. }), "{err}");
}

#[test]
fn test_non_finite_key_frame_rejected() {
    let curve = FCurve::new(vec![KeyFrame::new(1234.5, 0.0, 0.0), KeyFrame::new(2000.0, 1.0, 0.0)]);
    let mut bytes = set_with_opacity(curve).to_bytes(&WriteOptions::legacy()).unwrap();
    let needle = 1234.5f32.to_le_bytes();
    assert_eq!(count_occurrences(&bytes, &needle), 1);
    let at = bytes.windows(4).position(|w| w == &needle[..]).unwrap();
    bytes[at..at + 4].copy_from_slice(&(-f32::NAN).to_le_bytes());

    assert!(matches!(
        AetSet::from_bytes(&bytes, &ReadOptions::default()),
        Err(Error::BadFormat(_))
    ));
}

#[test]
fn test_repeated_scene_pointer_rejected() {
    let mut bytes = sample_set().to_bytes(&WriteOptions::legacy()).unwrap();
    let first = u32_le(&bytes, 0);
    put_u32_le(&mut bytes, 4, first);
    assert!(matches!(
        AetSet::from_bytes(&bytes, &ReadOptions::default()),
        Err(Error::BadFormat(_))
    ));
}

#[test]
fn test_other_codes_round_trip_as_named() {
    let mut scene = Scene::new("codes");
    let mut layer = Layer::new("coded", 0.0, 1.0);
    layer.quality = LayerQuality::Other(2);
    layer.video = Some(LayerVideo {
        transfer_mode: TransferMode {
            blend_mode: BlendMode::Other(3),
            flags: 0,
            track_matte: TrackMatte::Other(1),
        },
        ..LayerVideo::default()
    });
    scene.root_composition.layers.push(layer);
    let set = AetSet { scenes: vec![scene] };

    let (decoded, _) = round_trip(&set, &WriteOptions::legacy());
    assert_eq!(decoded, set);
    let layer = &decoded.scenes[0].root_composition.layers[0];
    assert!(matches!(layer.quality, LayerQuality::Draft));
    let mode = layer.video.as_ref().unwrap().transfer_mode;
    assert!(matches!(mode.blend_mode, BlendMode::Normal));
    assert!(matches!(mode.track_matte, TrackMatte::Alpha));
}

#[test]
fn test_oversized_count_rejected() {
    let set = sample_set();
    let mut bytes = set.to_bytes(&WriteOptions::legacy()).unwrap();
    let scene_at = legacy_scene_start(&bytes);
    put_u32_le(&mut bytes, scene_at + 32, 0x1000_0000);

    let err = AetSet::from_bytes(&bytes, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::BadCount { what: "compositions", .. }), "{err}");
}

#[test]
fn test_zero_compositions_rejected() {
    let set = AetSet { scenes: vec![Scene::new("rootless")] };
    let mut bytes = set.to_bytes(&WriteOptions::legacy()).unwrap();
    let scene_at = legacy_scene_start(&bytes);
    put_u32_le(&mut bytes, scene_at + 32, 0);
    assert!(matches!(
        AetSet::from_bytes(&bytes, &ReadOptions::default()),
        Err(Error::BadCount { .. })
    ));
}

#[test]
fn test_truncated_input_rejected() {
    let bytes = sample_set().to_bytes(&WriteOptions::legacy()).unwrap();
    for len in [0, 3, 16, bytes.len() / 2, bytes.len() - 1] {
        let err = AetSet::from_bytes(&bytes[..len], &ReadOptions::default()).unwrap_err();
        assert!(err.is_malformed(), "len {len}: {err}");
    }
}

#[test]
fn test_unknown_section_signature() {
    let set = sample_set();
    let mut bytes = set.to_bytes(&WriteOptions::modern(PtrWidth::Bits32)).unwrap();
    bytes[0..4].copy_from_slice(b"AETX");
    assert!(matches!(
        AetSet::from_bytes(&bytes, &ReadOptions::default()),
        Err(Error::BadFormat(_))
    ));
}

#[test]
fn test_legacy_rejects_wide_pointers() {
    let set = sample_set();
    let mut options = WriteOptions::legacy();
    options.pointer_width = PtrWidth::Bits64;
    assert!(matches!(set.to_bytes(&options), Err(Error::BadFormat(_))));
    let options = WriteOptions::legacy().with_endianness(Endianness::Big);
    assert!(matches!(set.to_bytes(&options), Err(Error::BadFormat(_))));
}

#[test]
fn test_dangling_reference_rejected_on_write() {
    let mut scene = Scene::new("dangling");
    scene.add_video(Video::new(8, 8));
    let mut layer = Layer::new("ghost", 0.0, 1.0);
    layer.item = LayerItem::Video(3);
    scene.root_composition.layers.push(layer);
    let set = AetSet { scenes: vec![scene] };
    assert!(matches!(set.to_bytes(&WriteOptions::legacy()), Err(Error::BadFormat(_))));
}

#[test]
fn test_empty_set() {
    let set = AetSet::new();
    let legacy = set.to_bytes(&WriteOptions::legacy()).unwrap();
    assert_eq!(legacy, vec![0, 0, 0, 0]);
    assert_eq!(AetSet::from_bytes(&legacy, &ReadOptions::default()).unwrap(), set);

    let (decoded, info) = round_trip(&set, &WriteOptions::modern(PtrWidth::Bits64));
    assert_eq!(decoded, set);
    assert_eq!(info.relocation_count(), Some(0));
}

#[test]
fn test_scene_by_name() {
    let set = sample_set();
    assert_eq!(set.scene_by_name("loading_scene").unwrap().frame_rate, 30.0);
    assert!(set.scene_by_name("missing").is_none());
}
