//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use aetset::aet::{
    AetSet, Audio, BlendMode, Camera, Composition, CompositionId, Layer, LayerAudio, LayerFlags, LayerId, LayerItem,
    LayerQuality, LayerVideo, LayerVideo3D, Marker, Rgb8, Scene, TrackMatte, TransferMode, Video, VideoSource,
};
use aetset::anim::{FCurve, KeyFrame};

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

pub fn u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

pub fn put_u32_le(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn curve(points: &[(f32, f32, f32)]) -> Option<FCurve> {
    FCurve::new(points.iter().map(|&(f, v, t)| KeyFrame::new(f, v, t)).collect())
}

/// Two scenes covering every record kind: nested compositions, every item
/// kind, parents across compositions, markers, 3-D channels, a camera and
/// single-key curves.
pub fn sample_set() -> AetSet {
    let mut scene = Scene::new("title_scene");
    scene.start_frame = 0.0;
    scene.end_frame = 120.0;
    scene.frame_rate = 60.0;
    scene.background_color = Rgb8::new(10, 20, 30);
    scene.width = 1280;
    scene.height = 720;
    scene.camera = Some(Camera {
        eye_z: curve(&[(0.0, -500.0, 0.0), (60.0, -400.0, 1.5)]),
        zoom: Some(FCurve::constant(1.5)),
        ..Camera::default()
    });

    let backdrop = scene.add_video(Video::new(1280, 720).with_source("title_bg", 1));
    let sparks = scene.add_video(Video {
        color: Rgb8::new(255, 0, 0),
        width: 64,
        height: 64,
        files_per_frame: 0.5,
        sources: vec![VideoSource::new("spark_000", 10), VideoSource::new("spark_001", 11)],
    });
    let solid = scene.add_video(Video::new(16, 16));
    let chime = scene.add_audio(Audio::new(42));

    let mut spark = Layer::new("spark", 0.0, 30.0);
    spark.item = LayerItem::Video(sparks);
    spark.video = Some(LayerVideo {
        opacity: curve(&[(0.0, 0.0, 0.1), (15.0, 1.0, 0.0), (30.0, 0.0, -0.05)]),
        scale_x: Some(FCurve::constant(2.0)),
        ..LayerVideo::default()
    });
    let mut trail = Layer::new("trail", 5.0, 25.0);
    trail.item = LayerItem::Video(sparks);
    trail.parent = Some(LayerId::new(CompositionId::Index(0), 0));
    let effect_comp = scene.add_composition(Composition::new(vec![spark, trail]));

    let mut unused_solid = Layer::new("filler", 0.0, 1.0);
    unused_solid.item = LayerItem::Video(solid);
    scene.add_composition(Composition::new(vec![unused_solid]));

    let mut background = Layer::new("background", 0.0, 120.0);
    background.item = LayerItem::Video(backdrop);
    background.flags = LayerFlags::default().with(LayerFlags::VIDEO_ACTIVE).with(LayerFlags::LOCKED);
    background.quality = LayerQuality::Best;
    background.video = Some(LayerVideo {
        transfer_mode: TransferMode {
            blend_mode: BlendMode::Screen,
            flags: TransferMode::PRESERVE_ALPHA,
            track_matte: TrackMatte::Luma,
        },
        position_x: curve(&[(0.0, 0.0, 0.0), (120.0, 640.0, 5.0)]),
        position_y: Some(FCurve::constant(360.0)),
        rotation: curve(&[(0.0, 0.0, 0.0), (60.0, 90.0, 0.0)]),
        ..LayerVideo::default()
    });

    let mut effect = Layer::new("effect", 10.0, 70.0);
    effect.item = LayerItem::Composition(effect_comp);
    effect.parent = Some(LayerId::root(0));
    effect.start_offset = 2.0;
    effect.time_scale = 0.5;
    effect.flags = LayerFlags::default().with(LayerFlags::VIDEO_ACTIVE).with(LayerFlags::LAYER_IS_3D);
    effect.markers = vec![Marker::new(10.0, "effect_in"), Marker::new(60.0, "effect_out")];
    effect.video = Some(LayerVideo {
        anchor_x: Some(FCurve::constant(32.0)),
        video_3d: Some(Box::new(LayerVideo3D {
            position_z: curve(&[(10.0, -100.0, 0.0), (70.0, 0.0, 0.0)]),
            rotation_x: Some(FCurve::constant(15.0)),
            ..LayerVideo3D::default()
        })),
        ..LayerVideo::default()
    });

    let mut sound = Layer::new("sound", 0.0, 120.0);
    sound.item = LayerItem::Audio(chime);
    sound.flags = LayerFlags::default().with(LayerFlags::AUDIO_ACTIVE);
    sound.audio = Some(LayerAudio {
        volume_l: Some(FCurve::constant(0.8)),
        volume_r: curve(&[(0.0, 0.0, 0.0), (10.0, 0.8, 0.0)]),
        ..LayerAudio::default()
    });

    let mut placeholder = Layer::new("placeholder", 0.0, 1.0);
    placeholder.quality = LayerQuality::Draft;

    scene.root_composition.layers = vec![background, effect, sound, placeholder];
    scene.compositions[0].given_name = "effect".to_string();

    let mut second = Scene::new("loading_scene");
    second.end_frame = 60.0;
    second.frame_rate = 30.0;
    second.root_composition.layers.push(Layer::new("spinner", 0.0, 60.0));

    AetSet { scenes: vec![scene, second] }
}
