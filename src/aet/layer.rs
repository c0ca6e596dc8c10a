//! Layers and their per-channel animation data.

use std::hash::{Hash, Hasher};

use glam::{Vec2, Vec3};
use serde::Serialize;

use super::CompositionId;
use crate::anim::{sample_or, AudioMix, FCurve, VideoTransform};

/// Layer behaviour flags (u16 on disk).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LayerFlags(u16);

impl LayerFlags {
    pub const VIDEO_ACTIVE: u16 = 1 << 0;
    pub const AUDIO_ACTIVE: u16 = 1 << 1;
    pub const EFFECTS_ACTIVE: u16 = 1 << 2;
    pub const MOTION_BLUR: u16 = 1 << 3;
    pub const FRAME_BLENDING: u16 = 1 << 4;
    pub const LOCKED: u16 = 1 << 5;
    pub const SHY: u16 = 1 << 6;
    pub const COLLAPSE: u16 = 1 << 7;
    pub const AUTO_ORIENT_ROTATION: u16 = 1 << 8;
    pub const ADJUSTMENT_LAYER: u16 = 1 << 9;
    pub const TIME_REMAPPING: u16 = 1 << 10;
    pub const LAYER_IS_3D: u16 = 1 << 11;
    pub const LOOK_AT_CAMERA: u16 = 1 << 12;
    pub const LOOK_AT_POINT_OF_INTEREST: u16 = 1 << 13;
    pub const SOLO: u16 = 1 << 14;
    pub const MARKERS_LOCKED: u16 = 1 << 15;

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    #[inline]
    pub fn set(&mut self, flag: u16, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[inline]
    pub fn with(mut self, flag: u16) -> Self {
        self.set(flag, true);
        self
    }

    pub fn video_active(self) -> bool {
        self.contains(Self::VIDEO_ACTIVE)
    }

    pub fn audio_active(self) -> bool {
        self.contains(Self::AUDIO_ACTIVE)
    }

    pub fn is_3d(self) -> bool {
        self.contains(Self::LAYER_IS_3D)
    }

    pub fn is_locked(self) -> bool {
        self.contains(Self::LOCKED)
    }

    pub fn is_shy(self) -> bool {
        self.contains(Self::SHY)
    }

    pub fn is_solo(self) -> bool {
        self.contains(Self::SOLO)
    }
}

/// Render quality hint.
///
/// `Other` only carries codes without a named variant; values compare by
/// their code, so `Other` of a named code equals that variant.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub enum LayerQuality {
    #[default]
    None,
    Wireframe,
    Draft,
    Best,
    /// Value not known to this crate, kept verbatim.
    Other(u8),
}

impl LayerQuality {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Wireframe,
            2 => Self::Draft,
            3 => Self::Best,
            v => Self::Other(v),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Wireframe => 1,
            Self::Draft => 2,
            Self::Best => 3,
            Self::Other(v) => v,
        }
    }
}

/// Kind of item a layer plays (u8 on disk).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ItemType {
    #[default]
    None,
    Video,
    Audio,
    Composition,
}

impl ItemType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Video),
            2 => Some(Self::Audio),
            3 => Some(Self::Composition),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Video => 1,
            Self::Audio => 2,
            Self::Composition => 3,
        }
    }
}

/// Item bound to a layer, as an index into the owning scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum LayerItem {
    #[default]
    None,
    Video(usize),
    Audio(usize),
    Composition(CompositionId),
}

impl LayerItem {
    pub fn item_type(self) -> ItemType {
        match self {
            Self::None => ItemType::None,
            Self::Video(_) => ItemType::Video,
            Self::Audio(_) => ItemType::Audio,
            Self::Composition(_) => ItemType::Composition,
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Named point in a layer's time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Marker {
    pub frame: f32,
    pub name: String,
}

impl Marker {
    pub fn new(frame: f32, name: impl Into<String>) -> Self {
        Self { frame, name: name.into() }
    }
}

/// Compositing blend mode (u8 on disk).
///
/// `Other` only carries codes without a named variant; values compare by
/// their code, so `Other` of a named code equals that variant.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub enum BlendMode {
    Copy,
    Behind,
    #[default]
    Normal,
    Dissolve,
    Add,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    Darken,
    Lighten,
    ClassicDifference,
    Hue,
    Saturation,
    Color,
    Luminosity,
    StencilAlpha,
    StencilLuma,
    SilhouetteAlpha,
    SilhouetteLuma,
    LuminescentPremul,
    AlphaAdd,
    ClassicColorDodge,
    ClassicColorBurn,
    Exclusion,
    Difference,
    ColorDodge,
    ColorBurn,
    LinearDodge,
    LinearBurn,
    LinearLight,
    VividLight,
    PinLight,
    HardMix,
    LighterColor,
    DarkerColor,
    Subtract,
    Divide,
    /// Value not known to this crate, kept verbatim.
    Other(u8),
}

impl BlendMode {
    const KNOWN: [BlendMode; 39] = [
        Self::Copy,
        Self::Behind,
        Self::Normal,
        Self::Dissolve,
        Self::Add,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::SoftLight,
        Self::HardLight,
        Self::Darken,
        Self::Lighten,
        Self::ClassicDifference,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
        Self::StencilAlpha,
        Self::StencilLuma,
        Self::SilhouetteAlpha,
        Self::SilhouetteLuma,
        Self::LuminescentPremul,
        Self::AlphaAdd,
        Self::ClassicColorDodge,
        Self::ClassicColorBurn,
        Self::Exclusion,
        Self::Difference,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::LinearDodge,
        Self::LinearBurn,
        Self::LinearLight,
        Self::VividLight,
        Self::PinLight,
        Self::HardMix,
        Self::LighterColor,
        Self::DarkerColor,
        Self::Subtract,
        Self::Divide,
    ];

    /// Known modes start at 1; zero and anything past the table are kept
    /// as [`BlendMode::Other`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            1..=39 => Self::KNOWN[value as usize - 1],
            v => Self::Other(v),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Other(v) => v,
            mode => Self::KNOWN
                .iter()
                .position(|m| std::mem::discriminant(m) == std::mem::discriminant(&mode))
                .map_or(0, |i| i as u8 + 1),
        }
    }
}

/// Track matte source (u8 on disk).
///
/// `Other` only carries codes without a named variant; values compare by
/// their code, so `Other` of a named code equals that variant.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub enum TrackMatte {
    #[default]
    NoTrackMatte,
    Alpha,
    NotAlpha,
    Luma,
    NotLuma,
    Other(u8),
}

impl TrackMatte {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoTrackMatte,
            1 => Self::Alpha,
            2 => Self::NotAlpha,
            3 => Self::Luma,
            4 => Self::NotLuma,
            v => Self::Other(v),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoTrackMatte => 0,
            Self::Alpha => 1,
            Self::NotAlpha => 2,
            Self::Luma => 3,
            Self::NotLuma => 4,
            Self::Other(v) => v,
        }
    }
}

/// Equality and hashing by on-disk code.
macro_rules! impl_code_eq {
    ($($ty:ty),*) => {$(
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.to_u8() == other.to_u8()
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.to_u8().hash(state);
            }
        }
    )*};
}

impl_code_eq!(LayerQuality, BlendMode, TrackMatte);

/// How a video layer composites onto the layers below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TransferMode {
    pub blend_mode: BlendMode,
    /// Bit 0: preserve alpha. Bit 1: randomize dissolve.
    pub flags: u8,
    pub track_matte: TrackMatte,
}

impl TransferMode {
    pub const PRESERVE_ALPHA: u8 = 1 << 0;
    pub const RANDOMIZE_DISSOLVE: u8 = 1 << 1;

    pub fn preserve_alpha(&self) -> bool {
        self.flags & Self::PRESERVE_ALPHA != 0
    }

    pub fn randomize_dissolve(&self) -> bool {
        self.flags & Self::RANDOMIZE_DISSOLVE != 0
    }
}

/// 2-D transform channels of a video layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LayerVideo {
    pub transfer_mode: TransferMode,
    pub anchor_x: Option<FCurve>,
    pub anchor_y: Option<FCurve>,
    pub position_x: Option<FCurve>,
    pub position_y: Option<FCurve>,
    pub rotation: Option<FCurve>,
    pub scale_x: Option<FCurve>,
    pub scale_y: Option<FCurve>,
    pub opacity: Option<FCurve>,
    /// Extra channels for 3-D layers.
    pub video_3d: Option<Box<LayerVideo3D>>,
}

/// Additional channels of a 3-D video layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LayerVideo3D {
    pub anchor_z: Option<FCurve>,
    pub position_z: Option<FCurve>,
    pub direction_x: Option<FCurve>,
    pub direction_y: Option<FCurve>,
    pub direction_z: Option<FCurve>,
    pub rotation_x: Option<FCurve>,
    pub rotation_y: Option<FCurve>,
    pub scale_z: Option<FCurve>,
}

impl LayerVideo {
    /// The 2-D channels in on-disk order.
    pub fn channels(&self) -> [&Option<FCurve>; 8] {
        [
            &self.anchor_x,
            &self.anchor_y,
            &self.position_x,
            &self.position_y,
            &self.rotation,
            &self.scale_x,
            &self.scale_y,
            &self.opacity,
        ]
    }

    pub fn channels_mut(&mut self) -> [&mut Option<FCurve>; 8] {
        [
            &mut self.anchor_x,
            &mut self.anchor_y,
            &mut self.position_x,
            &mut self.position_y,
            &mut self.rotation,
            &mut self.scale_x,
            &mut self.scale_y,
            &mut self.opacity,
        ]
    }

    /// Sample every channel at `frame`. Absent channels stay neutral.
    pub fn sample(&self, frame: f32) -> VideoTransform {
        let s = |c: &Option<FCurve>, default| sample_or(c.as_ref(), frame, default);
        let mut t = VideoTransform {
            anchor: Vec3::new(s(&self.anchor_x, 0.0), s(&self.anchor_y, 0.0), 0.0),
            position: Vec3::new(s(&self.position_x, 0.0), s(&self.position_y, 0.0), 0.0),
            rotation: Vec3::new(0.0, 0.0, s(&self.rotation, 0.0)),
            scale: Vec3::new(s(&self.scale_x, 1.0), s(&self.scale_y, 1.0), 1.0),
            direction: Vec3::ZERO,
            opacity: s(&self.opacity, 1.0),
        };
        if let Some(v3) = &self.video_3d {
            t.anchor.z = s(&v3.anchor_z, 0.0);
            t.position.z = s(&v3.position_z, 0.0);
            t.direction = Vec3::new(s(&v3.direction_x, 0.0), s(&v3.direction_y, 0.0), s(&v3.direction_z, 0.0));
            t.rotation.x = s(&v3.rotation_x, 0.0);
            t.rotation.y = s(&v3.rotation_y, 0.0);
            t.scale.z = s(&v3.scale_z, 1.0);
        }
        t
    }
}

impl LayerVideo3D {
    /// The channels in on-disk order.
    pub fn channels(&self) -> [&Option<FCurve>; 8] {
        [
            &self.anchor_z,
            &self.position_z,
            &self.direction_x,
            &self.direction_y,
            &self.direction_z,
            &self.rotation_x,
            &self.rotation_y,
            &self.scale_z,
        ]
    }

    pub fn channels_mut(&mut self) -> [&mut Option<FCurve>; 8] {
        [
            &mut self.anchor_z,
            &mut self.position_z,
            &mut self.direction_x,
            &mut self.direction_y,
            &mut self.direction_z,
            &mut self.rotation_x,
            &mut self.rotation_y,
            &mut self.scale_z,
        ]
    }
}

/// Audio channels of a layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LayerAudio {
    pub volume_l: Option<FCurve>,
    pub volume_r: Option<FCurve>,
    pub pan_l: Option<FCurve>,
    pub pan_r: Option<FCurve>,
}

impl LayerAudio {
    /// The channels in on-disk order.
    pub fn channels(&self) -> [&Option<FCurve>; 4] {
        [&self.volume_l, &self.volume_r, &self.pan_l, &self.pan_r]
    }

    pub fn channels_mut(&mut self) -> [&mut Option<FCurve>; 4] {
        [&mut self.volume_l, &mut self.volume_r, &mut self.pan_l, &mut self.pan_r]
    }

    pub fn sample(&self, frame: f32) -> AudioMix {
        let s = |c: &Option<FCurve>, default| sample_or(c.as_ref(), frame, default);
        AudioMix {
            volume: Vec2::new(s(&self.volume_l, 1.0), s(&self.volume_r, 1.0)),
            pan: Vec2::new(s(&self.pan_l, 0.0), s(&self.pan_r, 0.0)),
        }
    }
}

/// A timed instance of an item inside a composition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layer {
    pub name: String,
    /// First frame the layer is visible (inclusive).
    pub start_frame: f32,
    /// Frame the layer stops being visible (exclusive).
    pub end_frame: f32,
    /// Item frame shown at `start_frame`.
    pub start_offset: f32,
    /// Item frames advanced per scene frame.
    pub time_scale: f32,
    pub flags: LayerFlags,
    pub quality: LayerQuality,
    pub item: LayerItem,
    /// Parent for transform inheritance, in the same scene.
    pub parent: Option<super::LayerId>,
    pub markers: Vec<Marker>,
    pub video: Option<LayerVideo>,
    pub audio: Option<LayerAudio>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            name: String::new(),
            start_frame: 0.0,
            end_frame: 0.0,
            start_offset: 0.0,
            time_scale: 1.0,
            flags: LayerFlags::default(),
            quality: LayerQuality::default(),
            item: LayerItem::None,
            parent: None,
            markers: Vec::new(),
            video: None,
            audio: None,
        }
    }
}

impl Layer {
    pub fn new(name: impl Into<String>, start_frame: f32, end_frame: f32) -> Self {
        Self {
            name: name.into(),
            start_frame,
            end_frame,
            ..Self::default()
        }
    }

    /// True while `start_frame <= frame < end_frame`.
    #[inline]
    pub fn is_active_at(&self, frame: f32) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }

    /// Map a frame of the containing composition into the item's time.
    #[inline]
    pub fn local_frame(&self, frame: f32) -> f32 {
        (frame - self.start_frame) * self.time_scale + self.start_offset
    }

    /// Sample the video channels at a composition frame, if present.
    pub fn sample_video(&self, frame: f32) -> Option<VideoTransform> {
        self.video.as_ref().map(|v| v.sample(frame))
    }

    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.name == name)
    }
}
