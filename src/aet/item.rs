//! Video and audio items owned by a scene.

use serde::Serialize;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// On-disk form: three channel bytes plus one padding byte.
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0]
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

/// One image of a video item: a still or a frame of a sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VideoSource {
    pub name: String,
    /// Stable numeric ID, resolved against a sprite database by callers.
    pub id: u32,
}

impl VideoSource {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self { name: name.into(), id }
    }
}

/// Image or image sequence played by video layers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Video {
    /// Fill color for placeholder and solid items.
    pub color: Rgb8,
    pub width: u16,
    pub height: u16,
    /// Sequence playback rate: source files advanced per scene frame.
    pub files_per_frame: f32,
    pub sources: Vec<VideoSource>,
}

impl Default for Video {
    fn default() -> Self {
        Self {
            color: Rgb8::WHITE,
            width: 0,
            height: 0,
            files_per_frame: 1.0,
            sources: Vec::new(),
        }
    }
}

impl Video {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height, ..Self::default() }
    }

    /// Builder-style source append.
    pub fn with_source(mut self, name: impl Into<String>, id: u32) -> Self {
        self.sources.push(VideoSource::new(name, id));
        self
    }

    /// A video without sources is a solid color.
    #[inline]
    pub fn is_solid(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_by_id(&self, id: u32) -> Option<&VideoSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn source_by_name(&self, name: &str) -> Option<&VideoSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Source shown at a layer-local frame, wrapping around the sequence.
    pub fn source_at(&self, local_frame: f32) -> Option<&VideoSource> {
        if self.sources.is_empty() {
            return None;
        }
        let index = (local_frame * self.files_per_frame).floor().max(0.0) as usize;
        self.sources.get(index % self.sources.len())
    }
}

/// Sound played by audio layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Audio {
    /// ID resolved against a sound database by callers.
    pub sound_id: u32,
}

impl Audio {
    pub const fn new(sound_id: u32) -> Self {
        Self { sound_id }
    }
}
