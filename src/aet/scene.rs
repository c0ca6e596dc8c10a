//! Scenes, compositions and cameras.

use glam::{Affine3A, Vec3};
use serde::Serialize;

use super::{Audio, Layer, LayerItem, Rgb8, Video};
use crate::anim::{sample_or, CameraPose, FCurve};
use crate::util::{Error, Result};

/// Index of a composition inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CompositionId {
    /// The scene's root composition.
    Root,
    /// Entry of [`Scene::compositions`].
    Index(usize),
}

/// Index of a layer inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LayerId {
    pub composition: CompositionId,
    pub index: usize,
}

impl LayerId {
    pub const fn new(composition: CompositionId, index: usize) -> Self {
        Self { composition, index }
    }

    pub const fn root(index: usize) -> Self {
        Self::new(CompositionId::Root, index)
    }
}

/// Ordered layer stack, rendered back to front by index.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Composition {
    /// Not stored on disk; taken from the last layer that uses this
    /// composition as its item.
    pub given_name: String,
    pub layers: Vec<Layer>,
}

impl Composition {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { given_name: String::new(), layers }
    }
}

/// Scene camera channels.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Camera {
    pub eye_x: Option<FCurve>,
    pub eye_y: Option<FCurve>,
    pub eye_z: Option<FCurve>,
    pub position_x: Option<FCurve>,
    pub position_y: Option<FCurve>,
    pub position_z: Option<FCurve>,
    pub direction_x: Option<FCurve>,
    pub direction_y: Option<FCurve>,
    pub direction_z: Option<FCurve>,
    pub rotation_x: Option<FCurve>,
    pub rotation_y: Option<FCurve>,
    pub rotation_z: Option<FCurve>,
    pub zoom: Option<FCurve>,
}

impl Camera {
    /// The channels in on-disk order.
    pub fn channels(&self) -> [&Option<FCurve>; 13] {
        [
            &self.eye_x,
            &self.eye_y,
            &self.eye_z,
            &self.position_x,
            &self.position_y,
            &self.position_z,
            &self.direction_x,
            &self.direction_y,
            &self.direction_z,
            &self.rotation_x,
            &self.rotation_y,
            &self.rotation_z,
            &self.zoom,
        ]
    }

    pub fn channels_mut(&mut self) -> [&mut Option<FCurve>; 13] {
        [
            &mut self.eye_x,
            &mut self.eye_y,
            &mut self.eye_z,
            &mut self.position_x,
            &mut self.position_y,
            &mut self.position_z,
            &mut self.direction_x,
            &mut self.direction_y,
            &mut self.direction_z,
            &mut self.rotation_x,
            &mut self.rotation_y,
            &mut self.rotation_z,
            &mut self.zoom,
        ]
    }

    pub fn sample(&self, frame: f32) -> CameraPose {
        let s = |c: &Option<FCurve>, default| sample_or(c.as_ref(), frame, default);
        CameraPose {
            eye: Vec3::new(s(&self.eye_x, 0.0), s(&self.eye_y, 0.0), s(&self.eye_z, 0.0)),
            position: Vec3::new(s(&self.position_x, 0.0), s(&self.position_y, 0.0), s(&self.position_z, 0.0)),
            direction: Vec3::new(s(&self.direction_x, 0.0), s(&self.direction_y, 0.0), s(&self.direction_z, 0.0)),
            rotation: Vec3::new(s(&self.rotation_x, 0.0), s(&self.rotation_y, 0.0), s(&self.rotation_z, 0.0)),
            zoom: s(&self.zoom, 1.0),
        }
    }
}

/// A self-contained animation: a root composition, sub-compositions
/// and the items their layers play.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scene {
    pub name: String,
    pub start_frame: f32,
    pub end_frame: f32,
    pub frame_rate: f32,
    pub background_color: Rgb8,
    pub width: i32,
    pub height: i32,
    pub camera: Option<Camera>,
    /// Non-root compositions, in file order.
    pub compositions: Vec<Composition>,
    pub root_composition: Composition,
    pub videos: Vec<Video>,
    pub audios: Vec<Audio>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            name: String::new(),
            start_frame: 0.0,
            end_frame: 0.0,
            frame_rate: 60.0,
            background_color: Rgb8::BLACK,
            width: 0,
            height: 0,
            camera: None,
            compositions: Vec::new(),
            root_composition: Composition::default(),
            videos: Vec::new(),
            audios: Vec::new(),
        }
    }
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Length in frames.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.end_frame - self.start_frame
    }

    pub fn add_composition(&mut self, composition: Composition) -> CompositionId {
        self.compositions.push(composition);
        CompositionId::Index(self.compositions.len() - 1)
    }

    pub fn add_video(&mut self, video: Video) -> usize {
        self.videos.push(video);
        self.videos.len() - 1
    }

    pub fn add_audio(&mut self, audio: Audio) -> usize {
        self.audios.push(audio);
        self.audios.len() - 1
    }

    pub fn composition(&self, id: CompositionId) -> Option<&Composition> {
        match id {
            CompositionId::Root => Some(&self.root_composition),
            CompositionId::Index(i) => self.compositions.get(i),
        }
    }

    pub fn composition_mut(&mut self, id: CompositionId) -> Option<&mut Composition> {
        match id {
            CompositionId::Root => Some(&mut self.root_composition),
            CompositionId::Index(i) => self.compositions.get_mut(i),
        }
    }

    /// Compositions in file order: non-root first, root last.
    pub fn compositions_in_file_order(&self) -> impl Iterator<Item = (CompositionId, &Composition)> {
        self.compositions
            .iter()
            .enumerate()
            .map(|(i, c)| (CompositionId::Index(i), c))
            .chain(std::iter::once((CompositionId::Root, &self.root_composition)))
    }

    /// Number of compositions including the root.
    #[inline]
    pub fn composition_count(&self) -> usize {
        self.compositions.len() + 1
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.composition(id.composition)?.layers.get(id.index)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.composition_mut(id.composition)?.layers.get_mut(id.index)
    }

    /// Every layer in file order.
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.compositions_in_file_order().flat_map(|(cid, comp)| {
            comp.layers
                .iter()
                .enumerate()
                .map(move |(i, layer)| (LayerId::new(cid, i), layer))
        })
    }

    /// Total number of layers across every composition.
    pub fn layer_count(&self) -> usize {
        self.compositions_in_file_order().map(|(_, c)| c.layers.len()).sum()
    }

    /// First layer with the given name, in file order.
    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers().find(|(_, l)| l.name == name).map(|(id, _)| id)
    }

    /// Parents of a layer, nearest first. Stops if the chain loops.
    pub fn parent_chain(&self, id: LayerId) -> Vec<LayerId> {
        let limit = self.layer_count();
        let mut chain = Vec::new();
        let mut current = self.layer(id).and_then(|l| l.parent);
        while let Some(parent) = current {
            if chain.len() >= limit || parent == id || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.layer(parent).and_then(|l| l.parent);
        }
        chain
    }

    /// Layer transform at `frame` with every parent applied.
    ///
    /// Layers without video channels contribute identity.
    pub fn world_transform(&self, id: LayerId, frame: f32) -> Option<Affine3A> {
        let local = |layer: &Layer| {
            layer
                .sample_video(frame)
                .map_or(Affine3A::IDENTITY, |t| t.to_affine())
        };
        let mut world = local(self.layer(id)?);
        for parent in self.parent_chain(id) {
            if let Some(layer) = self.layer(parent) {
                world = local(layer) * world;
            }
        }
        Some(world)
    }

    /// Check that every item and parent reference points at something in
    /// this scene.
    pub fn validate(&self) -> Result<()> {
        for (id, layer) in self.layers() {
            let item_ok = match layer.item {
                LayerItem::None => true,
                LayerItem::Video(i) => i < self.videos.len(),
                LayerItem::Audio(i) => i < self.audios.len(),
                LayerItem::Composition(cid) => self.composition(cid).is_some(),
            };
            if !item_ok {
                return Err(Error::format(format!(
                    "scene '{}': layer '{}' ({:?}) references missing item {:?}",
                    self.name, layer.name, id, layer.item
                )));
            }
            if let Some(parent) = layer.parent {
                if self.layer(parent).is_none() {
                    return Err(Error::format(format!(
                        "scene '{}': layer '{}' ({:?}) references missing parent {:?}",
                        self.name, layer.name, id, parent
                    )));
                }
            }
        }
        Ok(())
    }
}
