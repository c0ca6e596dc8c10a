//! Post-decode link pass.
//!
//! While a scene is read, every composition, layer and item records the
//! absolute position it was read from, and every layer leaves its item and
//! parent as raw positions. Once the scene is complete those positions are
//! resolved through hash maps into arena indices.

use std::collections::HashMap;

use tracing::trace;

use super::{CompositionId, ItemType, LayerId, LayerItem, Scene};
use crate::util::{Error, FileAddr, Result};

/// Unresolved references of one layer, as absolute positions.
#[derive(Clone, Copy, Debug)]
pub(super) struct PendingLink {
    pub layer: LayerId,
    pub item_type: ItemType,
    pub item: FileAddr,
    pub parent: FileAddr,
}

/// Where each record of a scene was read from.
#[derive(Debug, Default)]
pub(super) struct SceneIndex {
    pub compositions: HashMap<FileAddr, CompositionId>,
    pub layers: HashMap<FileAddr, LayerId>,
    pub videos: HashMap<FileAddr, usize>,
    pub audios: HashMap<FileAddr, usize>,
    pub pending: Vec<PendingLink>,
}

impl SceneIndex {
    fn resolve_item(&self, link: &PendingLink) -> Result<LayerItem> {
        if link.item.is_null() {
            return Ok(LayerItem::None);
        }
        let missing = || Error::pointer("layer item", link.item);
        Ok(match link.item_type {
            ItemType::None => {
                trace!(layer = ?link.layer, item = %link.item, "item offset on a layer without item type");
                LayerItem::None
            }
            ItemType::Video => LayerItem::Video(*self.videos.get(&link.item).ok_or_else(missing)?),
            ItemType::Audio => LayerItem::Audio(*self.audios.get(&link.item).ok_or_else(missing)?),
            ItemType::Composition => {
                LayerItem::Composition(*self.compositions.get(&link.item).ok_or_else(missing)?)
            }
        })
    }

    fn resolve_parent(&self, link: &PendingLink) -> Result<Option<LayerId>> {
        if link.parent.is_null() {
            return Ok(None);
        }
        self.layers
            .get(&link.parent)
            .copied()
            .map(Some)
            .ok_or_else(|| Error::pointer("layer parent", link.parent))
    }
}

/// Bind every layer's item and parent.
///
/// A non-null position that matches no record of the scene is a
/// `BadPointer`. A null item position leaves the layer unbound whatever
/// its item type says.
pub(super) fn link_scene(scene: &mut Scene, index: &SceneIndex) -> Result<()> {
    for link in &index.pending {
        let item = index.resolve_item(link)?;
        let parent = index.resolve_parent(link)?;
        let layer = scene
            .layer_mut(link.layer)
            .ok_or_else(|| Error::other(format!("link for unknown layer {:?}", link.layer)))?;
        layer.item = item;
        layer.parent = parent;
    }
    Ok(())
}

/// Name each composition after the last layer, in file order, that plays it.
pub(super) fn assign_given_names(scene: &mut Scene) {
    let names: Vec<(CompositionId, String)> = scene
        .layers()
        .filter_map(|(_, layer)| match layer.item {
            LayerItem::Composition(id) => Some((id, layer.name.clone())),
            _ => None,
        })
        .collect();
    for (id, name) in names {
        if let Some(composition) = scene.composition_mut(id) {
            composition.given_name = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aet::{Composition, Layer, Video};

    fn scene() -> Scene {
        let mut scene = Scene::new("s");
        scene.add_composition(Composition::new(vec![Layer::new("a", 0.0, 1.0)]));
        scene.add_video(Video::new(4, 4));
        scene.root_composition.layers = vec![Layer::new("first", 0.0, 1.0), Layer::new("second", 0.0, 1.0)];
        scene
    }

    fn index() -> SceneIndex {
        let mut index = SceneIndex::default();
        index.compositions.insert(FileAddr::new(0x100), CompositionId::Index(0));
        index.compositions.insert(FileAddr::new(0x200), CompositionId::Root);
        index.videos.insert(FileAddr::new(0x300), 0);
        index.layers.insert(FileAddr::new(0x110), LayerId::new(CompositionId::Index(0), 0));
        index.layers.insert(FileAddr::new(0x210), LayerId::root(0));
        index.layers.insert(FileAddr::new(0x240), LayerId::root(1));
        index
    }

    #[test]
    fn test_links_resolve() {
        let mut scene = scene();
        let mut index = index();
        index.pending.push(PendingLink {
            layer: LayerId::root(0),
            item_type: ItemType::Composition,
            item: FileAddr::new(0x100),
            parent: FileAddr::NULL,
        });
        index.pending.push(PendingLink {
            layer: LayerId::root(1),
            item_type: ItemType::Video,
            item: FileAddr::new(0x300),
            parent: FileAddr::new(0x210),
        });
        link_scene(&mut scene, &index).unwrap();

        let first = &scene.root_composition.layers[0];
        assert_eq!(first.item, LayerItem::Composition(CompositionId::Index(0)));
        assert_eq!(first.parent, None);
        let second = &scene.root_composition.layers[1];
        assert_eq!(second.item, LayerItem::Video(0));
        assert_eq!(second.parent, Some(LayerId::root(0)));
    }

    #[test]
    fn test_unmatched_item_is_bad_pointer() {
        let mut scene = scene();
        let mut index = index();
        index.pending.push(PendingLink {
            layer: LayerId::root(0),
            item_type: ItemType::Audio,
            item: FileAddr::new(0x300),
            parent: FileAddr::NULL,
        });
        let err = link_scene(&mut scene, &index).unwrap_err();
        assert!(matches!(err, Error::BadPointer { what: "layer item", .. }));
    }

    #[test]
    fn test_unmatched_parent_is_bad_pointer() {
        let mut scene = scene();
        let mut index = index();
        index.pending.push(PendingLink {
            layer: LayerId::root(1),
            item_type: ItemType::None,
            item: FileAddr::NULL,
            parent: FileAddr::new(0x999),
        });
        assert!(matches!(
            link_scene(&mut scene, &index),
            Err(Error::BadPointer { what: "layer parent", .. })
        ));
    }

    #[test]
    fn test_null_item_leaves_layer_unbound() {
        let mut scene = scene();
        let mut index = index();
        index.pending.push(PendingLink {
            layer: LayerId::root(0),
            item_type: ItemType::Video,
            item: FileAddr::NULL,
            parent: FileAddr::NULL,
        });
        link_scene(&mut scene, &index).unwrap();
        assert!(scene.root_composition.layers[0].item.is_none());
    }

    #[test]
    fn test_given_name_last_reference_wins() {
        let mut scene = scene();
        scene.root_composition.layers[0].item = LayerItem::Composition(CompositionId::Index(0));
        scene.root_composition.layers[1].item = LayerItem::Composition(CompositionId::Index(0));
        assign_given_names(&mut scene);
        assert_eq!(scene.compositions[0].given_name, "second");
        assert_eq!(scene.root_composition.given_name, "");
    }
}
