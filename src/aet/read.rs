//! AetSet decoding.
//!
//! Records are read by following offsets with "read at, then restore"
//! helpers. Every offset is bounds-checked before it is followed and every
//! array count is checked against the bytes left in the stream. Item and
//! parent references are collected as raw positions and resolved per scene
//! once all of its records are known (see [`super::link`]).

use std::collections::HashSet;
use std::io::{Read, Seek};

use tracing::{debug, trace};

use super::link::{self, PendingLink, SceneIndex};
use super::{
    AetSet, Audio, BlendMode, Camera, Composition, CompositionId, ContainerInfo, ItemType, Layer, LayerAudio,
    LayerFlags, LayerId, LayerQuality, LayerVideo, LayerVideo3D, Layout, Marker, Rgb8, Scene, TrackMatte,
    TransferMode, Video, VideoSource,
};
use crate::anim::{FCurve, KeyFrame};
use crate::binary::{scan_sections, Reader, RelocationTable, SectionHeader, SIG_AETC};
use crate::util::{Endianness, Error, FileAddr, PtrWidth, Result};

// Smallest on-disk size of each record kind with 32-bit pointers.
const COMPOSITION_RECORD: u64 = 8;
const LAYER_RECORD: u64 = 48;
const MARKER_RECORD: u64 = 8;
const VIDEO_RECORD: u64 = 20;
const SOURCE_RECORD: u64 = 8;
const AUDIO_RECORD: u64 = 4;

/// Decode-time options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Force a pointer width instead of inferring it.
    pub pointer_width: Option<PtrWidth>,
}

impl ReadOptions {
    pub fn with_pointer_width(pointer_width: PtrWidth) -> Self {
        Self { pointer_width: Some(pointer_width) }
    }
}

pub(super) fn decode<R: Read + Seek>(stream: R, options: &ReadOptions) -> Result<(AetSet, ContainerInfo)> {
    let mut reader = Reader::new(stream)?;
    let header = SectionHeader::read_at(&mut reader, FileAddr::NULL)?;

    let info = match header {
        Some(header) if header.signature == SIG_AETC => open_container(&mut reader, &header, options)?,
        Some(header) => {
            return Err(Error::format(format!(
                "expected an AETC section, found '{}'",
                header.signature_str()
            )))
        }
        None => {
            let pointer_width = options.pointer_width.unwrap_or(PtrWidth::Bits32);
            reader.set_ptr_width(pointer_width);
            reader.set_endianness(Endianness::Little);
            ContainerInfo {
                layout: Layout::Legacy,
                pointer_width,
                endianness: Endianness::Little,
                relocations: None,
            }
        }
    };
    debug!(layout = %info.layout, width = %info.pointer_width, endianness = %info.endianness, "decoding set");

    // Each scene record is decoded once; a repeated entry would multiply a
    // single record into many in-memory graphs.
    let mut scenes = Vec::new();
    let mut seen = HashSet::new();
    loop {
        let offset = reader.read_ptr()?;
        if offset.is_null() {
            break;
        }
        if !seen.insert(offset) {
            return Err(Error::format(format!("scene table lists the record at {} twice", offset)));
        }
        let scene = reader.read_at_offset("scene", offset, read_scene)?;
        scenes.push(scene);
    }

    debug!(scenes = scenes.len(), "set decoded");
    Ok((AetSet { scenes }, info))
}

/// Configure the reader for a sectioned stream and move it to the payload.
fn open_container<R: Read + Seek>(
    reader: &mut Reader<R>,
    header: &SectionHeader,
    options: &ReadOptions,
) -> Result<ContainerInfo> {
    reader.set_endianness(header.endianness);
    let scan = scan_sections(reader)?;
    let pointer_width = options.pointer_width.unwrap_or_else(|| scan.pointer_width_or_default());
    reader.set_ptr_width(pointer_width);

    let relocations = match scan.relocation_section {
        Some(at) => Some(read_relocations(reader, at, pointer_width)?),
        None => None,
    };

    let data_start = header.data_start(FileAddr::NULL);
    if data_start.get() as u64 + header.section_size as u64 > reader.len() {
        return Err(Error::count("AETC section size", header.section_size));
    }
    reader.seek(data_start)?;
    reader.push_base_offset();

    Ok(ContainerInfo {
        layout: Layout::Modern,
        pointer_width,
        endianness: header.endianness,
        relocations,
    })
}

fn read_relocations<R: Read + Seek>(
    reader: &mut Reader<R>,
    at: FileAddr,
    pointer_width: PtrWidth,
) -> Result<RelocationTable> {
    let header = SectionHeader::read_at(reader, at)?
        .ok_or_else(|| Error::format(format!("relocation section at {} vanished", at)))?;
    let start = header.data_start(at);
    let available = reader.len().saturating_sub(start.get() as u64);
    let size = (header.data_size as u64).min(available) as usize;
    let bytes = reader.read_at(start, |r| r.read_bytes(size))?;
    RelocationTable::decode(pointer_width, header.endianness, &bytes)
}

/// Reject `count` records of at least `record_size` bytes that could not
/// fit between `at` and the end of the stream.
fn check_array<R: Read + Seek>(
    reader: &Reader<R>,
    what: &'static str,
    count: u32,
    record_size: u64,
    at: FileAddr,
) -> Result<()> {
    let available = reader.len().saturating_sub(at.as_u64().unwrap_or(u64::MAX));
    if count as u64 * record_size > available {
        Err(Error::count(what, count))
    } else {
        Ok(())
    }
}

/// Read `count` consecutive records at a stored offset.
///
/// Each record starts pointer-aligned; `f` receives the record index and
/// its absolute start position. A zero count never follows the offset.
fn read_array<R, T, F>(
    reader: &mut Reader<R>,
    what: &'static str,
    count: u32,
    record_size: u64,
    offset: FileAddr,
    mut f: F,
) -> Result<Vec<T>>
where
    R: Read + Seek,
    F: FnMut(&mut Reader<R>, usize, FileAddr) -> Result<T>,
{
    if count == 0 {
        return Ok(Vec::new());
    }
    if offset.is_null() {
        return Err(Error::pointer(what, offset));
    }
    let at = reader.checked(what, offset)?;
    check_array(reader, what, count, record_size, at)?;

    reader.read_at(at, |r| {
        (0..count as usize)
            .map(|i| {
                let start = r.begin_record()?;
                f(r, i, start)
            })
            .collect()
    })
}

fn read_optional<R, T>(
    reader: &mut Reader<R>,
    what: &'static str,
    f: impl FnOnce(&mut Reader<R>) -> Result<T>,
) -> Result<Option<T>>
where
    R: Read + Seek,
{
    let offset = reader.read_ptr()?;
    if offset.is_null() {
        return Ok(None);
    }
    reader.read_at_offset(what, offset, f).map(Some)
}

fn read_scene<R: Read + Seek>(r: &mut Reader<R>) -> Result<Scene> {
    let mut index = SceneIndex::default();

    let name = r.read_str_ptr("scene name")?;
    let start_frame = r.read_f32()?;
    let end_frame = r.read_f32()?;
    let frame_rate = r.read_f32()?;
    let mut color = [0u8; 4];
    r.read_exact(&mut color)?;
    let width = r.read_i32()?;
    let height = r.read_i32()?;
    let camera = read_optional(r, "camera", read_camera)?;

    let composition_count = r.read_u32()?;
    let compositions_offset = r.read_ptr()?;
    if composition_count == 0 {
        return Err(Error::count("compositions", composition_count));
    }
    let last = composition_count as usize - 1;
    let mut compositions = read_array(
        r,
        "compositions",
        composition_count,
        COMPOSITION_RECORD,
        compositions_offset,
        |r, i, at| {
            let id = if i == last { CompositionId::Root } else { CompositionId::Index(i) };
            index.compositions.insert(at, id);
            read_composition(r, id, &mut index)
        },
    )?;
    let root_composition = compositions.pop().unwrap_or_default();

    let video_count = r.read_u32()?;
    let videos_offset = r.read_ptr()?;
    let videos = read_array(r, "videos", video_count, VIDEO_RECORD, videos_offset, |r, i, at| {
        index.videos.insert(at, i);
        read_video(r)
    })?;

    let audio_count = r.read_u32()?;
    let audios_offset = r.read_ptr()?;
    let audios = read_array(r, "audios", audio_count, AUDIO_RECORD, audios_offset, |r, i, at| {
        index.audios.insert(at, i);
        Ok(Audio { sound_id: r.read_u32()? })
    })?;

    let mut scene = Scene {
        name,
        start_frame,
        end_frame,
        frame_rate,
        background_color: Rgb8::from_bytes(color),
        width,
        height,
        camera,
        compositions,
        root_composition,
        videos,
        audios,
    };
    link::link_scene(&mut scene, &index)?;
    link::assign_given_names(&mut scene);

    debug!(
        scene = %scene.name,
        compositions = scene.compositions.len(),
        layers = scene.layer_count(),
        videos = scene.videos.len(),
        audios = scene.audios.len(),
        "scene decoded"
    );
    Ok(scene)
}

fn read_composition<R: Read + Seek>(
    r: &mut Reader<R>,
    id: CompositionId,
    index: &mut SceneIndex,
) -> Result<Composition> {
    let layer_count = r.read_u32()?;
    let layers_offset = r.read_ptr()?;
    let layers = read_array(r, "layers", layer_count, LAYER_RECORD, layers_offset, |r, i, at| {
        let layer_id = LayerId::new(id, i);
        index.layers.insert(at, layer_id);
        let (layer, item_type, item, parent) = read_layer(r)?;
        index.pending.push(PendingLink {
            layer: layer_id,
            item_type,
            item,
            parent,
        });
        Ok(layer)
    })?;
    trace!(composition = ?id, layers = layers.len(), "composition");
    Ok(Composition::new(layers))
}

/// Read a layer record. Item and parent come back as absolute positions.
fn read_layer<R: Read + Seek>(r: &mut Reader<R>) -> Result<(Layer, ItemType, FileAddr, FileAddr)> {
    let name = r.read_str_ptr("layer name")?;
    let start_frame = r.read_f32()?;
    let end_frame = r.read_f32()?;
    let start_offset = r.read_f32()?;
    let time_scale = r.read_f32()?;
    let flags = LayerFlags::from_bits(r.read_u16()?);
    let quality = LayerQuality::from_u8(r.read_u8()?);
    let raw_type = r.read_u8()?;
    let item_type = ItemType::from_u8(raw_type)
        .ok_or_else(|| Error::format(format!("layer '{}' has unknown item type {}", name, raw_type)))?;

    let item = r.read_ptr()?;
    let item = r.checked("layer item", item)?;
    let parent = r.read_ptr()?;
    let parent = r.checked("layer parent", parent)?;

    let marker_count = r.read_u32()?;
    let markers_offset = r.read_ptr()?;
    let markers = read_array(r, "markers", marker_count, MARKER_RECORD, markers_offset, |r, _, _| {
        let frame = r.read_f32()?;
        let name = r.read_str_ptr("marker name")?;
        Ok(Marker { frame, name })
    })?;

    let video = read_optional(r, "layer video", read_layer_video)?;
    let audio = read_optional(r, "layer audio", read_layer_audio)?;

    let layer = Layer {
        name,
        start_frame,
        end_frame,
        start_offset,
        time_scale,
        flags,
        quality,
        markers,
        video,
        audio,
        ..Layer::default()
    };
    Ok((layer, item_type, item, parent))
}

fn read_layer_video<R: Read + Seek>(r: &mut Reader<R>) -> Result<LayerVideo> {
    let mut mode = [0u8; 4];
    r.read_exact(&mut mode)?;
    let mut video = LayerVideo {
        transfer_mode: TransferMode {
            blend_mode: BlendMode::from_u8(mode[0]),
            flags: mode[1],
            track_matte: TrackMatte::from_u8(mode[2]),
        },
        ..LayerVideo::default()
    };
    for channel in video.channels_mut() {
        *channel = read_fcurve(r)?;
    }
    video.video_3d = read_optional(r, "layer video 3d", |r| {
        let mut video_3d = LayerVideo3D::default();
        for channel in video_3d.channels_mut() {
            *channel = read_fcurve(r)?;
        }
        Ok(Box::new(video_3d))
    })?;
    Ok(video)
}

fn read_layer_audio<R: Read + Seek>(r: &mut Reader<R>) -> Result<LayerAudio> {
    let mut audio = LayerAudio::default();
    for channel in audio.channels_mut() {
        *channel = read_fcurve(r)?;
    }
    Ok(audio)
}

fn read_camera<R: Read + Seek>(r: &mut Reader<R>) -> Result<Camera> {
    let mut camera = Camera::default();
    for channel in camera.channels_mut() {
        *channel = read_fcurve(r)?;
    }
    Ok(camera)
}

/// Read a `(key count, keys offset)` pair.
///
/// A single key is stored as its bare value. Longer curves store every
/// frame first, then `(value, tangent)` pairs.
fn read_fcurve<R: Read + Seek>(r: &mut Reader<R>) -> Result<Option<FCurve>> {
    let count = r.read_u32()?;
    let offset = r.read_ptr()?;
    if count == 0 {
        return Ok(None);
    }
    if offset.is_null() {
        return Err(Error::pointer("curve keys", offset));
    }
    let at = r.checked("curve keys", offset)?;
    let stride = if count == 1 { 4 } else { 12 };
    check_array(r, "curve keys", count, stride, at)?;

    let keys = r.read_at(at, |r| {
        if count == 1 {
            return Ok(vec![KeyFrame::flat(0.0, r.read_f32()?)]);
        }
        let frames = (0..count).map(|_| r.read_f32()).collect::<Result<Vec<_>>>()?;
        if let Some(bad) = frames.iter().find(|f| !f.is_finite()) {
            return Err(Error::format(format!("curve key at {} has frame {}", at, bad)));
        }
        let mut keys = Vec::with_capacity(frames.len());
        for frame in frames {
            let value = r.read_f32()?;
            let tangent = r.read_f32()?;
            keys.push(KeyFrame::new(frame, value, tangent));
        }
        Ok(keys)
    })?;
    Ok(FCurve::new(keys))
}

fn read_video<R: Read + Seek>(r: &mut Reader<R>) -> Result<Video> {
    let mut color = [0u8; 4];
    r.read_exact(&mut color)?;
    let width = r.read_u16()?;
    let height = r.read_u16()?;
    let files_per_frame = r.read_f32()?;
    let source_count = r.read_u32()?;
    let sources_offset = r.read_ptr()?;
    let sources = read_array(r, "video sources", source_count, SOURCE_RECORD, sources_offset, |r, _, _| {
        let name = r.read_str_ptr("video source name")?;
        let id = r.read_u32()?;
        Ok(VideoSource { name, id })
    })?;
    Ok(Video {
        color: Rgb8::from_bytes(color),
        width,
        height,
        files_per_frame,
        sources,
    })
}
