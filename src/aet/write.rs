//! AetSet encoding.
//!
//! Each record writes its fixed-size fields in place and queues its
//! variable-size children on the writer's pointer pool, so the pool flush
//! lays the graph out breadth first. Layers mark their position as they
//! are written; item and parent references are resolved against those
//! marks in the delayed flush.

use std::io::{Seek, Write};

use tracing::debug;

use super::{
    AetSet, Camera, Composition, CompositionId, Layer, LayerAudio, LayerId, LayerItem, LayerVideo, Layout,
    Scene, Video,
};
use crate::anim::FCurve;
use crate::binary::{
    endianness_marker, RelocationTable, SectionHeader, Writer, LEGACY_ALIGNMENT, SECTION_ALIGNMENT,
    SECTION_HEADER_SIZE, SIG_AETC, SIG_EOFC,
};
use crate::util::{Endianness, Error, FileAddr, PtrWidth, Result};

/// Encode-time options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    pub layout: Layout,
    pub pointer_width: PtrWidth,
    pub endianness: Endianness,
    /// Share one copy of identical strings.
    pub string_pooling: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::legacy()
    }
}

impl WriteOptions {
    /// Flat layout: 32-bit little-endian absolute pointers.
    pub const fn legacy() -> Self {
        Self {
            layout: Layout::Legacy,
            pointer_width: PtrWidth::Bits32,
            endianness: Endianness::Little,
            string_pooling: true,
        }
    }

    /// Sectioned container with the given pointer width.
    pub const fn modern(pointer_width: PtrWidth) -> Self {
        Self {
            layout: Layout::Modern,
            pointer_width,
            endianness: Endianness::Little,
            string_pooling: true,
        }
    }

    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub const fn with_string_pooling(mut self, enabled: bool) -> Self {
        self.string_pooling = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.layout == Layout::Legacy
            && (self.pointer_width != PtrWidth::Bits32 || self.endianness != Endianness::Little)
        {
            return Err(Error::format(format!(
                "legacy layout is 32-bit little-endian only, got {} {}",
                self.pointer_width, self.endianness
            )));
        }
        Ok(())
    }
}

/// Records other records point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Record {
    Composition(usize, CompositionId),
    Layer(usize, LayerId),
    Video(usize, usize),
    Audio(usize, usize),
}

type AetWriter<'a, W> = Writer<'a, W, Record>;

pub(super) fn encode<'a, W>(set: &'a AetSet, stream: W, options: &WriteOptions) -> Result<W>
where
    W: Write + Seek + 'a,
{
    options.validate()?;
    for scene in &set.scenes {
        scene.validate()?;
    }
    debug!(
        layout = %options.layout,
        width = %options.pointer_width,
        endianness = %options.endianness,
        scenes = set.scenes.len(),
        "encoding set"
    );

    let mut w = Writer::new(stream, options.pointer_width, options.endianness);
    w.set_string_pooling(options.string_pooling);
    match options.layout {
        Layout::Legacy => {
            w.set_pool_alignment(LEGACY_ALIGNMENT);
            write_scene_table(&mut w, set)?;
            w.finalize()?;
        }
        Layout::Modern => write_container(&mut w, set, options)?,
    }
    w.into_inner()
}

fn count_u32(what: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| Error::count(what, count as u64))
}

fn payload_size(end: FileAddr, data_start: FileAddr) -> Result<u32> {
    let size = end.align_up(SECTION_ALIGNMENT) - data_start;
    u32::try_from(size).map_err(|_| Error::InsufficientSpace(format!("payload of {:#x} bytes", size)))
}

/// Wrap the scene table in an `AETC` section, then append the relocation
/// table and the terminator.
fn write_container<'a, W>(w: &mut AetWriter<'a, W>, set: &'a AetSet, options: &WriteOptions) -> Result<()>
where
    W: Write + Seek + 'a,
{
    let data_start = FileAddr::new(SECTION_HEADER_SIZE as i64);
    w.set_pool_alignment(SECTION_ALIGNMENT);

    // Section and data sizes are only known once the pools are flushed.
    w.write_bytes(&SIG_AETC)?;
    w.write_delayed(4, move |w| w.write_u32(payload_size(w.stream_end(), data_start)?))?;
    w.write_u32(SECTION_HEADER_SIZE)?;
    w.write_u32(endianness_marker(options.endianness))?;
    w.write_u32(0)?;
    w.write_delayed(4, move |w| w.write_u32(payload_size(w.stream_end(), data_start)?))?;
    w.write_padding(8)?;

    w.push_base_offset();
    write_scene_table(w, set)?;
    w.finalize()?;
    w.align(SECTION_ALIGNMENT)?;
    w.pop_base_offset();

    let offsets = w
        .relocations()
        .iter()
        .filter_map(|at| at.relative_to(data_start).as_u64())
        .collect();
    let table = RelocationTable::new(options.pointer_width, offsets);
    let body = table.encode(options.endianness)?;
    let pof = SectionHeader::new(table.signature(), options.endianness, 1, body.len() as u32);
    w.write_bytes(&pof.to_bytes())?;
    w.write_bytes(&body)?;
    w.align(SECTION_ALIGNMENT)?;

    let eofc = SectionHeader::new(SIG_EOFC, options.endianness, 0, 0);
    w.write_bytes(&eofc.to_bytes())?;
    debug!(relocations = table.len(), size = %w.stream_end(), "container written");
    Ok(())
}

fn write_scene_table<'a, W>(w: &mut AetWriter<'a, W>, set: &'a AetSet) -> Result<()>
where
    W: Write + Seek + 'a,
{
    for (si, scene) in set.scenes.iter().enumerate() {
        w.write_func_ptr(move |w| write_scene(w, si, scene))?;
    }
    w.write_null_ptr()
}

/// Write `(count, pointer)` and queue the records. An empty array gets a
/// null pointer.
fn write_array<'a, W, T, F>(w: &mut AetWriter<'a, W>, what: &'static str, items: &'a [T], f: F) -> Result<()>
where
    W: Write + Seek + 'a,
    T: 'a,
    F: Fn(&mut AetWriter<'a, W>, usize, &'a T) -> Result<()> + 'a,
{
    w.write_u32(count_u32(what, items.len())?)?;
    if items.is_empty() {
        return w.write_null_ptr();
    }
    w.write_func_ptr(move |w| {
        for (i, item) in items.iter().enumerate() {
            w.begin_record()?;
            f(w, i, item)?;
        }
        Ok(())
    })
}

fn write_optional<'a, W, T, F>(w: &mut AetWriter<'a, W>, value: Option<&'a T>, f: F) -> Result<()>
where
    W: Write + Seek + 'a,
    T: 'a,
    F: FnOnce(&mut AetWriter<'a, W>, &'a T) -> Result<()> + 'a,
{
    match value {
        Some(value) => w.write_func_ptr(move |w| f(w, value)),
        None => w.write_null_ptr(),
    }
}

fn write_scene<'a, W>(w: &mut AetWriter<'a, W>, si: usize, scene: &'a Scene) -> Result<()>
where
    W: Write + Seek + 'a,
{
    w.write_str_ptr(&scene.name)?;
    w.write_f32(scene.start_frame)?;
    w.write_f32(scene.end_frame)?;
    w.write_f32(scene.frame_rate)?;
    w.write_bytes(&scene.background_color.to_bytes())?;
    w.write_i32(scene.width)?;
    w.write_i32(scene.height)?;
    write_optional(w, scene.camera.as_ref(), write_camera)?;

    // Root composition goes last; the on-disk count includes it.
    w.write_u32(count_u32("compositions", scene.composition_count())?)?;
    w.write_func_ptr(move |w| {
        for (id, composition) in scene.compositions_in_file_order() {
            w.begin_record()?;
            w.mark(Record::Composition(si, id));
            write_composition(w, si, id, composition)?;
        }
        Ok(())
    })?;

    write_array(w, "videos", &scene.videos, move |w, i, video| {
        w.mark(Record::Video(si, i));
        write_video(w, video)
    })?;
    write_array(w, "audios", &scene.audios, move |w, i, audio| {
        w.mark(Record::Audio(si, i));
        w.write_u32(audio.sound_id)
    })?;

    debug!(
        scene = %scene.name,
        compositions = scene.composition_count(),
        layers = scene.layer_count(),
        videos = scene.videos.len(),
        audios = scene.audios.len(),
        "scene queued"
    );
    Ok(())
}

fn write_composition<'a, W>(
    w: &mut AetWriter<'a, W>,
    si: usize,
    id: CompositionId,
    composition: &'a Composition,
) -> Result<()>
where
    W: Write + Seek + 'a,
{
    write_array(w, "layers", &composition.layers, move |w, i, layer| {
        write_layer(w, si, LayerId::new(id, i), layer)
    })
}

fn write_layer<'a, W>(w: &mut AetWriter<'a, W>, si: usize, id: LayerId, layer: &'a Layer) -> Result<()>
where
    W: Write + Seek + 'a,
{
    w.mark(Record::Layer(si, id));
    w.write_str_ptr(&layer.name)?;
    w.write_f32(layer.start_frame)?;
    w.write_f32(layer.end_frame)?;
    w.write_f32(layer.start_offset)?;
    w.write_f32(layer.time_scale)?;
    w.write_u16(layer.flags.bits())?;
    w.write_u8(layer.quality.to_u8())?;
    w.write_u8(layer.item.item_type().to_u8())?;

    match layer.item {
        LayerItem::None => w.write_null_ptr()?,
        LayerItem::Video(i) => w.write_node_ptr(Record::Video(si, i))?,
        LayerItem::Audio(i) => w.write_node_ptr(Record::Audio(si, i))?,
        LayerItem::Composition(c) => w.write_node_ptr(Record::Composition(si, c))?,
    }
    match layer.parent {
        Some(parent) => w.write_node_ptr(Record::Layer(si, parent))?,
        None => w.write_null_ptr()?,
    }

    write_array(w, "markers", &layer.markers, |w, _, marker| {
        w.write_f32(marker.frame)?;
        w.write_str_ptr(&marker.name)
    })?;
    write_optional(w, layer.video.as_ref(), write_layer_video)?;
    write_optional(w, layer.audio.as_ref(), write_layer_audio)
}

fn write_layer_video<'a, W>(w: &mut AetWriter<'a, W>, video: &'a LayerVideo) -> Result<()>
where
    W: Write + Seek + 'a,
{
    let mode = &video.transfer_mode;
    w.write_bytes(&[mode.blend_mode.to_u8(), mode.flags, mode.track_matte.to_u8(), 0])?;
    for channel in video.channels() {
        write_fcurve(w, channel.as_ref())?;
    }
    write_optional(w, video.video_3d.as_deref(), |w, video_3d| {
        for channel in video_3d.channels() {
            write_fcurve(w, channel.as_ref())?;
        }
        Ok(())
    })
}

fn write_layer_audio<'a, W>(w: &mut AetWriter<'a, W>, audio: &'a LayerAudio) -> Result<()>
where
    W: Write + Seek + 'a,
{
    for channel in audio.channels() {
        write_fcurve(w, channel.as_ref())?;
    }
    Ok(())
}

fn write_camera<'a, W>(w: &mut AetWriter<'a, W>, camera: &'a Camera) -> Result<()>
where
    W: Write + Seek + 'a,
{
    for channel in camera.channels() {
        write_fcurve(w, channel.as_ref())?;
    }
    Ok(())
}

/// Write `(key count, keys pointer)`. A single key stores only its value.
fn write_fcurve<'a, W>(w: &mut AetWriter<'a, W>, curve: Option<&'a FCurve>) -> Result<()>
where
    W: Write + Seek + 'a,
{
    let Some(curve) = curve else {
        w.write_u32(0)?;
        return w.write_null_ptr();
    };
    w.write_u32(count_u32("curve keys", curve.len())?)?;
    w.write_func_ptr(move |w| {
        let keys = curve.keys();
        if let [key] = keys {
            return w.write_f32(key.value);
        }
        for key in keys {
            w.write_f32(key.frame)?;
        }
        for key in keys {
            w.write_f32(key.value)?;
            w.write_f32(key.tangent)?;
        }
        Ok(())
    })
}

fn write_video<'a, W>(w: &mut AetWriter<'a, W>, video: &'a Video) -> Result<()>
where
    W: Write + Seek + 'a,
{
    w.write_bytes(&video.color.to_bytes())?;
    w.write_u16(video.width)?;
    w.write_u16(video.height)?;
    w.write_f32(video.files_per_frame)?;
    write_array(w, "video sources", &video.sources, |w, _, source| {
        w.write_str_ptr(&source.name)?;
        w.write_u32(source.id)
    })
}
