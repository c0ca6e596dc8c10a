//! aetset CLI - inspect, dump and convert AetSet files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use aetset::aet::file::{read_file, write_file};
use aetset::aet::{AetSet, CompositionId, ContainerInfo, LayerItem, Layout, Scene};
use aetset::{Endianness, PtrWidth, ReadOptions, WriteOptions};

const VERSION_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("AETSET_BUILD_DATE"), ")");

/// AetSet scene graph tool
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
struct Args {
    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    /// Force the pointer width instead of inferring it
    #[arg(long = "read-ptr", value_name = "BITS", value_enum, global = true)]
    read_ptr: Option<PtrArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise one or more files
    #[command(alias = "i")]
    Info {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the scene, composition and layer hierarchy
    #[command(alias = "t")]
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Dump the decoded set as JSON
    #[command(alias = "d")]
    Dump {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Pretty-print the output
        #[arg(short = 'p', long = "pretty")]
        pretty: bool,
    },
    /// Re-encode a file with a different layout
    #[command(alias = "c")]
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
        #[arg(long = "layout", value_enum, default_value_t = LayoutArg::Modern)]
        layout: LayoutArg,
        #[arg(long = "ptr", value_enum, default_value_t = PtrArg::Bits32)]
        ptr: PtrArg,
        /// Write big-endian (modern layout only)
        #[arg(long = "big-endian")]
        big_endian: bool,
        /// Store every string separately
        #[arg(long = "no-pool")]
        no_pool: bool,
    },
    /// Sample a layer's transform at a frame
    #[command(alias = "s")]
    Sample {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Scene index
        #[arg(long = "scene", default_value_t = 0)]
        scene: usize,
        /// Layer name (first match in file order)
        #[arg(long = "layer")]
        layer: String,
        #[arg(long = "frame", allow_negative_numbers = true)]
        frame: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Legacy,
    Modern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PtrArg {
    #[value(name = "32")]
    Bits32,
    #[value(name = "64")]
    Bits64,
}

impl From<PtrArg> for PtrWidth {
    fn from(arg: PtrArg) -> Self {
        match arg {
            PtrArg::Bits32 => PtrWidth::Bits32,
            PtrArg::Bits64 => PtrWidth::Bits64,
        }
    }
}

fn init_logging(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbosity {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    debug!("aetset {}", VERSION_INFO);

    let read_options = ReadOptions { pointer_width: args.read_ptr.map(PtrWidth::from) };
    match args.command {
        Command::Info { files } => cmd_info(&files, &read_options),
        Command::Tree { file } => cmd_tree(&file, &read_options),
        Command::Dump { file, pretty } => cmd_dump(&file, &read_options, pretty),
        Command::Convert { input, output, layout, ptr, big_endian, no_pool } => {
            let layout = match layout {
                LayoutArg::Legacy => Layout::Legacy,
                LayoutArg::Modern => Layout::Modern,
            };
            let options = WriteOptions {
                layout,
                pointer_width: ptr.into(),
                endianness: if big_endian { Endianness::Big } else { Endianness::Little },
                string_pooling: !no_pool,
            };
            cmd_convert(&input, &output, &read_options, &options)
        }
        Command::Sample { file, scene, layer, frame } => cmd_sample(&file, &read_options, scene, &layer, frame),
    }
}

fn load(path: &Path, options: &ReadOptions) -> Result<(AetSet, ContainerInfo)> {
    read_file(path, options).with_context(|| format!("failed to read {}", path.display()))
}

fn cmd_info(files: &[PathBuf], options: &ReadOptions) -> Result<()> {
    let results: Vec<_> = files.par_iter().map(|path| (path, load(path, options))).collect();

    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok((set, info)) => print_info(path, &set, &info),
            Err(err) => {
                eprintln!("{}: {:#}", path.display(), err);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

fn print_info(path: &Path, set: &AetSet, info: &ContainerInfo) {
    println!("{}", path.display());
    println!("  layout:      {}", info.layout);
    println!("  pointers:    {}", info.pointer_width);
    println!("  endianness:  {}", info.endianness);
    if let Some(count) = info.relocation_count() {
        println!("  relocations: {}", count);
    }
    println!("  scenes:      {}", set.scenes.len());
    for scene in &set.scenes {
        println!(
            "  - {} [{}..{} @ {} fps, {}x{}]: {} compositions, {} layers, {} videos, {} audios",
            scene.name,
            scene.start_frame,
            scene.end_frame,
            scene.frame_rate,
            scene.width,
            scene.height,
            scene.composition_count(),
            scene.layer_count(),
            scene.videos.len(),
            scene.audios.len()
        );
    }
}

fn cmd_tree(path: &Path, options: &ReadOptions) -> Result<()> {
    let (set, _) = load(path, options)?;
    for (i, scene) in set.scenes.iter().enumerate() {
        println!("scene[{}] {}", i, scene.name);
        let mut stack = Vec::new();
        print_composition(scene, CompositionId::Root, 1, &mut stack);
    }
    Ok(())
}

fn print_composition(scene: &Scene, id: CompositionId, depth: usize, stack: &mut Vec<CompositionId>) {
    let Some(composition) = scene.composition(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    if stack.contains(&id) {
        println!("{}(cycle to {:?})", indent, id);
        return;
    }
    stack.push(id);

    for (i, layer) in composition.layers.iter().enumerate() {
        let item = match layer.item {
            LayerItem::None => String::new(),
            LayerItem::Video(v) => format!(" -> video[{}]", v),
            LayerItem::Audio(a) => format!(" -> audio[{}]", a),
            LayerItem::Composition(c) => match scene.composition(c) {
                Some(sub) if !sub.given_name.is_empty() => format!(" -> comp '{}'", sub.given_name),
                _ => format!(" -> comp {:?}", c),
            },
        };
        let parent = layer
            .parent
            .and_then(|p| scene.layer(p))
            .map(|p| format!(" (parent '{}')", p.name))
            .unwrap_or_default();
        println!(
            "{}[{}] {} [{}..{}){}{}",
            indent, i, layer.name, layer.start_frame, layer.end_frame, item, parent
        );
        if let LayerItem::Composition(c) = layer.item {
            print_composition(scene, c, depth + 1, stack);
        }
    }
    stack.pop();
}

fn cmd_dump(path: &Path, options: &ReadOptions, pretty: bool) -> Result<()> {
    let (set, _) = load(path, options)?;
    let json = if pretty {
        serde_json::to_string_pretty(&set)?
    } else {
        serde_json::to_string(&set)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path, read: &ReadOptions, write: &WriteOptions) -> Result<()> {
    let (set, info) = load(input, read)?;
    write_file(output, &set, write).with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        from = %info.layout,
        to = %write.layout,
        width = %write.pointer_width,
        endianness = %write.endianness,
        "converted"
    );
    println!("{} -> {}", input.display(), output.display());
    Ok(())
}

fn cmd_sample(path: &Path, options: &ReadOptions, scene_index: usize, name: &str, frame: f32) -> Result<()> {
    let (set, _) = load(path, options)?;
    let scene = set
        .scenes
        .get(scene_index)
        .with_context(|| format!("no scene {} (file has {})", scene_index, set.scenes.len()))?;
    let id = scene
        .layer_by_name(name)
        .with_context(|| format!("no layer named '{}' in scene '{}'", name, scene.name))?;
    let Some(layer) = scene.layer(id) else {
        bail!("layer {:?} vanished", id);
    };

    println!("{} @ {}", layer.name, frame);
    println!("  active:      {}", layer.is_active_at(frame));
    println!("  local frame: {}", layer.local_frame(frame));
    match layer.sample_video(frame) {
        Some(t) => {
            println!("  anchor:      {}", t.anchor);
            println!("  position:    {}", t.position);
            println!("  rotation:    {}", t.rotation);
            println!("  scale:       {}", t.scale);
            println!("  opacity:     {}", t.opacity);
        }
        None => println!("  (no video channels)"),
    }
    if let Some(mix) = layer.audio.as_ref().map(|a| a.sample(frame)) {
        println!("  volume:      {}", mix.volume);
        println!("  pan:         {}", mix.pan);
    }
    if let Some(world) = scene.world_transform(id, frame) {
        println!("  world:       {}", world.translation);
    }
    Ok(())
}
