use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use crimson_convert::Error;
use crimson_convert::gamez::GamezData;
use crimson_convert::gltf;
use crimson_convert::scene::{self, SceneBuilder};
use crimson_convert::texture::{NoTextures, TextureSource, ZipTextures};
use crimson_convert::unzbd::{self, Unzbd, CHAPTERS};

const DEFAULT_CS_LOCATION: &str = r"C:\Program Files (x86)\Microsoft Games\Crimson Skies";

/// Convert Crimson Skies plane and level data to binary glTF scenes.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Path to the unzbd executable.  Searched for under the data folder if omitted.
    #[arg(long, value_name = "EXE")]
    unzbd: Option<PathBuf>,

    /// Path to the Crimson Skies install folder
    #[arg(long, value_name = "FOLDER", default_value = DEFAULT_CS_LOCATION)]
    cs: PathBuf,

    /// Folder for intermediate data
    #[arg(long, value_name = "FOLDER", default_value = "data")]
    data: PathBuf,

    /// Folder to save .glb files
    #[arg(long, value_name = "FOLDER", default_value = "scene_output")]
    out: PathBuf,

    /// Use existing unzbd output
    #[arg(long)]
    skip_unzbd: bool,

    /// Don't generate scenes for planes
    #[arg(long)]
    skip_planes: bool,

    /// Don't generate scenes for levels
    #[arg(long)]
    skip_levels: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Check the install folder and locate the unpacker before doing any work.
fn find_unpacker(cli: &Cli) -> crimson_convert::Result<Unzbd> {
    if !cli.cs.is_dir() {
        return Err(Error::config(format!(
            "no Crimson Skies installation at {}; install the game or pass --cs",
            cli.cs.display())));
    }

    let exe = match &cli.unzbd {
        Some(exe) if exe.is_file() => exe.clone(),
        Some(exe) => return Err(Error::config(format!("no unzbd executable at {}", exe.display()))),
        None => match unzbd::find_unzbd(&cli.data) {
            Some(exe) => exe,
            None => return Err(Error::config(format!(
                "no {} found under {}; pass --unzbd", unzbd::UNZBD_EXE, cli.data.display()))),
        },
    };
    info!("using unzbd executable at {}", exe.display());
    Ok(Unzbd::new(exe))
}

fn run_unzbd(unzbd: &Unzbd, cs: &Path, unzbd_dir: &Path) -> anyhow::Result<()> {
    info!("extracting planes.zbd...");
    unzbd.gamez(&unzbd::planes_zbd(cs), &unzbd_dir.join("planes.zip"))?;

    info!("extracting gamez.zbd...");
    for c in CHAPTERS.iter() {
        unzbd.gamez(&unzbd::chapter_zbd(cs, c), &unzbd_dir.join(format!("{}.zip", c)))?;
    }

    info!("extracting texture.zbd...");
    let mut zips = Vec::new();
    for f in unzbd::find_texture_archives(cs) {
        let zip_path = unzbd_dir.join(unzbd::texture_zip_name(&f));
        unzbd.textures(&f, &zip_path)?;
        zips.push(zip_path);
    }
    unzbd::aggregate_textures(&zips, &unzbd_dir.join("textures.zip"))?;
    Ok(())
}

fn open_textures(unzbd_dir: &Path) -> anyhow::Result<Box<dyn TextureSource>> {
    let path = unzbd_dir.join("textures.zip");
    if !path.is_file() {
        warn!("{} is missing; all textured materials will use the placeholder color",
            path.display());
        return Ok(Box::new(NoTextures));
    }
    let textures = ZipTextures::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    info!("{} textures available", textures.len());
    Ok(Box::new(textures))
}

fn write_scene(
    data: &GamezData,
    textures: &mut dyn TextureSource,
    root: Option<usize>,
    name: &str,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let builder = SceneBuilder::new(data, textures);
    let scene = match root {
        Some(i) => builder.build_root(i)?,
        None => builder.build_forest()?,
    };
    let glb = gltf::write_glb(&scene, name)?;
    let path = out_dir.join(gltf::output_file_name(name));
    fs::write(&path, glb).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} objects)", path.display(), scene.objects.len());
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let unzbd = if cli.skip_unzbd { None } else { Some(find_unpacker(cli)?) };

    let unzbd_dir = cli.data.join("unzbd_output");
    fs::create_dir_all(&unzbd_dir)?;
    fs::create_dir_all(&cli.out)?;

    if let Some(unzbd) = &unzbd {
        run_unzbd(unzbd, &cli.cs, &unzbd_dir)?;
    }

    let mut textures = open_textures(&unzbd_dir)?;
    let mut failed = 0;

    if !cli.skip_planes {
        info!("generating plane scenes...");
        let path = unzbd_dir.join("planes.zip");
        let planes = GamezData::open(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for (i, name) in scene::root_scene_names(&planes) {
            info!("generating {}...", gltf::output_file_name(&name));
            if let Err(e) = write_scene(&planes, &mut *textures, Some(i), &name, &cli.out) {
                error!("{}: {:#}", name, e);
                failed += 1;
            }
        }
    }

    if !cli.skip_levels {
        info!("generating level scenes...");
        for c in CHAPTERS.iter() {
            info!("generating {}...", gltf::output_file_name(c));
            let result = GamezData::open(unzbd_dir.join(format!("{}.zip", c)))
                .map_err(anyhow::Error::from)
                .and_then(|level| write_scene(&level, &mut *textures, None, c, &cli.out));
            if let Err(e) = result {
                error!("{}: {:#}", c, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} scenes failed to convert", failed);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    crimson_convert::init_logging(cli.verbose);
    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
