use std::io::{self, Write};
use std::path::PathBuf;
use clap::Parser;
use crimson_convert::dump;
use crimson_convert::gamez::GamezData;
use crimson_convert::scene::SceneBuilder;
use crimson_convert::texture::{NoTextures, TextureSource, ZipTextures};

/// Print the object tree built from an unzbd gamez zip.
#[derive(Parser)]
struct Cli {
    /// `planes.zip` or a chapter zip
    gamez: PathBuf,

    /// Build only the tree under this node index
    #[arg(long)]
    root: Option<usize>,

    /// Aggregated `textures.zip`, used to detect translucent textures
    #[arg(long)]
    textures: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let data = GamezData::open(&cli.gamez)?;
    let mut textures: Box<dyn TextureSource> = match &cli.textures {
        Some(path) => Box::new(ZipTextures::open(path)?),
        None => Box::new(NoTextures),
    };

    let builder = SceneBuilder::new(&data, &mut *textures);
    let scene = match cli.root {
        Some(i) => builder.build_root(i)?,
        None => builder.build_forest()?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump::dump_scene(&mut out, &scene)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    crimson_convert::init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
