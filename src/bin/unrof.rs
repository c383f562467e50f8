use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use crimson_convert::bm;
use crimson_convert::rof::{RofEntry, RofFile};

/// Extract a Crimson Skies `.rof` archive.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// The archive, e.g. `GOSDATA/ASSETS/crimson.rof`
    archive: PathBuf,

    /// Output folder.  Deleted and recreated if it exists.
    #[arg(long, default_value = "rof_output")]
    out: PathBuf,

    /// Print the directory tree instead of extracting
    #[arg(long)]
    list: bool,

    /// After extracting, convert every `.bm` bitmap to PNGs next to it
    #[arg(long)]
    bm: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let file = File::open(&cli.archive)
        .with_context(|| format!("failed to open {}", cli.archive.display()))?;
    let mut rof = RofFile::new(BufReader::new(file));
    let name = cli.out.to_string_lossy().into_owned();
    let root = rof.read_tree(RofEntry::root(name, 0))
        .with_context(|| format!("failed to read directory of {}", cli.archive.display()))?;
    info!("found {} files", root.file_count());

    if cli.list {
        for (path, entry) in root.walk() {
            if entry.is_dir {
                println!("{}/", path);
            } else {
                println!("{}\t{}{}", path, entry.length,
                    if entry.is_compressed { " (compressed)" } else { "" });
            }
        }
        return Ok(());
    }

    let report = rof.write_tree(&root, &cli.out)?;
    for f in &report.failures {
        eprintln!("{}: {}", f.path.display(), f.error);
    }

    let mut bm_failures = 0;
    if cli.bm {
        let bm_report = bm::convert_tree(&cli.out)?;
        for f in &bm_report.failures {
            eprintln!("{}: {}", f.path.display(), f.error);
        }
        bm_failures = bm_report.failures.len();
    }

    if !report.is_clean() {
        bail!("{} of {} files could not be extracted",
            report.failures.len(), root.file_count());
    }
    if bm_failures > 0 {
        bail!("{} bitmaps could not be converted", bm_failures);
    }
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
