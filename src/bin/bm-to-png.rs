use std::path::PathBuf;
use anyhow::bail;
use clap::Parser;
use crimson_convert::bm;

/// Convert `.bm` paint bitmaps to PNGs.  Each `<name>.bm` becomes `<name>-base.png`,
/// `<name>-color1.png` to `<name>-color3.png` and `<name>-specular.png` next to it.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// A `.bm` file, or a folder to search recursively
    #[arg(default_value = ".")]
    path: PathBuf,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.path.is_file() {
        for png in bm::convert_file(&cli.path)? {
            println!("{}", png.display());
        }
        return Ok(());
    }

    let report = bm::convert_tree(&cli.path)?;
    for f in &report.failures {
        eprintln!("{}: {}", f.path.display(), f.error);
    }
    if !report.is_clean() {
        bail!("{} of {} bitmaps could not be converted",
            report.failures.len(), report.converted + report.failures.len());
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
