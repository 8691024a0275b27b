use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod fetch;
mod images;
mod normalize;
mod output;
mod overrides;
mod types;
mod utils;

use fetch::WikiClient;
use overrides::OverrideTable;
use utils::osc8_file_link;

pub const WIKI_BASE: &str = "https://oldschool.runescape.wiki";
pub const USER_AGENT: &str = "osrs-dps-calc (https://github.com/weirdgloop/osrs-dps-calc)";
pub const PAGE_SIZE: u64 = 500;

const DEFAULT_OUTPUT: &str = "cdn/json/monsters.json";
const DEFAULT_IMAGE_DIR: &str = "cdn/monsters";

/// Properties requested for every monster, in query order.
pub const REQUIRED_PRINTOUTS: &[&str] = &[
    "Attack bonus",
    "Attack level",
    "Attack speed",
    "Attack style",
    "Combat level",
    "Crush defence bonus",
    "Defence level",
    "Hitpoints",
    "Image",
    "Immune to poison",
    "Immune to venom",
    "Magic Damage bonus",
    "Magic attack bonus",
    "Magic defence bonus",
    "Magic level",
    "Max hit",
    "Monster attribute",
    "Name",
    "Range attack bonus",
    "Ranged Strength bonus",
    "Range defence bonus",
    "Ranged level",
    "Slash defence bonus",
    "Slayer category",
    "Slayer experience",
    "Stab defence bonus",
    "Strength bonus",
    "Strength level",
    "Size",
    "NPC ID",
    "Category",
];

#[derive(Parser)]
#[command(name = "osrs-monsters")]
#[command(about = "Build monsters.json and monster images from the OSRS Wiki")]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Print per-record detail
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WikiArgs {
    /// Wiki base URL
    #[arg(long, default_value = WIKI_BASE)]
    wiki: String,
    /// Image directory (also the download cache)
    #[arg(long, default_value = DEFAULT_IMAGE_DIR)]
    images: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all monsters, write monsters.json, then download images
    Generate {
        /// Output JSON file
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// Extra skill overrides (CONL)
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Don't download images
        #[arg(long)]
        skip_images: bool,
        #[command(flatten)]
        wiki: WikiArgs,
    },
    /// Download images referenced by an existing monsters.json
    Images {
        /// Monsters JSON file to read image names from
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        input: PathBuf,
        #[command(flatten)]
        wiki: WikiArgs,
    },
    /// Remove monsters.json and the image directory
    Clean {
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_IMAGE_DIR)]
        images: PathBuf,
    },
}

fn init_tracing(quiet: bool, verbose: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_images(client: &WikiClient, names: &BTreeSet<String>, dir: &Path) -> Result<()> {
    let stats = images::download_all(client, names, dir)?;
    println!(
        "Images in {}: {} saved, {} skipped (already exists), {} failed",
        osc8_file_link(dir, &dir.to_string_lossy()),
        stats.succeeded,
        stats.skipped,
        stats.failed
    );
    Ok(())
}

fn run_generate(
    output_path: &Path,
    overrides_path: Option<&Path>,
    skip_images: bool,
    wiki: &WikiArgs,
) -> Result<()> {
    // Read overrides before any network traffic so a bad file fails fast
    let overrides = match overrides_path {
        Some(path) => OverrideTable::load_with(path)?,
        None => OverrideTable::builtin(),
    };
    info!("Loaded {} skill overrides", overrides.len());

    let client = WikiClient::new(&wiki.wiki)?;
    let raw = fetch::fetch_all(&client)?;
    let normalized = normalize::normalize(&raw, &overrides);
    drop(raw);

    output::write_monsters(output_path, &normalized.monsters)?;
    println!(
        "Saved {} monsters to {} ({} skipped)",
        normalized.monsters.len(),
        osc8_file_link(output_path, &output_path.to_string_lossy()),
        normalized.skipped
    );

    if skip_images {
        println!("Skipping {} images", normalized.images.len());
        return Ok(());
    }
    run_images(&client, &normalized.images, &wiki.images)
}

/// Image names referenced by an existing monsters file.
fn images_in_file(input: &Path) -> Result<BTreeSet<String>> {
    let monsters = output::read_monsters(input)?;
    let names = images::required_images(monsters.iter().map(|m| m.image.as_str()));
    info!("{} monsters reference {} images", monsters.len(), names.len());
    Ok(names)
}

fn run_images_from_file(input: &Path, wiki: &WikiArgs) -> Result<()> {
    let names = images_in_file(input)?;
    let client = WikiClient::new(&wiki.wiki)?;
    run_images(&client, &names, &wiki.images)
}

fn run_clean(output: &Path, images: &Path) -> Result<()> {
    println!("Cleaning generated files...");

    if output.exists() {
        fs::remove_file(output)?;
        println!("  Removed {}", output.display());
    }

    if images.exists() {
        fs::remove_dir_all(images)?;
        println!("  Removed {}/", images.display());
    }

    println!("Clean complete!");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Generate {
            output,
            overrides,
            skip_images,
            wiki,
        } => run_generate(&output, overrides.as_deref(), skip_images, &wiki),
        Commands::Images { input, wiki } => run_images_from_file(&input, &wiki),
        Commands::Clean { output, images } => run_clean(&output, &images),
    }
}
