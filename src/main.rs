use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use rayon::prelude::*;
use s4pi_rcol::{Package, RcolContainer, ResourceKey};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "rcol-check", about = "Inspect and verify RCOL resources")]
struct Cli {
    /// Log parse decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, chunks and external references of a raw RCOL file
    Inspect { input: PathBuf },
    /// Verify that every RCOL resource in a folder of packages round-trips
    Scan {
        folder: PathBuf,
        /// Worker threads (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Parse a raw RCOL file and write it back out
    Roundtrip { input: PathBuf, output: PathBuf },
}

#[derive(Debug, Default, Clone, Copy)]
struct ScanReport {
    packages: usize,
    resources: usize,
    valid: usize,
    invalid: usize,
    mismatched: usize,
    failed: usize,
}

impl AddAssign for ScanReport {
    fn add_assign(&mut self, other: Self) {
        self.packages += other.packages;
        self.resources += other.resources;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.mismatched += other.mismatched;
        self.failed += other.failed;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    match cli.command {
        Commands::Inspect { input } => run_inspect(&input),
        Commands::Scan { folder, jobs } => {
            if let Some(jobs) = jobs {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("Failed to configure worker threads")?;
            }
            let report = run_scan(&folder)?;
            if report.mismatched > 0 {
                return Err(anyhow!("{} resources did not round-trip", report.mismatched));
            }
            Ok(())
        }
        Commands::Roundtrip { input, output } => run_roundtrip(&input, &output),
    }
}

fn run_inspect(path: &Path) -> Result<()> {
    info!("Inspecting: {:?}", path);
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let rcol = RcolContainer::parse(&data)?;

    if !rcol.is_valid() {
        println!("{}: not a well-formed RCOL container ({} bytes)", path.display(), data.len());
        return Ok(());
    }

    println!("Version: {}", rcol.version());
    println!("Public chunks: {}", rcol.public_chunks());
    println!("Unused: 0x{:08X}", rcol.unused());
    println!("\nChunks ({}):", rcol.chunks().len());
    for (i, entry) in rcol.chunks().iter().enumerate() {
        println!(
            "  [{:>3}] {} {} {:<7} {} bytes  ref={}",
            i,
            entry.tgi,
            entry.block.tag(),
            if entry.block.is_known_type() { "known" } else { "unknown" },
            entry.block.len(),
            rcol.chunk_reference(i)
        );
    }
    println!("\nExternal resources ({}):", rcol.external_resources().len());
    for (i, tgi) in rcol.external_resources().iter().enumerate() {
        println!("  [{:>3}] {}", i, tgi);
    }
    Ok(())
}

fn run_roundtrip(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    let rcol = RcolContainer::parse(&data)?;
    if !rcol.is_valid() {
        warn!("{:?} is not a well-formed RCOL container, copying it unchanged", input);
    }
    let written = rcol.serialize();
    std::fs::write(output, &written).with_context(|| format!("Failed to write {:?}", output))?;
    if written == data {
        info!("Round-trip identical ({} bytes)", written.len());
    } else {
        warn!("Round-trip differs: {} bytes in, {} bytes out", data.len(), written.len());
    }
    Ok(())
}

fn run_scan(folder: &Path) -> Result<ScanReport> {
    info!("Searching for .package files in: {:?}", folder);
    let packages: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "package"))
        .collect();

    if packages.is_empty() {
        warn!("No .package files found.");
        return Ok(ScanReport::default());
    }
    info!("Found {} packages.", packages.len());

    let report = packages
        .par_iter()
        .map(|path| match scan_package(path) {
            Ok(report) => report,
            Err(e) => {
                error!("Skipping {:?}: {:#}", path, e);
                ScanReport::default()
            }
        })
        .reduce(ScanReport::default, |mut acc, r| {
            acc += r;
            acc
        });

    println!("\n--- Scan Summary ---");
    println!("Packages scanned: {}", report.packages);
    println!("RCOL resources:   {}", report.resources);
    println!("Valid:            {}", report.valid);
    println!("Invalid:          {}", report.invalid);
    println!("Block errors:     {}", report.failed);
    println!("Mismatched:       {}", report.mismatched);
    Ok(report)
}

fn scan_package(path: &Path) -> Result<ScanReport> {
    let mut pkg = Package::open(path)?;
    let entries: Vec<_> = pkg.rcol_entries().cloned().collect();
    let mut report = ScanReport { packages: 1, ..Default::default() };

    for entry in &entries {
        report.resources += 1;
        let data = match pkg.read_raw_resource(entry) {
            Ok(data) => data,
            Err(e) => {
                warn!("{}: {}: {:#}", path.display(), describe(&entry.key), e);
                report.failed += 1;
                continue;
            }
        };
        match RcolContainer::parse(&data) {
            Ok(rcol) => {
                if rcol.is_valid() {
                    report.valid += 1;
                } else {
                    report.invalid += 1;
                }
                if rcol.serialize() != data {
                    error!("{}: {} does not round-trip", path.display(), describe(&entry.key));
                    report.mismatched += 1;
                }
            }
            Err(e) => {
                warn!("{}: {}: {}", path.display(), describe(&entry.key), e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

fn describe(key: &ResourceKey) -> String {
    format!("{:08X}:{:08X}:{:016X}", key.res_type, key.res_group, key.instance)
}
