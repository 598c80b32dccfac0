// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod emulator;
mod pipeline;
mod size_limited_writer;
mod toolchain;
mod workspace;

use clap::{Parser, Subcommand, ValueEnum};
use pipeline::{Pipeline, RunStatus};
use rvdiff_config::{Catalog, ConflictPolicy, CoreProfile, RunConfig, MAX_EXTENSION_RV64};
use rvdiff_core::diff::{compare_outputs, DiffOptions};
use rvdiff_core::metrics::CampaignMetrics;
use rvdiff_core::output::ExecutionOutput;
use rvdiff_core::EmulatorType;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

const EXIT_PASS: u8 = 0;
const EXIT_DIFF: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RvDiff - differential testing of RISC-V cores against Spike",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    /// Fragment/profile catalog (YAML) merged over the built-ins
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Tool locations and limits (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and compose core profiles.
    Profile(ProfileArgs),

    /// Print the -march string of a profile.
    March {
        profile: String,
    },

    /// Build a program and run it on one emulator.
    Emulate(EmulateArgs),

    /// Build a program, run it on Spike and Rocket and compare.
    Run(RunArgs),

    /// Generate random programs and compare them in parallel.
    Random(RandomArgs),

    /// Compare two saved `<emulator>_output.json` files.
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
struct ProfileArgs {
    #[command(subcommand)]
    command: ProfileCommands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(Subcommand, Debug)]
enum ProfileCommands {
    /// List named profiles with their -march strings.
    List,

    /// Print a resolved profile.
    Show {
        name: String,
        #[arg(long, value_enum, default_value = "yaml")]
        format: Format,
    },

    /// Compose fragments left to right into a profile.
    Compose {
        #[arg(short = 'f', long = "fragment", required = true, num_args = 1..)]
        fragments: Vec<String>,
        #[arg(long, default_value = "Custom")]
        name: String,
        /// Fail on conflicting fragments instead of letting later ones win
        #[arg(long)]
        strict: bool,
        #[arg(long, value_enum, default_value = "yaml")]
        format: Format,
    },
}

#[derive(Parser, Debug)]
struct EmulateArgs {
    /// Assembly file (.s or .S)
    #[arg(short, long)]
    assembly: PathBuf,

    #[arg(short, long)]
    emulator: EmulatorType,

    #[arg(short, long, default_value = MAX_EXTENSION_RV64)]
    profile: String,

    #[arg(short, long, default_value = "emulate_build")]
    build_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Assembly file (.s or .S)
    #[arg(short, long)]
    assembly: PathBuf,

    #[arg(short, long, default_value = MAX_EXTENSION_RV64)]
    profile: String,

    #[arg(short, long, default_value = "build")]
    build_dir: PathBuf,

    /// Do not retry without Rocket-only illegal instructions
    #[arg(long)]
    no_retry: bool,

    /// Also compare counters and identification CSRs
    #[arg(long)]
    strict_csrs: bool,
}

#[derive(Parser, Debug)]
struct RandomArgs {
    #[arg(short, long, default_value = MAX_EXTENSION_RV64)]
    profile: String,

    /// Instructions generated per extension
    #[arg(short = 'n', long, default_value = "50")]
    inst_num: usize,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Number of tests (default: one per worker)
    #[arg(long)]
    tests: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Fixed output directory
    #[arg(long, conflicts_with = "workspace_dir")]
    output_dir: Option<PathBuf>,

    /// Directory receiving a fresh fuzz_<timestamp>_<id> directory
    #[arg(long)]
    workspace_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DiffArgs {
    first: PathBuf,
    second: PathBuf,

    /// Write the diff here (.json for JSON, anything else for Markdown)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also compare counters and identification CSRs
    #[arg(long)]
    strict_csrs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let catalog = match load_catalog(cli.catalog.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match cli.command {
        Commands::Profile(args) => run_profile(&catalog, args.command),
        Commands::March { profile } => match catalog.resolve(&profile) {
            Ok(p) => {
                println!("{}", p.march());
                ExitCode::from(EXIT_PASS)
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::from(EXIT_CONFIG_ERROR)
            }
        },
        Commands::Emulate(args) => run_emulate(&catalog, cli.config.as_deref(), args),
        Commands::Run(args) => run_compare(&catalog, cli.config.as_deref(), args),
        Commands::Random(args) => run_random(&catalog, cli.config.as_deref(), args),
        Commands::Diff(args) => run_diff(args),
    }
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    match path {
        Some(p) => {
            info!("Loading catalog: {}", p.display());
            Catalog::load_with_builtins(p)
        }
        None => Ok(Catalog::builtin()),
    }
}

fn load_run_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(p) => RunConfig::from_file(p),
        None => Ok(RunConfig::default()),
    }
}

/// Everything a build/run command needs before any tool is started.
fn prepare(
    catalog: &Catalog,
    config: Option<&Path>,
    profile: &str,
) -> Result<(CoreProfile, RunConfig), ExitCode> {
    let profile = catalog.resolve(profile).map_err(|e| {
        error!("{}", e);
        ExitCode::from(EXIT_CONFIG_ERROR)
    })?;
    let config = load_run_config(config).map_err(|e| {
        error!("{:#}", e);
        ExitCode::from(EXIT_CONFIG_ERROR)
    })?;
    info!("Profile {} ({})", profile.name, profile.march());
    Ok((profile, config))
}

fn check_assembly(path: &Path) -> Result<(), ExitCode> {
    if !path.exists() {
        error!("Assembly file does not exist: {}", path.display());
        return Err(ExitCode::from(EXIT_CONFIG_ERROR));
    }
    if !toolchain::is_assembly(path) {
        error!("Assembly file must have .s or .S extension: {}", path.display());
        return Err(ExitCode::from(EXIT_CONFIG_ERROR));
    }
    Ok(())
}

#[derive(Serialize)]
struct ProfileView<'a> {
    #[serde(flatten)]
    profile: &'a CoreProfile,
    march: String,
}

fn print_profile(profile: &CoreProfile, format: Format) -> ExitCode {
    let view = ProfileView {
        profile,
        march: profile.march(),
    };
    let rendered = match format {
        Format::Yaml => serde_yaml::to_string(&view).map_err(anyhow::Error::from),
        Format::Json => serde_json::to_string_pretty(&view).map_err(anyhow::Error::from),
    };
    match rendered {
        Ok(text) => {
            println!("{}", text.trim_end());
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Failed to render profile: {:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_profile(catalog: &Catalog, command: ProfileCommands) -> ExitCode {
    match command {
        ProfileCommands::List => {
            let mut status = EXIT_PASS;
            for name in catalog.profile_names() {
                match catalog.resolve(name) {
                    Ok(p) => println!("{:<28} {}", name, p.march()),
                    Err(e) => {
                        warn!("Profile {} does not resolve: {}", name, e);
                        status = EXIT_CONFIG_ERROR;
                    }
                }
            }
            ExitCode::from(status)
        }
        ProfileCommands::Show { name, format } => match catalog.resolve(&name) {
            Ok(p) => print_profile(&p, format),
            Err(e) => {
                error!("{}", e);
                ExitCode::from(EXIT_CONFIG_ERROR)
            }
        },
        ProfileCommands::Compose {
            fragments,
            name,
            strict,
            format,
        } => {
            let policy = strict.then_some(ConflictPolicy::FailFast);
            match catalog.composer(policy).compose(&name, &fragments) {
                Ok(p) => print_profile(&p, format),
                Err(e) => {
                    error!("{}", e);
                    ExitCode::from(EXIT_CONFIG_ERROR)
                }
            }
        }
    }
}

fn run_emulate(catalog: &Catalog, config: Option<&Path>, args: EmulateArgs) -> ExitCode {
    if let Err(code) = check_assembly(&args.assembly) {
        return code;
    }
    let (profile, config) = match prepare(catalog, config, &args.profile) {
        Ok(v) => v,
        Err(code) => return code,
    };

    match Pipeline::new(&profile, &config).emulate(&args.build_dir, &args.assembly, args.emulator) {
        Ok(output) => {
            info!(
                "{}: {} exception(s), register dump {}",
                output.emulator,
                output.exceptions.len(),
                if output.register_dump.is_some() {
                    "present"
                } else {
                    "missing"
                }
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_compare(catalog: &Catalog, config: Option<&Path>, args: RunArgs) -> ExitCode {
    if let Err(code) = check_assembly(&args.assembly) {
        return code;
    }
    let (profile, config) = match prepare(catalog, config, &args.profile) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let options = if args.strict_csrs {
        DiffOptions::strict()
    } else {
        DiffOptions::default()
    };

    let pipeline = Pipeline::new(&profile, &config)
        .diff_options(options)
        .retry(!args.no_retry);
    match pipeline.process(&args.build_dir, &args.assembly) {
        Ok(record) if record.status == RunStatus::Pass => {
            info!("No differences between Spike and Rocket");
            ExitCode::from(EXIT_PASS)
        }
        Ok(record) => {
            warn!(
                "Differences found: {} exception difference(s), registers {:?}",
                record.exception_differences, record.differing_registers
            );
            ExitCode::from(EXIT_DIFF)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_random(catalog: &Catalog, config: Option<&Path>, args: RandomArgs) -> ExitCode {
    let (profile, config) = match prepare(catalog, config, &args.profile) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let jobs = args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let tests = args.tests.unwrap_or(jobs);
    let root = workspace::resolve_output_dir(args.output_dir, args.workspace_dir);

    let pipeline = Pipeline::new(&profile, &config);
    let metrics = CampaignMetrics::new();
    let result = workspace::Campaign::new(&pipeline, tests, jobs, args.inst_num)
        .seed(args.seed)
        .run(&root, &metrics);

    match result {
        Ok(summary) if summary.diffed > 0 => ExitCode::from(EXIT_DIFF),
        Ok(summary) if summary.failed > 0 => ExitCode::from(EXIT_RUNTIME_ERROR),
        Ok(_) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_diff(args: DiffArgs) -> ExitCode {
    let load = |p: &Path| {
        ExecutionOutput::load_json(p).map_err(|e| {
            error!("Failed to load {}: {}", p.display(), e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        })
    };
    let (first, second) = match (load(&args.first), load(&args.second)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(code), _) | (_, Err(code)) => return code,
    };
    let options = if args.strict_csrs {
        DiffOptions::strict()
    } else {
        DiffOptions::default()
    };

    let diff = compare_outputs(&first, &second, &options);
    println!("{}", diff);

    if let Some(out) = &args.output {
        let written = if out.extension().is_some_and(|e| e == "json") {
            std::fs::File::create(out)
                .map_err(anyhow::Error::from)
                .and_then(|f| serde_json::to_writer_pretty(f, &diff).map_err(anyhow::Error::from))
        } else {
            std::fs::write(out, diff.to_string()).map_err(anyhow::Error::from)
        };
        if let Err(e) = written {
            error!("Failed to write {}: {:#}", out.display(), e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
        info!("Diff written to {}", out.display());
    }

    if diff.is_empty() {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_DIFF)
    }
}
