//! Cortexpack: brain data views in one self-contained file.
//!
//! A [`Dataset`] is an ordered, named collection of [`View`](data::View)s over
//! volume or surface-vertex data. Saving writes it to a single package file
//! where identical data is stored once, and can optionally pack the subject
//! surfaces, transforms and masks the views refer to so the file is usable
//! without the original subject database.
//!
//! # Modules
//!
//! - [`data`]: Brain data, views, arrays and subject resource types
//! - [`package`]: The hierarchical container and its zip file format
//! - [`database`]: Subject databases (directory store, packed subjects, resolver chain)
//! - [`dataset`]: The dataset itself, input normalization and resource packing
//! - [`manifest`]: JSON manifests for building datasets from `.npy` files
//! - [`validation`]: Package validation and error reporting
//! - [`inspect`]: Package summaries
//! - [`logging`]: Subscriber setup for the CLI
//! - [`error`]: Error types for cortexpack operations

pub mod data;
pub mod database;
pub mod dataset;
pub mod error;
pub mod inspect;
pub mod logging;
pub mod manifest;
pub mod package;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};

pub use dataset::{normalize, Dataset, Input, Normalized};
pub use error::CortexError;

use database::{Filestore, Resolver, SubjectDatabase};

/// The cortexpack CLI application.
#[derive(Parser)]
#[command(name = "cortexpack")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log output (-v for info, -vv for debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Subject database directory used to resolve and pack resources.
    #[arg(long, env = "CORTEXPACK_FILESTORE", global = true, value_name = "DIR")]
    filestore: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a package from a JSON manifest.
    Build(BuildArgs),
    /// Pack subject resources into a package.
    Pack(PackArgs),
    /// Merge several packages into one.
    Merge(MergeArgs),
    /// Show a summary of a package.
    Inspect(InspectArgs),
    /// Validate a package for errors and warnings.
    Validate(ValidateArgs),
}

/// Arguments for the build subcommand.
#[derive(clap::Args)]
struct BuildArgs {
    /// Manifest describing the views.
    manifest: PathBuf,

    /// Package file to write.
    #[arg(short, long)]
    output: PathBuf,

    /// Pack subjects, transforms and masks from the filestore.
    #[arg(long)]
    pack: bool,
}

/// Arguments for the pack subcommand.
#[derive(clap::Args)]
struct PackArgs {
    /// Package to pack.
    input: PathBuf,

    /// Write to this file instead of updating the input.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the merge subcommand.
#[derive(clap::Args)]
struct MergeArgs {
    /// Packages to merge; later views replace earlier ones of the same name.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Package file to write.
    #[arg(short, long)]
    output: PathBuf,

    /// Prefix for view names, given once per input in order.
    #[arg(long = "prefix")]
    prefixes: Vec<String>,

    /// Pack subject resources from the inputs and the filestore. Without
    /// this, the output relies on a subject database.
    #[arg(long)]
    pack: bool,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Package to inspect.
    input: PathBuf,

    /// Output format for the report.
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,

    /// Maximum number of views to list.
    #[arg(long, default_value_t = 50)]
    max_views: usize,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Package to validate.
    input: PathBuf,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report.
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

/// Run the cortexpack CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CortexError> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let filestore = cli.filestore.as_deref().map(open_filestore).transpose()?;
    let db = filestore.as_ref().map(|f| f as &dyn SubjectDatabase);

    match cli.command {
        Some(Commands::Build(args)) => run_build(args, db),
        Some(Commands::Pack(args)) => run_pack(args, db),
        Some(Commands::Merge(args)) => run_merge(args, db),
        Some(Commands::Inspect(args)) => run_inspect(args, db),
        Some(Commands::Validate(args)) => run_validate(args),
        None => {
            println!("cortexpack {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Brain data views in one self-contained file.");
            println!();
            println!("Run 'cortexpack --help' for usage information.");
            Ok(())
        }
    }
}

fn open_filestore(root: &Path) -> Result<Filestore, CortexError> {
    if !root.is_dir() {
        return Err(CortexError::InvalidArguments(format!(
            "filestore '{}' is not a directory",
            root.display()
        )));
    }
    Ok(Filestore::new(root))
}

fn require_filestore(db: Option<&dyn SubjectDatabase>) -> Result<&dyn SubjectDatabase, CortexError> {
    db.ok_or_else(|| {
        CortexError::InvalidArguments(
            "packing needs --filestore or CORTEXPACK_FILESTORE".to_string(),
        )
    })
}

fn print_saved(verb: &str, ds: &Dataset, path: &Path) {
    println!(
        "{} {} view(s) ({} unique data) into {}",
        verb,
        ds.len(),
        ds.uniques().len(),
        path.display()
    );
}

/// Execute the build subcommand.
fn run_build(args: BuildArgs, db: Option<&dyn SubjectDatabase>) -> Result<(), CortexError> {
    let pack = if args.pack { Some(require_filestore(db)?) } else { None };

    let mut ds = manifest::Manifest::from_file(&args.manifest)?.build()?;
    ds.save(Some(&args.output), pack)?;

    print_saved("Built", &ds, &args.output);
    Ok(())
}

/// Execute the pack subcommand.
fn run_pack(args: PackArgs, db: Option<&dyn SubjectDatabase>) -> Result<(), CortexError> {
    let db = require_filestore(db)?;
    let (mut ds, skipped) = Dataset::from_file_with(&args.input, Some(db))?;
    if !skipped.is_empty() {
        tracing::warn!(count = skipped.len(), "entries without metadata are dropped on save");
    }

    let output = args.output.unwrap_or_else(|| args.input.clone());
    ds.save(Some(&output), Some(db))?;

    print_saved("Packed", &ds, &output);
    Ok(())
}

/// Execute the merge subcommand.
fn run_merge(args: MergeArgs, db: Option<&dyn SubjectDatabase>) -> Result<(), CortexError> {
    if !args.prefixes.is_empty() && args.prefixes.len() != args.inputs.len() {
        return Err(CortexError::InvalidArguments(format!(
            "{} prefix(es) given for {} input(s)",
            args.prefixes.len(),
            args.inputs.len()
        )));
    }

    let mut sources = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let (loaded, _) = Dataset::from_file_with(input, db)?;
        tracing::info!(input = %input.display(), views = loaded.len(), "merging");
        sources.push(loaded);
    }

    let mut merged = Dataset::new();
    for (i, source) in sources.iter().enumerate() {
        let prefix = args.prefixes.get(i).map(String::as_str).unwrap_or("");
        merged.append("", source.prepend(prefix)?)?;
    }

    if args.pack {
        // Inputs' own packed subjects first, then the filestore.
        let mut resolver = Resolver::new();
        for source in &sources {
            resolver = resolver.with_source(source);
        }
        if let Some(db) = db {
            resolver = resolver.with_source(db);
        }
        merged.save(Some(&args.output), Some(&resolver as &dyn SubjectDatabase))?;
    } else {
        merged.save(Some(&args.output), None)?;
    }

    print_saved("Merged", &merged, &args.output);
    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs, db: Option<&dyn SubjectDatabase>) -> Result<(), CortexError> {
    let (ds, skipped) = Dataset::from_file_with(&args.input, db)?;
    let opts = inspect::InspectOptions {
        max_views: args.max_views,
    };
    let report = inspect::inspect_dataset(&ds, skipped.len(), &opts);

    match args.output.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report).map_err(|source| CortexError::Json {
                context: "inspect report".to_string(),
                source,
            })?;
            println!("{}", json);
        }
        _ => print!("{}", report),
    }
    Ok(())
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), CortexError> {
    let package = package::Package::open(&args.input)?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate_package(&package, &opts);

    match args.output.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report.to_json()).map_err(|source| {
                CortexError::Json {
                    context: "validation report".to_string(),
                    source,
                }
            })?;
            println!("{}", json);
        }
        _ => print!("{}", report),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (args.strict && has_warnings) {
        Err(CortexError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}
