//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name    = "varia",
    bin_name = "varia",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Reproducible experiment batches from one template",
    long_about = "Varia applies batch criteria to a template experiment definition \
                  (XML, YAML or TOML) and writes one directory per experiment, \
                  each with its rendered definition and a change log.",
    after_help = "EXAMPLES:\n\
        \x20 varia scaffold -t swarm.argos --criteria population_size.Log64 -o batch\n\
        \x20 varia scaffold -t sim.yaml --criteria population_size.Set2,4 \\\n\
        \x20     --criteria sweep.experiment@length=100,200 -o batch\n\
        \x20 varia query --experiment batch/exp3\n\
        \x20 varia criteria --format list",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a batch of experiments from a template.
    #[command(
        visible_alias = "s",
        about = "Scaffold an experiment batch",
        after_help = "EXAMPLES:\n\
            \x20 varia scaffold -t swarm.argos --criteria population_size.Log8 -o batch\n\
            \x20 varia scaffold -t swarm.argos --criteria population_size.Set4 -o batch \\\n\
            \x20     --runs 5 --seed 1000 --seed-path .//experiment --seed-attr random_seed\n\
            \x20 varia scaffold -t swarm.argos --criteria sweep.experiment@length=100,200 \\\n\
            \x20     -o batch --dry-run"
    )]
    Scaffold(ScaffoldArgs),

    /// List the available batch criteria categories.
    #[command(
        visible_alias = "ls",
        about = "List batch criteria categories",
        after_help = "EXAMPLES:\n\
            \x20 varia criteria\n\
            \x20 varia criteria --format json"
    )]
    Criteria(CriteriaArgs),

    /// Read back what a scaffolded experiment or batch was given.
    #[command(
        visible_alias = "q",
        about = "Query change logs",
        after_help = "EXAMPLES:\n\
            \x20 varia query --experiment batch/exp2\n\
            \x20 varia query --experiment batch/exp2 --path .//experiment --attr length\n\
            \x20 varia query --batch batch --criteria population_size.Log8"
    )]
    Query(QueryArgs),

    /// Initialise a Varia configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 varia init           # platform config location\n\
            \x20 varia init --local   # .varia.toml in the current directory"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 varia completions bash > ~/.local/share/bash-completion/completions/varia\n\
            \x20 varia completions zsh  > ~/.zfunc/_varia\n\
            \x20 varia completions fish > ~/.config/fish/completions/varia.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the Varia configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 varia config get scaffold.overwrite\n\
            \x20 varia config list\n\
            \x20 varia config path"
    )]
    Config(ConfigCommands),
}

// ── scaffold ──────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScaffoldArgs {
    /// Template experiment definition; the extension picks the format.
    #[arg(
        short = 't',
        long = "template",
        value_name = "FILE",
        help = "Template definition (.xml, .argos, .launch, .yaml, .yml, .toml)"
    )]
    pub template: PathBuf,

    /// One criteria spec for a univariate batch, two for a bivariate one.
    #[arg(
        long = "criteria",
        value_name = "SPEC",
        required = true,
        action = clap::ArgAction::Append,
        help = "Batch criteria, e.g. population_size.Log64 (repeat once for bivariate)"
    )]
    pub criteria: Vec<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Batch root directory"
    )]
    pub output: PathBuf,

    /// Regenerate into an existing batch root.
    #[arg(long = "force", help = "Overwrite an existing batch")]
    pub force: bool,

    /// Print the experiments and their changes without writing anything.
    #[arg(long = "dry-run", help = "Show what would be created without creating")]
    pub dry_run: bool,

    #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt")]
    pub yes: bool,

    /// TOML manifest of `[[write]]` tables; defaults to writing the whole tree.
    #[arg(
        long = "write-specs",
        value_name = "FILE",
        help = "Write-spec manifest for multi-file output"
    )]
    pub write_specs: Option<PathBuf>,

    /// Render each experiment this many times, suffixed `_run<i>`.
    #[arg(
        long = "runs",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of runs per experiment"
    )]
    pub runs: Option<u32>,

    /// Seed of run 0; run i gets `seed + i`.
    #[arg(
        long = "seed",
        value_name = "N",
        requires = "runs",
        help = "Base random seed for runs"
    )]
    pub seed: Option<u64>,

    #[arg(
        long = "seed-path",
        value_name = "PATH",
        requires = "seed",
        requires = "seed_attr",
        help = "Element that receives each run's seed"
    )]
    pub seed_path: Option<String>,

    #[arg(
        long = "seed-attr",
        value_name = "ATTR",
        requires = "seed_path",
        help = "Attribute that receives each run's seed"
    )]
    pub seed_attr: Option<String>,
}

// ── criteria ──────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CriteriaArgs {
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `criteria` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One category per line.
    List,
    /// JSON array.
    Json,
    /// CSV rows.
    Csv,
}

// ── query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["experiment", "batch"])
))]
pub struct QueryArgs {
    /// One experiment directory.
    #[arg(long = "experiment", value_name = "DIR")]
    pub experiment: Option<PathBuf>,

    /// A batch root; needs the criteria it was scaffolded with.
    #[arg(long = "batch", value_name = "DIR", requires = "criteria")]
    pub batch: Option<PathBuf>,

    #[arg(
        long = "criteria",
        value_name = "SPEC",
        action = clap::ArgAction::Append,
        requires = "batch",
        help = "Criteria the batch was scaffolded with"
    )]
    pub criteria: Vec<String>,

    /// Element path of the attribute to read.
    #[arg(long = "path", value_name = "PATH", requires = "attr")]
    pub path: Option<String>,

    #[arg(long = "attr", value_name = "ATTR", requires = "path")]
    pub attr: Option<String>,
}

// ── init ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write `.varia.toml` in the current directory.
    #[arg(
        long = "local",
        help = "Create local configuration in current directory"
    )]
    pub local: bool,

    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `scaffold.overwrite`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
