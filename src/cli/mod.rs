//! AF-018: CLI subcommands: init, validate, build, graph, diff, completions.

use crate::core::assembler::render;
use crate::core::catalog::TypeCatalog;
use crate::core::config::{self, ValidationError};
use crate::core::discovery::DiscoverOptions;
use crate::core::error::Error;
use crate::core::output;
use crate::core::pipeline::{self, Build};
use crate::core::types::ProjectConfig;
use crate::core::validate::validate_document;
use crate::diff::differ;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "armforge",
    version,
    about = "Typed Rust source to ARM deployment templates: static discovery, deterministic order"
)]
pub struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new armforge project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate armforge.yaml and the resource graph without writing anything
    Validate {
        /// Path to armforge.yaml
        #[arg(short, long, default_value = "armforge.yaml")]
        file: PathBuf,
    },

    /// Build the deployment template
    Build {
        /// Path to armforge.yaml
        #[arg(short, long, default_value = "armforge.yaml")]
        file: PathBuf,

        /// Override the artifact path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the template instead of writing it
        #[arg(long)]
        stdout: bool,

        /// Fail if the artifact on disk is out of date (for CI)
        #[arg(long, conflicts_with = "stdout")]
        check: bool,
    },

    /// Show the resolved creation order and edges
    Graph {
        /// Path to armforge.yaml
        #[arg(short, long, default_value = "armforge.yaml")]
        file: PathBuf,
    },

    /// Compare a fresh build against a prior artifact
    Diff {
        /// Path to armforge.yaml
        #[arg(short, long, default_value = "armforge.yaml")]
        file: PathBuf,

        /// Prior template to compare against
        #[arg(long)]
        against: PathBuf,

        /// Show a line diff of the rendered JSON instead of resource changes
        #[arg(long)]
        lines: bool,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Failures surfaced to the user, with their exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] Error),

    /// Validation findings or a stale artifact.
    #[error("{0}")]
    Check(String),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// 0 ok, 1 generic, 2 parse, 3 cycle, 4 duplicate name, 5 check failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Pipeline(Error::Parse { .. }) => 2,
            Self::Pipeline(Error::Dependency { .. }) => 3,
            Self::Pipeline(Error::DuplicateName { .. }) => 4,
            Self::Check(_) => 5,
            Self::Pipeline(_) | Self::Usage(_) => 1,
        }
    }
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), CliError> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Build {
            file,
            output,
            stdout,
            check,
        } => cmd_build(&file, output.as_deref(), stdout, check),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Diff {
            file,
            against,
            lines,
        } => cmd_diff(&file, &against, lines),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "armforge", &mut std::io::stdout());
            Ok(())
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"version: "1.0"
name: my-deployment
description: "Managed by armforge"

source: infra
output: azuredeploy.json

parameters:
  location:
    type: string
    defaultValue: "[resourceGroup().location]"

variables: {}

outputs: {}
"#;

const SOURCE_TEMPLATE: &str = r#"use armforge::azure::storage;

pub const LOGS: storage::Account = storage::Account {
    name: "logs",
    location: parameters("location"),
    kind: "StorageV2",
    sku: storage::Sku { name: "Standard_LRS" },
};
"#;

fn cmd_init(path: &Path) -> Result<(), CliError> {
    let config_path = path.join("armforge.yaml");
    if config_path.exists() {
        return Err(CliError::Usage(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let source_dir = path.join("infra");
    std::fs::create_dir_all(&source_dir).map_err(|e| Error::io(&source_dir, e))?;
    std::fs::write(&config_path, CONFIG_TEMPLATE).map_err(|e| Error::io(&config_path, e))?;
    let sample = source_dir.join("main.rs");
    if !sample.exists() {
        std::fs::write(&sample, SOURCE_TEMPLATE).map_err(|e| Error::io(&sample, e))?;
    }

    println!("Initialized armforge project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}", sample.display());
    Ok(())
}

/// Parsed and validated project, with paths resolved.
struct Project {
    config: ProjectConfig,
    source: PathBuf,
    output: PathBuf,
}

fn report(errors: &[ValidationError]) -> CliError {
    for e in errors {
        eprintln!("  ERROR: {}", e);
    }
    CliError::Check(format!("{} validation error(s)", errors.len()))
}

fn load_project(file: &Path) -> Result<Project, CliError> {
    let config = config::parse_config_file(file)?;
    let errors = config::validate_config(&config);
    if !errors.is_empty() {
        return Err(report(&errors));
    }
    let (source, output) = config::project_paths(&config, file);
    Ok(Project {
        config,
        source,
        output,
    })
}

fn run_build(project: &Project) -> Result<Build, CliError> {
    let catalog = TypeCatalog::with_root(&project.config.catalog_root);
    let options = DiscoverOptions::from_globs(&project.config.exclude)?;
    let build = pipeline::build(
        &project.source,
        &catalog,
        &project.config.envelope(),
        &options,
    )?;
    Ok(build)
}

fn cmd_validate(file: &Path) -> Result<(), CliError> {
    let project = load_project(file)?;
    let build = run_build(&project)?;
    let document = serde_json::to_value(&build.document)
        .map_err(|e| CliError::Usage(format!("cannot inspect document: {}", e)))?;
    let errors = validate_document(&document);
    if !errors.is_empty() {
        return Err(report(&errors));
    }
    println!(
        "OK: {} ({} resources, {} edges)",
        project.config.name,
        build.graph.order.len(),
        build.graph.edges.len()
    );
    Ok(())
}

fn cmd_build(
    file: &Path,
    output_override: Option<&Path>,
    to_stdout: bool,
    check: bool,
) -> Result<(), CliError> {
    let project = load_project(file)?;
    let build = run_build(&project)?;
    let rendered = render(&build.document);
    let target = output_override.unwrap_or(project.output.as_path());

    if to_stdout {
        print!("{}", rendered);
        return Ok(());
    }

    if check {
        let current = match std::fs::read_to_string(target) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::io(target, e).into()),
        };
        if current == rendered {
            println!("OK: {} is up to date", target.display());
            return Ok(());
        }
        for change in differ::line_diff(&current, &rendered)
            .iter()
            .filter(|c| !matches!(c, differ::LineChange::Same(_)))
        {
            eprintln!("{}", change);
        }
        return Err(CliError::Check(format!(
            "{} is out of date; run `armforge build`",
            target.display()
        )));
    }

    output::write_document(target, &rendered)?;
    println!(
        "Wrote {} ({} resources)",
        target.display(),
        build.document.resources.len()
    );
    Ok(())
}

fn cmd_graph(file: &Path) -> Result<(), CliError> {
    let project = load_project(file)?;
    let build = run_build(&project)?;
    for (i, name) in build.graph.order.iter().enumerate() {
        let Some(resource) = build.resources.iter().find(|r| &r.name == name) else {
            continue;
        };
        let deps = build.graph.depends_on(name);
        if deps.is_empty() {
            println!("{:>3}. {} [{}] ({})", i + 1, name, resource.kind, resource.location);
        } else {
            println!(
                "{:>3}. {} [{}] ({}) <- {}",
                i + 1,
                name,
                resource.kind,
                resource.location,
                deps.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_diff(file: &Path, against: &Path, lines: bool) -> Result<(), CliError> {
    let project = load_project(file)?;
    let build = run_build(&project)?;
    let prior = output::read_document(against)?.ok_or_else(|| {
        CliError::Usage(format!("{} does not exist", against.display()))
    })?;

    if lines {
        let changes = differ::line_diff(&render(&prior), &render(&build.document));
        if !differ::has_line_changes(&changes) {
            println!("No changes.");
        }
        for change in changes.iter().filter(|c| !matches!(c, differ::LineChange::Same(_))) {
            println!("{}", change);
        }
        return Ok(());
    }

    let changes = differ::semantic_diff(&prior, &build.document);
    if changes.is_empty() {
        println!("No changes.");
    }
    for change in &changes {
        println!("{}", change);
    }
    Ok(())
}
