// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use oxistrap::{decl::try_find_package, HttpFetcher, Project, Workspace};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  oxistrap [options] <oxistrap-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::New(opts) => run_new(opts).await,
            Command::Package(opts) => run_package(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Bootstrap new project from remote starter repository.
    #[command(override_usage = "oxistrap new [options] [<repo>]")]
    New(NewOptions),

    /// Show package name of Go source files at path.
    #[command(override_usage = "oxistrap package <path>")]
    Package(PackageOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewOptions {
    /// Remote starter repository, e.g., "github.com/foo/starter".
    #[arg(value_name = "repo", required_unless_present = "file")]
    pub repo: Option<String>,

    /// Branch or tag of starter repository to use.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,

    /// Directory to place new project into.
    #[arg(short, long, value_name = "path")]
    pub dest: Option<String>,

    /// Module path of new project.
    #[arg(short, long, value_name = "module")]
    pub module: Option<String>,

    /// Project descriptor file to read settings from.
    #[arg(short, long, value_name = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PackageOptions {
    /// Go source file or directory to inspect.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_new(opts: NewOptions) -> Result<()> {
    let mut project = match &opts.file {
        Some(path) => read_to_string(path)
            .with_context(|| format!("failed to read {:?}", path.display()))?
            .parse::<Project>()?,
        None => Project::new("", ""),
    };

    if let Some(repo) = opts.repo {
        project.repo = repo;
    }

    if let Some(branch) = opts.branch {
        project.branch = branch;
    }

    if let Some(dest) = opts.dest {
        project.dest = dest;
    }

    if let Some(module) = opts.module {
        project.module = module;
    }

    let fetcher = HttpFetcher::try_new(ProgressBar::no_length())?;
    let path = project.install(&fetcher, &Workspace::from_env()).await?;
    println!("{}", path.display());

    Ok(())
}

fn run_package(opts: PackageOptions) -> Result<()> {
    let package = try_find_package(&opts.path)
        .ok_or_else(|| anyhow!("no package declared at {:?}", opts.path.display()))?;
    println!("{}", String::from_utf8_lossy(&package));

    Ok(())
}
