//! kernelplan - Main Entry Point
//!
//! Resolves the build plan for the AWQ kernel extensions and hands it to the
//! native build as JSON.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use kernelplan_core::capability;
use kernelplan_core::package::PackageMetadata;
use kernelplan_core::probe::{self, HostProbe};
use kernelplan_core::{BuildEnvironment, BuildPipeline, HostOs};
use kernelplan_toolchain::SystemProbe;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// kernelplan - build-plan orchestration for GPU extension modules
#[derive(Parser)]
#[command(name = "kernelplan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level, used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the full build plan
    Plan(PlanArgs),

    /// Print the package version
    Version(CommonArgs),

    /// Show the detected runtime and devices
    Probe(CommonArgs),

    /// Print package metadata
    Metadata(CommonArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetOs {
    Posix,
    Windows,
}

impl From<TargetOs> for HostOs {
    fn from(os: TargetOs) -> Self {
        match os {
            TargetOs::Posix => HostOs::Posix,
            TargetOs::Windows => HostOs::Windows,
        }
    }
}

/// Options shared by every subcommand; they override the environment
#[derive(Args)]
struct CommonArgs {
    /// Root of the kernels source tree
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Plan for another OS than the host
    #[arg(long, value_enum)]
    target_os: Option<TargetOs>,

    /// Public package-index build (same as PYPI_BUILD=1)
    #[arg(long)]
    public_build: bool,

    /// Skip the accelerated extensions (same as BUILD_CUDA_EXT=0)
    #[arg(long)]
    no_extensions: bool,
}

impl CommonArgs {
    fn environment(&self) -> anyhow::Result<BuildEnvironment> {
        let mut env = BuildEnvironment::from_env()
            .context("reading build environment")?
            .with_project_root(&self.project_root);

        if let Some(os) = self.target_os {
            env = env.with_os(os.into());
        }
        if self.public_build {
            env = env.with_public_build(true);
        }
        if self.no_extensions {
            env = env.with_extensions(false);
        }
        Ok(env)
    }
}

/// Arguments for the plan command
#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Write the plan here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_logging(level: &str) {
    // stdout carries the plan, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Plan(args) => plan(args),
        Commands::Version(args) => version(args),
        Commands::Probe(args) => probe_host(args),
        Commands::Metadata(args) => metadata(args),
    }
}

fn plan(args: PlanArgs) -> anyhow::Result<()> {
    let env = args.common.environment()?;
    tracing::info!("kernelplan v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Project root: {}", env.project_root.display());

    let plan = BuildPipeline::new(&env, &SystemProbe::new())
        .run()
        .context("resolving build plan")?;
    let json = plan.to_json()?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("writing plan to {}", path.display()))?;
            tracing::info!(
                "Wrote {} target(s) to {}",
                plan.targets.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn version(args: CommonArgs) -> anyhow::Result<()> {
    let env = args.environment()?;
    let version = BuildPipeline::new(&env, &SystemProbe::new())
        .version()
        .context("composing package version")?;
    println!("{version}");
    Ok(())
}

fn probe_host(args: CommonArgs) -> anyhow::Result<()> {
    let env = args.environment()?;
    let host = SystemProbe::new();

    let runtime = probe::probe(&env, &host).context("probing accelerator runtime")?;
    let devices = host.devices(&env, runtime.family)?;
    let targets = capability::codegen_targets(&devices, runtime.family)?;

    let report = serde_json::json!({
        "runtime": runtime,
        "os": env.os,
        "devices": devices,
        "codegen_targets": targets,
        "legacy_generator_api": host.legacy_generator_api(&env),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn metadata(args: CommonArgs) -> anyhow::Result<()> {
    let env = args.environment()?;
    let meta = PackageMetadata::load(&env.project_root)?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}
