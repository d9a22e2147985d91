//! Layoutix - partition layout planner
//!
//! Computes the devicegraph an installation profile asks for, starting from
//! a devicegraph scenario file, without touching any real disk.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use layoutix::config::{Architecture, Profile, SystemInfo};
use layoutix::disk::graph::Devicegraph;
use layoutix::disk::report::layout_summary;
use layoutix::planned::PlannedDevice;
use layoutix::problems::{ProblemList, Severity};
use layoutix::proposal::AutoinstProposal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "layoutix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Target architecture (x86_64, aarch64, ppc64le, s390x)
    #[arg(long, global = true, env = "LAYOUTIX_ARCH", default_value = "x86_64")]
    arch: Architecture,

    /// The target boots through UEFI
    #[arg(long, global = true, env = "LAYOUTIX_EFI")]
    efi: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the resulting devicegraph for a profile
    Plan {
        /// Devicegraph scenario file (TOML or JSON)
        #[arg(short, long)]
        devicegraph: String,

        /// Installation profile
        #[arg(short, long)]
        profile: String,

        /// Write the resulting devicegraph to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Format of the output file
        #[arg(short, long, value_enum, default_value = "toml")]
        format: OutputFormat,
    },

    /// Check a profile against a devicegraph and list its problems
    Validate {
        /// Devicegraph scenario file (TOML or JSON)
        #[arg(short, long)]
        devicegraph: String,

        /// Installation profile
        #[arg(short, long)]
        profile: String,
    },

    /// Show the disks, volume groups and free regions of a devicegraph
    Show {
        /// Devicegraph scenario file (TOML or JSON)
        devicegraph: String,
    },

    /// Generate a sample profile
    GenerateProfile {
        /// Output path for the profile
        #[arg(short, long, default_value = "layoutix.toml")]
        output: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let system = SystemInfo::new(cli.arch, cli.efi);

    match cli.command {
        Commands::Plan {
            devicegraph,
            profile,
            output,
            format,
        } => cmd_plan(&devicegraph, &profile, output.as_deref(), format, system)?,
        Commands::Validate { devicegraph, profile } => cmd_validate(&devicegraph, &profile, system)?,
        Commands::Show { devicegraph } => cmd_show(&devicegraph)?,
        Commands::GenerateProfile { output } => cmd_generate_profile(&output)?,
    }

    Ok(())
}

fn print_problems(problems: &ProblemList) {
    for problem in problems {
        let severity = match problem.severity() {
            Severity::Warn => "warning".yellow(),
            Severity::Fatal => "fatal".red().bold(),
        };
        println!("  [{}] {}", severity, problem.message());
    }
}

fn print_planned(planned: &[PlannedDevice]) {
    println!("{:<10} {:<12} {:>12} {:>12} {:<20}", "DEVICE", "DISK", "MIN", "MAX", "MOUNT");
    println!("{}", "-".repeat(70));
    for device in planned {
        match device {
            PlannedDevice::Partition(part) => {
                let kind = if part.is_reused() { "reuse" } else { "partition" };
                println!(
                    "{:<10} {:<12} {:>12} {:>12} {:<20}",
                    kind,
                    part.reuse.as_deref().or(part.disk.as_deref()).unwrap_or("-"),
                    part.min_size().to_string(),
                    part.max_size().to_string(),
                    part.format.mount_point.as_deref().unwrap_or("-")
                );
            }
            PlannedDevice::VolumeGroup(vg) => {
                println!("{:<10} {:<12}", "vg", vg.base_name());
                for lv in &vg.lvs {
                    println!(
                        "{:<10} {:<12} {:>12} {:>12} {:<20}",
                        "  lv",
                        lv.logical_volume_name,
                        lv.sizing.min_size.to_string(),
                        lv.sizing.max_size.to_string(),
                        lv.format.mount_point.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
}

fn cmd_plan(
    devicegraph_path: &str,
    profile_path: &str,
    output: Option<&str>,
    format: OutputFormat,
    system: SystemInfo,
) -> Result<()> {
    info!("Loading devicegraph from {}", devicegraph_path);
    let devicegraph = Devicegraph::from_file(devicegraph_path)?;
    info!("Loading profile from {}", profile_path);
    let profile = Profile::from_file(profile_path)?;
    info!("Planning for {}", system);

    let proposal = AutoinstProposal::new(&devicegraph, system).propose(&profile)?;
    if !proposal.problems.is_empty() {
        println!("Problems (affected sections were skipped):");
        print_problems(&proposal.problems);
        println!();
    }

    print!("{}", layout_summary(&proposal.devicegraph, false));

    if let Some(path) = output {
        let content = match format {
            OutputFormat::Toml => proposal.devicegraph.to_toml_string()?,
            OutputFormat::Json => proposal.devicegraph.to_json_string()?,
        };
        std::fs::write(path, content)?;
        println!("✓ Resulting devicegraph written to {}", path);
    }

    Ok(())
}

fn cmd_validate(devicegraph_path: &str, profile_path: &str, system: SystemInfo) -> Result<()> {
    let devicegraph = Devicegraph::from_file(devicegraph_path)?;
    let profile = Profile::from_file(profile_path)?;

    let (planned, problems) = AutoinstProposal::new(&devicegraph, system).plan(&profile);
    print_planned(&planned);
    println!();

    if problems.is_empty() {
        println!("✓ Profile is valid");
        return Ok(());
    }
    print_problems(&problems);
    if problems.is_fatal() {
        bail!("the profile has {} problem(s), some of them fatal", problems.len());
    }
    println!("✓ Profile is usable, {} warning(s)", problems.len());
    Ok(())
}

fn cmd_show(devicegraph_path: &str) -> Result<()> {
    let devicegraph = Devicegraph::from_file(devicegraph_path)?;
    print!("{}", layout_summary(&devicegraph, true));
    Ok(())
}

fn cmd_generate_profile(output: &str) -> Result<()> {
    let sample = Profile::sample();
    let content = sample.to_toml_string()?;
    std::fs::write(output, content)?;
    println!("✓ Sample profile written to {}", output);
    Ok(())
}
