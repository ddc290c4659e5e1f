//! Command-line front end for the bundled tor binary installer

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use torsetup_core::{ConfigLoader, InstallerConfig, InstalledBinary, TorResourceInstaller};

#[derive(Parser, Debug)]
#[clap(name = "torsetup", author, version, about = "Install the tor binary bundled in an application archive")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, help = "YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, short, help = "Log level (overrides logging.level from the config)")]
    log_level: Option<String>,

    #[clap(long, help = "Distribution archive containing the binary")]
    archive: Option<PathBuf>,

    #[clap(long, help = "Architecture id, e.g. arm64-v8a (defaults to the running CPU)")]
    arch: Option<String>,

    #[clap(long, help = "OS-managed native library directory to check for an existing binary")]
    native_lib_dir: Option<PathBuf>,

    #[clap(long, help = "Private directory the binary is extracted into")]
    install_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the binary and print its path
    Install {
        #[clap(long, help = "Give up after this many seconds")]
        timeout_secs: Option<u64>,
    },
    /// Show which archive entry would be extracted
    Resolve,
    /// Show both candidate binary locations and their permissions
    Inspect,
    /// Replace the config overlay file
    WriteConfig {
        #[clap(long, conflicts_with = "from_file", help = "Overlay text")]
        content: Option<String>,

        #[clap(long, help = "Read the overlay text from this file")]
        from_file: Option<PathBuf>,

        #[clap(long, help = "Overlay path (defaults to torrc.custom in the install directory)")]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    env_logger::Builder::new()
        .filter_level(parse_level(log_level))
        .init();
    if let Some(path) = &cli.config {
        log::info!("Loaded configuration from: {}", path.display());
    }

    let installer = TorResourceInstaller::from_config(&config)?;

    match cli.command {
        Commands::Install { timeout_secs } => {
            let outcome = match timeout_secs.or(config.timeout_secs) {
                Some(secs) => {
                    installer
                        .install_resources_with_timeout(Duration::from_secs(secs))
                        .await?
                }
                None => installer.install_resources()?,
            };
            println!("{}\t{}", outcome.path.display(), outcome.origin);
        }
        Commands::Resolve => match installer.resolve_entry()? {
            Some(entry) => println!("{}\t{} bytes", entry.name, entry.size),
            None => anyhow::bail!(
                "no binary for architecture '{}' in {}",
                installer.context().architecture,
                config.archive_path.display()
            ),
        },
        Commands::Inspect => {
            let report = installer.inspect();
            println!("architecture\t{}", report.architecture);
            match &report.native {
                Some(native) => print_binary("native", native),
                None => println!("native\t-"),
            }
            print_binary("private", &report.private);
        }
        Commands::WriteConfig {
            content,
            from_file,
            path,
        } => {
            let text = match (content, from_file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("reading overlay text from {}", file.display()))?,
                (None, None) => anyhow::bail!("one of --content or --from-file is required"),
            };
            let path = path.unwrap_or_else(|| installer.config_overlay_path());
            installer.write_custom_config(&path, &text)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<InstallerConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::from_file(path)?,
        None => ConfigLoader::from_env(cli.archive.clone())?,
    };

    if let Some(archive) = &cli.archive {
        config.archive_path = archive.clone();
    }
    if let Some(arch) = &cli.arch {
        config.architecture = Some(arch.clone());
    }
    if let Some(dir) = &cli.native_lib_dir {
        config.native_library_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.install_dir {
        config.install_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

fn print_binary(label: &str, binary: &InstalledBinary) {
    let flag = |set: bool, c: char| if set { c } else { '-' };
    println!(
        "{}\t{}\t{}{}{}",
        label,
        binary.path.display(),
        flag(binary.readable, 'r'),
        flag(binary.writable, 'w'),
        flag(binary.executable, 'x'),
    );
}
