use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use instill_core::{ActionRegistry, InstallData, InstallDescription};
use instill_engine::{
    default_data_dir, register_builtin_actions, Engine, OperationStatus, StandardModule,
};

mod render;

#[derive(Parser, Debug)]
#[command(name = "instill")]
#[command(about = "Product installation engine", long_about = None)]
struct Cli {
    /// Override the engine data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a product from an install description.
    Install {
        description: PathBuf,
        /// Front-end properties forwarded to action modules.
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Apply the description as a patch to an existing product.
        #[arg(long)]
        patch: bool,
    },
    /// Uninstall products recorded under an install location.
    Uninstall {
        root: PathBuf,
        /// Product identifiers; removes everything when omitted.
        ids: Vec<String>,
    },
    /// List the products recorded under an install location.
    List { root: PathBuf },
    /// Retry directory removals deferred from earlier operations.
    Cleanup,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Commands::Install {
            description,
            set,
            patch,
        } => {
            let raw = fs::read_to_string(&description).with_context(|| {
                format!("failed to read install description: {}", description.display())
            })?;
            let description = InstallDescription::from_toml_str(&raw)?;
            let data = parse_install_data(&set)?;

            let engine = build_engine(data_dir, &description);
            let mut monitor = render::TerminalProgress::new();
            let outcome = engine.install(&description, &data, patch, &mut monitor)?;
            monitor.finish();

            match outcome.status {
                OperationStatus::Success => {
                    render::print_status(
                        "installed",
                        &format!(
                            "{} {} -> {}",
                            description.product_name,
                            description.product_version,
                            description.root_location.display()
                        ),
                    );
                }
                OperationStatus::Cancelled => {
                    render::print_warning("installation cancelled, changes rolled back");
                    std::process::exit(3);
                }
            }
        }
        Commands::Uninstall { root, ids } => {
            let registry = builtin_registry();
            let engine = Engine::new(registry, data_dir);

            let ids = if ids.is_empty() {
                engine
                    .installed_products(&root)?
                    .into_iter()
                    .map(|product| product.id)
                    .collect()
            } else {
                ids
            };
            if ids.is_empty() {
                return Err(anyhow!("nothing installed under {}", root.display()));
            }

            let mut monitor = render::TerminalProgress::new();
            let outcome = engine.uninstall(&root, &ids, &mut monitor)?;
            monitor.finish();

            match outcome.status {
                OperationStatus::Success => {
                    for id in &outcome.removed {
                        render::print_status("removed", id);
                    }
                }
                OperationStatus::Cancelled => {
                    render::print_warning("uninstall cancelled");
                    std::process::exit(3);
                }
            }
        }
        Commands::List { root } => {
            let engine = Engine::new(builtin_registry(), data_dir);
            let products = engine.installed_products(&root)?;
            if products.is_empty() {
                println!("No products installed under {}", root.display());
            } else {
                for product in products.iter().filter(|product| product.show_uninstall) {
                    println!(
                        "{} {} ({}) {}",
                        product.id,
                        product.version,
                        product.status.as_str(),
                        product.location.display()
                    );
                }
            }
        }
        Commands::Cleanup => {
            let engine = Engine::new(ActionRegistry::new(), data_dir);
            let removed = engine.run_cleanup();
            if removed.is_empty() {
                println!("Nothing pending removal");
            } else {
                for path in removed {
                    render::print_status("cleaned", &path.display().to_string());
                }
            }
        }
    }

    Ok(())
}

fn builtin_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_builtin_actions(&mut registry);
    registry
}

fn build_engine(data_dir: PathBuf, description: &InstallDescription) -> Engine {
    let mut engine = Engine::new(builtin_registry(), data_dir);
    engine.add_module(Box::new(StandardModule::new(description.units.clone())));
    engine
}

fn parse_install_data(entries: &[String]) -> Result<InstallData> {
    let mut data = InstallData::new();
    for entry in entries {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid property, expected NAME=VALUE: {entry}"))?;
        data.set(name, value);
    }
    Ok(data)
}
