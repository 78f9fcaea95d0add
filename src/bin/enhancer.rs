//! Enhancer CLI: inspect and validate enhancement chains.
//!
//! Usage:
//!   enhancer chain validate <file>
//!   enhancer chain show <file> [--json]
//!   enhancer config check [--config path]

use clap::{Parser, Subcommand};
use enhancer::{parse_chain_list, EnhancerConfig, ExecutionPlanGraph};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "enhancer",
    version,
    about = "Dependency-aware enhancement chain scheduler"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect chain list files
    Chain {
        #[command(subcommand)]
        action: ChainAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ChainAction {
    /// Parse and validate a chain list file
    Validate {
        /// Chain list file, one `engine;dependsOn=..;optional` line per node
        file: PathBuf,
    },
    /// Print a chain's nodes in execution order
    Show {
        /// Chain list file
        file: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load the config and validate every configured chain
    Check {
        /// Path to the YAML config (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Chain name taken from the file stem.
fn chain_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "chain".to_string())
}

fn load_chain(path: &Path) -> Result<ExecutionPlanGraph, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_chain_list(&chain_name(path), text.lines()).map_err(|e| e.to_string())
}

fn cmd_chain_validate(path: &Path) -> i32 {
    match load_chain(path) {
        Ok(plan) => {
            let optional = plan.nodes().filter(|n| n.optional).count();
            println!(
                "Chain '{}' is valid: {} nodes ({} optional)",
                plan.name(),
                plan.len(),
                optional
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_chain_show(path: &Path, json: bool) -> i32 {
    let plan = match load_chain(path) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if json {
        return match serde_json::to_string_pretty(&plan) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    println!("Chain '{}':", plan.name());
    for id in plan.topological_order() {
        let Some(node) = plan.node(&id) else { continue };
        let deps: Vec<&str> = node.depends_on.iter().map(|d| d.as_str()).collect();
        let mut line = format!("  {} -> {}", node.id, node.engine);
        if node.optional {
            line.push_str(" (optional)");
        }
        if !deps.is_empty() {
            line.push_str(&format!(" after [{}]", deps.join(", ")));
        }
        println!("{}", line);
    }
    0
}

fn cmd_config_check(config: &EnhancerConfig) -> i32 {
    let registry = match config.build_chain_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("workers: {}", config.workers);
    match config.max_wait_secs {
        Some(secs) => println!("max wait: {}s", secs),
        None => println!("max wait: none"),
    }
    println!("result locations: {}<job-id>", config.result_location_prefix);
    for name in registry.names() {
        let nodes = registry.get(&name).map(|p| p.len()).unwrap_or(0);
        println!("chain '{}': {} nodes", name, nodes);
    }
    match registry.default_chain_name() {
        Some(name) => println!("default chain: {}", name),
        None => println!("default chain: built from active engines"),
    }
    0
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Chain { action } => {
            enhancer::logging::init_logging("warn");
            let code = match action {
                ChainAction::Validate { file } => cmd_chain_validate(&file),
                ChainAction::Show { file, json } => cmd_chain_show(&file, json),
            };
            std::process::exit(code);
        }
        Commands::Config { action } => match action {
            ConfigAction::Check { config } => {
                let loaded = match EnhancerConfig::load_or_default(config.as_deref()) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                };
                enhancer::logging::init_logging(&loaded.log_level);
                std::process::exit(cmd_config_check(&loaded));
            }
        },
    }
}
