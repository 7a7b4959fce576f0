use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use vista_core::prelude::*;
use vista_core::render::render_symbol;
use vista_utils::{debug, info, LogFormat, LogLevel, LogTarget, LoggingConfig};

/// Decode custom container and smart-pointer layouts from captured memory.
#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(version)]
#[command(about = "Decode custom container and smart-pointer layouts from captured memory", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides VISTA_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Also write logs to this file, or to a dated file in this directory
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Render symbols from a snapshot file
    Show
    {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,
        /// Symbols to render (default: every symbol, sorted by name)
        symbols: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// How deep nested values are expanded
        #[arg(long)]
        max_depth: Option<usize>,
        /// Children shown per value before eliding the rest
        #[arg(long)]
        max_children: Option<usize>,
        /// Bytes read for one string
        #[arg(long)]
        max_string_len: Option<usize>,
        /// Crate prefix of kernel types (locks, pages, dentries)
        #[arg(long)]
        kernel_crate: Option<String>,
        /// Register holding the per-CPU segment base
        #[arg(long)]
        tls_register: Option<String>,
    },
    /// List the dispatch rules in priority order
    Rules
    {
        /// Crate prefix of kernel types
        #[arg(long)]
        kernel_crate: Option<String>,
    },
    /// Show which decoder a type name selects
    Match
    {
        /// Structural type name, e.g. "std::vector<int, std::allocator<int>>"
        type_name: String,
        /// Crate prefix of kernel types
        #[arg(long)]
        kernel_crate: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat
{
    Text,
    Json,
}

fn main()
{
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only rendered values
    let mut logging = LoggingConfig::from_env().with_target(LogTarget::Stderr);
    if let Some(level) = cli.log_level {
        logging = logging.with_level(level);
    }
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format);
    }
    if let Some(file) = cli.log_file {
        logging = logging.with_file(file);
    }
    let _guard = match logging.init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn registry_config(kernel_crate: Option<String>, tls_register: Option<String>) -> RegistryConfig
{
    let defaults = RegistryConfig::default();
    RegistryConfig {
        kernel_crate: kernel_crate.unwrap_or(defaults.kernel_crate),
        tls_base_register: tls_register.unwrap_or(defaults.tls_base_register),
    }
}

fn run_command(command: Commands) -> VistaResult<()>
{
    match command {
        Commands::Show {
            snapshot,
            symbols,
            format,
            max_depth,
            max_children,
            max_string_len,
            kernel_crate,
            tls_register,
        } => {
            let mut limits = Limits::from_env();
            if let Some(depth) = max_depth {
                limits.max_depth = depth;
            }
            if let Some(children) = max_children {
                limits.max_children = children;
            }
            if let Some(len) = max_string_len {
                limits.max_string_len = len;
            }
            debug!(?limits, "render limits");

            info!("Loading snapshot {}", snapshot.display());
            let inferior = SnapshotFile::load(&snapshot)?.into_inferior()?;
            let registry = Registry::with_config(registry_config(kernel_crate, tls_register));
            let session = Session::new(&inferior, &registry, &limits);

            let names = if symbols.is_empty() {
                let mut all: Vec<String> = inferior.symbols().map(|(name, _)| name.to_string()).collect();
                all.sort();
                all
            } else {
                symbols
            };

            let trees = names
                .iter()
                .map(|name| render_symbol(session, name))
                .collect::<VistaResult<Vec<_>>>()?;

            match format {
                OutputFormat::Text => {
                    for tree in &trees {
                        print!("{tree}");
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trees)?),
            }
            Ok(())
        }
        Commands::Rules { kernel_crate } => {
            let registry = Registry::with_config(registry_config(kernel_crate, None));
            for (index, rule) in registry.rules().enumerate() {
                println!("{:>2}  {:<20} {}", index + 1, rule.kind().to_string(), rule.pattern());
            }
            Ok(())
        }
        Commands::Match {
            type_name,
            kernel_crate,
        } => {
            let registry = Registry::with_config(registry_config(kernel_crate, None));
            match registry.match_name(&type_name) {
                Some(kind) => println!("{kind}"),
                None => println!("no decoder (fields shown as-is)"),
            }
            Ok(())
        }
    }
}
