use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use ctrlgen::codegen::{codegen, GenOptions};
use ctrlgen::error::CliError;
use ctrlgen::pipeline;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Generated C# source
    Cs,
    /// Allocated identifiers as JSON
    Names,
    /// Provenance JSON
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "ctrlgen",
    version,
    about = "Controller code generator: turns animator controller JSON into a C# reconstruction program"
)]
struct Cli {
    /// Input controller JSON file
    source: PathBuf,

    /// Controller name (defaults to the name stored in the input)
    #[arg(long)]
    name: Option<String>,

    /// Output root; the source lands in <DIR>/Code/. Prints to stdout if absent.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// C# namespace (defaults to the controller name)
    #[arg(long)]
    namespace: Option<String>,

    /// Asset folder passed to GenerateController
    #[arg(long, default_value = "Assets")]
    controller_path: String,

    /// Clips whose name starts with this prefix are emitted without curves
    #[arg(long, default_value = "proxy_")]
    proxy_prefix: String,

    /// Runtime support source to copy next to the output, with [NAMESPACE] substituted
    #[arg(long, value_name = "FILE")]
    runtime_template: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Cs)]
    emit: EmitStage,

    /// Print generator phases
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        eprintln!("ctrlgen: source = {}", cli.source.display());
        if let Some(out) = &cli.output {
            eprintln!("ctrlgen: output = {}", out.display());
        }
        eprintln!("ctrlgen: emit   = {:?}", cli.emit);
    }

    if let Err(e) = run(&cli) {
        eprintln!("ctrlgen: error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ctrlgen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    // ── Load controller ──
    let controller = pipeline::load_controller(&cli.source)?;
    if cli.verbose {
        eprintln!(
            "ctrlgen: loaded {} layers, {} state machines, {} states, {} motions",
            controller.layers.len(),
            controller.machines.len(),
            controller.states.len(),
            controller.motions.len(),
        );
    }

    // ── Generate ──
    let options = GenOptions {
        controller_name: cli.name.clone(),
        namespace: cli.namespace.clone(),
        controller_path: cli.controller_path.clone(),
        proxy_prefix: cli.proxy_prefix.clone(),
    };
    let generated = codegen(&controller, &options)?;
    if cli.verbose {
        eprintln!(
            "ctrlgen: {} identifiers, {} machine pairs, {} deferred wirings",
            generated.names.len(),
            generated.machine_pairs.len(),
            generated.deferred,
        );
    }

    // ── Emit ──
    match cli.emit {
        EmitStage::Cs => match &cli.output {
            Some(dir) => {
                let path = pipeline::write_generated(dir, &generated)?;
                if cli.verbose {
                    eprintln!("ctrlgen: wrote {}", path.display());
                }
                if let Some(template) = &cli.runtime_template {
                    let namespace = options.namespace(&controller);
                    let path = pipeline::write_runtime_support(template, dir, &namespace)?;
                    if cli.verbose {
                        eprintln!("ctrlgen: wrote {}", path.display());
                    }
                }
            }
            None => print!("{}", generated.source),
        },
        EmitStage::Names => {
            let json =
                serde_json::to_string_pretty(&generated.names).map_err(CliError::Encode)?;
            emit_text(cli.output.as_deref(), "names.json", &format!("{json}\n"))?;
        }
        EmitStage::BuildInfo => {
            emit_text(
                cli.output.as_deref(),
                "build-info.json",
                &generated.provenance.to_json(),
            )?;
        }
    }
    Ok(())
}

/// Print `text`, or write it as `<dir>/<file_name>` when an output root is given.
fn emit_text(dir: Option<&Path>, file_name: &str, text: &str) -> Result<(), CliError> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| CliError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = dir.join(file_name);
            std::fs::write(&path, text).map_err(|source| CliError::Io { path, source })
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
