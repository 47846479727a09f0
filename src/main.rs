use anyhow::Context;
use clap::{Parser, Subcommand};
use netbuilder::runtime::{Precision, RuntimeTypeRegistry};
use netbuilder::{BuildOptions, render};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "netbuilder")]
#[command(about = "Build computation networks from declarative descriptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a network and print its summary.
    Build {
        /// Path to the network description.
        #[arg(long)]
        source: String,

        /// Build options as JSON (deviceId, precision, randomSeedOffset).
        #[arg(long)]
        options: Option<String>,

        #[arg(long)]
        precision: Option<Precision>,

        #[arg(long, allow_hyphen_values = true)]
        device: Option<i32>,

        /// Also write the summary as JSON.
        #[arg(long)]
        json: Option<String>,
    },
    /// List the registered runtime types.
    Types,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Build {
            source,
            options,
            precision,
            device,
            json,
        } => {
            // 1) Options: file first, flags override.
            let mut opts = match &options {
                Some(path) => {
                    let text = std::fs::read_to_string(path)
                        .with_context(|| format!("read options file {}", path))?;
                    serde_json::from_str::<BuildOptions>(&text)
                        .with_context(|| format!("parse options file {}", path))?
                }
                None => BuildOptions::default(),
            };
            if let Some(precision) = precision {
                opts.precision = precision;
            }
            if let Some(device) = device {
                opts.device_id = device;
            }

            // 2) Build.
            let text = std::fs::read_to_string(&source)
                .with_context(|| format!("read description {}", source))?;
            let (network, stats) = netbuilder::build(&text, &opts)
                .with_context(|| format!("build network from {}", source))?;

            // 3) Report.
            let summary = network.summary(stats);
            eprint!("{}", render::render_text(&summary));
            if let Some(out) = json {
                std::fs::write(&out, render::render_json(&summary)?)
                    .with_context(|| format!("write {}", out))?;
                println!("Wrote {}", out);
            }
        }
        Commands::Types => {
            for entry in RuntimeTypeRegistry::global().entries() {
                let dispatch = if entry.dispatches_on_precision() {
                    "float|double"
                } else {
                    "-"
                };
                let kind = if entry.is_config_record() {
                    "container"
                } else {
                    "object"
                };
                println!("{:<20} {:<14} {}", entry.name(), dispatch, kind);
            }
        }
    }

    Ok(())
}
