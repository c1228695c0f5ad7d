use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use eponym_runtime::NameOptions;

#[derive(Parser)]
#[command(name = "eponym", about = "Generate random human-readable names")]
struct Cli {
    /// Number of components (2-16)
    #[arg(short = 'c', long, default_value_t = 3)]
    components: u8,

    /// Maximum byte length per word (0 = no limit)
    #[arg(short = 'm', long = "max-length", default_value_t = 0)]
    max_length: u32,

    /// Separator between words
    #[arg(short = 's', long, default_value = "-")]
    separator: String,

    /// Print the guest module version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean name-per-line stream
    fmt()
        .with_env_filter(EnvFilter::from_env("EPONYM_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", eponym_runtime::version()?);
        return Ok(());
    }

    if !(2..=16).contains(&cli.components) {
        eprintln!("error: components must be between 2 and 16");
        std::process::exit(1);
    }

    let opts = NameOptions {
        components: cli.components,
        max_element_length: cli.max_length,
        separator: cli.separator,
    };

    tracing::debug!(
        components = opts.components,
        max_length = opts.max_element_length,
        separator = %opts.separator,
        "Generating name"
    );

    println!("{}", eponym_runtime::generate_with_options(&opts)?);
    Ok(())
}
