//! Datahub GeoJSON CLI
//!
//! Runs the HTTP bridge, or converts a single saved change stream.

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use datahub_geojson::{
    parse, serve, to_features, AppState, ChangeSource, Config, HttpChangeSource, ServiceError,
};

#[derive(Parser)]
#[command(name = "datahub-geojson")]
#[command(about = "Serve datahub entity change streams as GeoJSON features")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Convert an entity stream to a GeoJSON feature array
    Convert(ConvertArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Dataset configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9042")]
    listen: SocketAddr,
}

#[derive(Args)]
struct ConvertArgs {
    /// Entity stream file (default: stdin)
    input: Option<PathBuf>,

    /// Reduce property keys to their local names
    #[arg(long)]
    strip_property_urls: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), ServiceError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            info!("Wrote features to {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn run_serve(args: ServeArgs) -> Result<(), ServiceError> {
    let config = Config::load(&args.config)?;
    info!(
        datahub = %config.datahub_url,
        datasets = config.datasets.len(),
        "loaded configuration"
    );

    // The blocking client owns its own runtime, so it is built and dropped
    // outside the server's runtime.
    let source: Arc<dyn ChangeSource> = Arc::new(HttpChangeSource::new(config.datahub_url.clone())?);
    let state = AppState {
        config: Arc::new(config),
        source: Arc::clone(&source),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(serve(state, args.listen));
    drop(runtime);
    drop(source);
    result
}

fn run_convert(args: ConvertArgs) -> Result<(), ServiceError> {
    let collection = match &args.input {
        Some(path) => parse(fs::File::open(path)?)?,
        None => parse(io::stdin().lock())?,
    };
    info!(
        entities = collection.entities.len(),
        continuation = collection.continuation.is_some(),
        "parsed entity stream"
    );

    let features = to_features(&collection, args.strip_property_urls);
    let output = if args.pretty {
        serde_json::to_string_pretty(&features)?
    } else {
        serde_json::to_string(&features)?
    };
    write_output(&output, args.output.as_ref())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Convert(args) => run_convert(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
