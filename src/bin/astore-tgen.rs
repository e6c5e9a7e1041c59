use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use log::{error, info};
use rand::SeedableRng;

use astore::{generate_blobs, DurabilityPolicy, Result, Store};

#[derive(Parser)]
#[command(name = "astore-tgen", version, about = "Synthetic blob generator and write load harness")]
struct Cli {
    /// Store root directory to write generated blobs into.
    #[arg(short = 's', long = "store", value_name = "DIR")]
    store: PathBuf,

    /// Logical key to write generated blobs under.
    #[arg(short = 'k', long = "key", default_value = "tgen")]
    key: String,

    /// Number of blobs to generate and write.
    #[arg(short = 'n', long = "count", default_value_t = 1000)]
    count: usize,

    /// Random seed, for reproducible load tests.
    #[arg(long = "seed", default_value_t = 0)]
    seed: u64,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!("{e}");
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let store = Store::open(&cli.store, DurabilityPolicy::from_env())?;
    store.initialize()?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(cli.seed);
    let blobs = generate_blobs(cli.count, &mut rng);

    info!("writing {} blobs to key {:?}", blobs.len(), cli.key);
    let start = Instant::now();
    for blob in &blobs {
        store.write_to_key(&cli.key, blob)?;
    }
    let elapsed = start.elapsed();

    info!(
        "wrote {} blobs in {:?} ({:.0} blobs/sec)",
        blobs.len(),
        elapsed,
        blobs.len() as f64 / elapsed.as_secs_f64().max(1e-9)
    );

    store.close()?;
    Ok(())
}
