use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use astore::{DurabilityPolicy, KafkaConsumer, Result, Store};

const DEFAULT_STORE_ROOT: &str = "/var/astore";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9898";

#[derive(Parser)]
#[command(name = "astored", version, about = "Append-only content-addressed object store server")]
struct Cli {
    /// Store root directory.
    #[arg(short = 's', long = "store", default_value = DEFAULT_STORE_ROOT, value_name = "DIR")]
    store: PathBuf,

    /// HTTP listen address.
    #[arg(short = 'l', long = "listen", default_value = DEFAULT_LISTEN_ADDR, value_name = "ADDR")]
    listen: String,

    /// Enable Kafka stream ingestion.
    #[arg(short = 'K', long = "kafka")]
    kafka: bool,

    /// Kafka topic to consume (required with --kafka).
    #[arg(long = "topic", value_name = "NAME")]
    topic: Option<String>,

    /// Comma-separated Kafka broker addresses (required with --kafka).
    #[arg(long = "brokers", value_name = "HOST:PORT,...")]
    brokers: Option<String>,

    /// Wipe the store and exit.
    #[arg(long = "purge")]
    purge: bool,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{e}");
        exit(1);
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn run(cli: Cli) -> Result<()> {
    let durability = DurabilityPolicy::from_env();
    let store = Arc::new(Store::open(&cli.store, durability)?);

    if cli.purge {
        info!("purging store at {}", cli.store.display());
        store.purge()?;
        return Ok(());
    }

    store.initialize()?;
    info!("astore {}", env!("CARGO_PKG_VERSION"));
    info!("store root: {}", cli.store.display());

    let stats_handle = store.stats().spawn_driver();

    let kafka_consumer = if cli.kafka {
        let topic = cli.topic.as_deref().ok_or_else(|| {
            astore::AstoreError::StringError("--kafka requires --topic".into())
        })?;
        let brokers = cli.brokers.as_deref().ok_or_else(|| {
            astore::AstoreError::StringError("--kafka requires --brokers".into())
        })?;
        info!("ingesting from kafka topic {topic} via {brokers}");
        Some(KafkaConsumer::spawn(store.clone(), brokers, topic)?)
    } else {
        None
    };

    info!("listening on {}", cli.listen);
    let addr: std::net::SocketAddr = cli
        .listen
        .parse()
        .map_err(|e| astore::AstoreError::StringError(format!("invalid listen address: {e}")))?;
    warp::serve(astore::routes(store.clone())).run(addr).await;

    if let Some(consumer) = kafka_consumer {
        consumer.close();
    }
    drop(stats_handle);
    store.close()?;

    Ok(())
}
