use std::path::PathBuf;
use std::process;
use std::sync::{mpsc, Arc};

use clap::Parser;
use tracing::{error, info};

use mailsink::{
    Configuration, DatabaseReceiver, Dispatcher, HtmlScrubber, InMemoryStorage, MailboxValidator,
    ServerPool, SmtpListener, Storage,
};

#[derive(Parser)]
#[command(name = "mailsink", version, about = "SMTP sink server")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::from_file(&cli.config)?;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    storage.connect()?;
    storage.create()?;
    info!("storage engine '{}' requested; using built-in store", config.db_engine);

    let listener = SmtpListener::bind(&config)?;
    let pool = ServerPool::new(
        config.max_workers,
        Arc::new(MailboxValidator),
        Arc::new(HtmlScrubber),
    );

    let mut dispatcher = Dispatcher::new(listener, pool);
    dispatcher.add_receiver(Arc::new(DatabaseReceiver::new(Arc::clone(&storage))));

    let handle = dispatcher.start()?;
    info!("mailsink ready on {}", handle.local_addr());

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let _ = stop_rx.recv();
    info!("interrupt received, shutting down");

    handle.shutdown();
    storage.disconnect();

    Ok(())
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
