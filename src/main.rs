use fitsync::adapters::{
    spawn_store_watcher, FileCredentialsProvider, FileEventStore, ReqwestHttpClient,
};
use fitsync::config::SyncConfig;
use fitsync::events::OrchestratorEvent;
use fitsync::orchestrator::Orchestrator;
use fitsync::sync::EnableOutcome;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: fitsync [COMMAND]

Commands:
  (none)      run the background sync daemon until Ctrl-C
  --status    print the orchestrator state as JSON
  --sync      run one sync now and exit
  --enable    enable background sync (opens the authorization page if needed)
  --disable   disable background sync
  --version   print the version
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Daemon,
    Status,
    SyncOnce,
    Enable,
    Disable,
}

fn parse_command() -> Result<Option<Command>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first().map(String::as_str) {
        None => Command::Daemon,
        Some("--status") => Command::Status,
        Some("--sync") => Command::SyncOnce,
        Some("--enable") => Command::Enable,
        Some("--disable") => Command::Disable,
        Some("--version") => {
            println!("fitsync {}", VERSION);
            return Ok(None);
        }
        Some("--help") | Some("-h") => {
            print!("{}", USAGE);
            return Ok(None);
        }
        Some(other) => return Err(eyre!("unknown argument: {}\n\n{}", other, USAGE)),
    };
    Ok(Some(command))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitsync=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let Some(command) = parse_command()? else {
        return Ok(());
    };

    color_eyre::install()?;
    init_logging();

    let runtime = tokio::runtime::Runtime::new().wrap_err("Failed to start tokio runtime")?;
    runtime.block_on(run(command))
}

async fn run(command: Command) -> Result<()> {
    let config = SyncConfig::from_env();
    let data_dir = config.resolved_data_dir();

    let credentials =
        FileCredentialsProvider::new().wrap_err("Cannot locate credentials file")?;
    tracing::debug!(
        credentials = %credentials.credentials_path().display(),
        data_dir = %data_dir.display(),
        api = %config.api_base_url,
        "Starting"
    );

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(credentials),
        Arc::new(FileEventStore::new(&data_dir)),
    );
    orchestrator.init().await;

    match command {
        Command::Status => {
            let stats = orchestrator.get_stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::SyncOnce => {
            let outcome = orchestrator.force_sync().await;
            println!("{:?}", outcome);
        }
        Command::Enable => enable(&orchestrator).await?,
        Command::Disable => {
            orchestrator.disable_sync().await;
            println!("Sync disabled");
        }
        Command::Daemon => daemon(&orchestrator, &data_dir).await?,
    }

    orchestrator.shutdown();
    Ok(())
}

async fn enable(orchestrator: &Orchestrator) -> Result<()> {
    match orchestrator.enable_sync().await {
        EnableOutcome::Enabled => println!("Sync enabled"),
        EnableOutcome::NotSignedIn => {
            return Err(eyre!("Not signed in: no identity in the credentials file"));
        }
        EnableOutcome::AuthorizationRequired { url } => {
            println!("Authorize access to your fitness account:\n  {}", url);
            if let Err(e) = webbrowser::open(&url) {
                tracing::warn!(error = %e, "Cannot open browser");
            }
        }
        EnableOutcome::Failed(message) => {
            return Err(eyre!("Cannot enable sync: {}", message));
        }
    }
    Ok(())
}

async fn daemon(orchestrator: &Orchestrator, data_dir: &std::path::Path) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .wrap_err("Failed to install Ctrl-C handler")?;

    // Kept alive for the whole daemon run
    let _watcher = match spawn_store_watcher(data_dir, orchestrator.signal_sender()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Store watcher unavailable, external changes will be missed");
            None
        }
    };

    let mut events = orchestrator.subscribe_channel();

    tracing::info!("Daemon running, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            Some(event) = events.recv() => {
                if let OrchestratorEvent::SyncFailed(failure) = &event {
                    tracing::warn!(failure = ?failure, "Sync failed");
                }
                match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(target: "fitsync::events", "{}", json),
                    Err(e) => tracing::warn!(error = %e, "Cannot serialize event"),
                }
            }
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}
