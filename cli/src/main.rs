mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use common::logger::init_logger;
use market::{Catalog, EntropyRandom, Quote, RandomSource};
use session::{AuthProvider, SessionController, StaticAuthProvider, UserKey};
use watchlist::store::{ChangeFeed, RemoteWatchlistStore, SqliteLocalStore, SqliteRemoteStore};
use watchlist::{ReconciliationEngine, Status, WatchlistService};

use cli::{Cli, Command, Decision, parse_line};
use config::AppConfig;

fn load_catalog(cfg: &AppConfig) -> anyhow::Result<Catalog> {
    match &cfg.catalog_path {
        Some(path) => Ok(Catalog::from_json_file(path)?),
        None => Ok(Catalog::reference()),
    }
}

/// Opens both tiers and wires engine, session controller and service.
async fn build_service(cfg: &AppConfig) -> anyhow::Result<Arc<WatchlistService>> {
    let catalog = Arc::new(load_catalog(cfg)?);
    let local = Arc::new(SqliteLocalStore::connect(&cfg.database_url).await?);

    let remote: Option<Arc<dyn RemoteWatchlistStore>> = match &cfg.remote_database_url {
        Some(url) => {
            let feed = ChangeFeed::new(cfg.remote_event_capacity);
            let store = SqliteRemoteStore::connect(url, &cfg.app_id, feed).await?;
            Some(Arc::new(store) as Arc<dyn RemoteWatchlistStore>)
        }
        None => {
            tracing::warn!("no remote tier configured; running local-only");
            None
        }
    };

    // sign-in is only meaningful with somewhere to sign in to
    let auth: Option<Arc<dyn AuthProvider>> = remote.as_ref().map(|_| {
        Arc::new(StaticAuthProvider::new(UserKey::new(cfg.app_user.clone()))) as Arc<dyn AuthProvider>
    });
    let (session, identity_rx) = SessionController::new(auth);

    let rng: Box<dyn RandomSource> = Box::new(EntropyRandom::new());
    let (engine, remote_rx) =
        ReconciliationEngine::new(catalog, rng, local, remote, cfg.remote_event_capacity);

    Ok(Arc::new(WatchlistService::new(
        Arc::new(engine),
        remote_rx,
        Arc::new(session),
        identity_rx,
    )))
}

/// Fixed-cadence steady refresh. Only failures are surfaced to the prompt.
fn start_refresh_ticker(
    service: Arc<WatchlistService>,
    interval: Duration,
    status_tx: mpsc::Sender<Status>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick fires immediately; the startup load already has fresh quotes
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let status = service.refresh_all().await;
            if status.is_error() && status_tx.send(status).await.is_err() {
                break;
            }
        }
    });
}

fn print_entries(entries: &[Quote]) {
    if entries.is_empty() {
        println!("(watchlist is empty)");
        return;
    }

    for q in entries {
        println!(
            "{:<8} {:<12} {:>10.2} {:>+8.2} ({:+.2}%)  vol {:>10}  cap {:>6}  52w {:.2}-{:.2}",
            q.id,
            q.symbol,
            q.price,
            q.change,
            q.change_percent,
            q.volume,
            q.market_cap,
            q.fifty_two_week_low,
            q.fifty_two_week_high,
        );
    }
}

/// Runs one prompt command. Returns `false` to quit.
async fn handle_command(service: &WatchlistService, command: Command) -> bool {
    let status = match command {
        Command::Add { symbol } => service.add_instrument(&symbol).await,
        Command::Remove { id } => service.remove_instrument(&id).await,
        Command::Refresh => service.refresh_all().await,
        Command::SignIn => service.sign_in().await,
        Command::SignOut => service.sign_out().await,
        Command::Migrate {
            decision: Decision::Accept,
        } => service.accept_migration().await,
        Command::Migrate {
            decision: Decision::Decline,
        } => service.decline_migration().await,
        Command::List => {
            let engine = service.engine();
            let identity = engine
                .identity()
                .await
                .map(|i| i.to_string())
                .unwrap_or_else(|| "starting".to_string());
            println!("-- {identity} ({} tier) --", engine.tier().await);
            print_entries(&engine.entries().await);
            return true;
        }
        Command::Movers => {
            let snapshot = service.engine().snapshot().await;
            match (snapshot.gainer, snapshot.loser) {
                (Some(g), Some(l)) => {
                    println!("top gainer: {} {:+.2}%", g.symbol, g.change_percent);
                    println!("top loser:  {} {:+.2}%", l.symbol, l.change_percent);
                }
                _ => println!("no quotes yet"),
            }
            return true;
        }
        Command::Quit => return false,
    };

    println!("{status}");
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let mut cfg = AppConfig::from_env();
    args.apply(&mut cfg);

    init_logger("watchlist", cfg.json_logs);
    tracing::info!(
        remote = cfg.remote_database_url.is_some(),
        refresh_secs = cfg.refresh_interval.as_secs(),
        "Starting watchlist..."
    );

    let service = build_service(&cfg).await?;

    let (status_tx, mut status_rx) = mpsc::channel::<Status>(64);
    tokio::spawn(service.clone().run(status_tx.clone()));
    start_refresh_ticker(service.clone(), cfg.refresh_interval, status_tx);

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            println!("{status}");
        }
    });

    if service.session().has_provider() {
        println!("{}", service.sign_in_anonymously().await);
    }

    println!("commands: add <SYMBOL> | remove <ID> | refresh | list | movers | sign-in | sign-out | migrate accept|decline | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(command) => {
                        if !handle_command(&service, command).await {
                            break;
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
