pub mod models {
    pub mod command;
    pub mod state;
    pub mod zont;
}

pub mod capabilities;
pub mod client;
pub mod config;
pub mod db {
    pub mod models;
}
pub mod schema;
pub mod store;
pub mod utils;
pub mod services {
    pub mod expand;
    pub mod poller;
    pub mod topology;
    pub mod translate;
}

use crate::client::ZontClient;
use crate::config::{CliArgs, Config};
use crate::services::poller::{self, CycleOutcome, Poller};
use crate::store::PgStateStore;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

pub fn run(cli: &CliArgs) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (base_url={}, namespace={}, poll_interval={}s, write_check={}ms, io_settle={}s, once={})",
        cfg.zont_base_url,
        cfg.namespace,
        cfg.poll_interval.as_secs(),
        cfg.write_check_interval.as_millis(),
        cfg.io_settle.as_secs(),
        cli.once
    );

    // 2) Connect DB
    let mut conn = PgConnection::establish(&cfg.database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Apply pending database migrations
    apply_database_migrations(&mut conn)?;
    let store = PgStateStore::new(conn, &cfg.namespace);

    // 4) Init ZONT client
    let client = ZontClient::new(
        &cfg.zont_base_url,
        &cfg.zont_username,
        &cfg.zont_password,
        &cfg.zont_client_id,
        cfg.http_timeout,
    );
    let mut poller = Poller::new(client, store, cfg.io_settle);

    // 5) Single cycle
    if cli.once {
        return match poller.poll_cycle() {
            CycleOutcome::Completed {
                devices,
                published,
                failed,
            } => {
                info!("Poll: {} device(s), {} state(s) published, {} failed", devices, published, failed);
                Ok(())
            }
            other => Err(format!("poll cycle did not complete: {:?}", other)),
        };
    }

    // 6) Poll loop (steady cadence, writes checked in between)
    info!("Starting poll loop: interval={}s", cfg.poll_interval.as_secs());
    poller::run_loop(&mut poller, cfg.poll_interval, cfg.write_check_interval);
    Ok(())
}

fn main() {
    let startup = config::parse_args(std::env::args_os().skip(1))
        .and_then(|cli| config::load_env(&cli).map(|loaded| (cli, loaded)));
    let (cli, loaded_env) = match startup {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "zont-sync {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
