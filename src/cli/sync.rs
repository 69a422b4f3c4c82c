//! Sync command implementation.

use crate::api::auth::OAuthCredentials;
use crate::api::client::DEFAULT_BASE_URL;
use crate::api::{StationClient, ThrottledTransport};
use crate::config::{Config, ConfigStore};
use crate::shutdown::SharedShutdown;
use crate::sink::{SampleSink, TextExport, VictoriaSink};
use crate::sync::config::{DEFAULT_BURST, DEFAULT_REQUESTS_PER_HOUR};
use crate::sync::{units_for_stations, RateLimiter, ResumeToken, SyncOptions, SyncSession};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{CliError, StationsCommand};

/// Top-level command line interface.
#[derive(Debug, Parser)]
#[command(
    name = "netatmo-sync",
    version,
    about = "Export weather station history into a metrics sink"
)]
pub struct Cli {
    /// Config file path (defaults to the per-user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export measurement history into the sink
    Sync(SyncArgs),
    /// List discovered stations and their modules
    Stations(StationsCommand),
}

/// Arguments for the sync command.
#[derive(Debug, clap::Args)]
pub struct SyncArgs {
    /// Destination host:port; must accept Prometheus queries and imports at
    /// routes matching VictoriaMetrics. Exposition text goes to stdout when
    /// omitted.
    #[arg(long)]
    pub dest: Option<String>,

    /// Resume token logged by a previous run (device/module/epochSeconds).
    /// Skips as many requests as possible to avoid duplicate work.
    #[arg(long)]
    pub resume: Option<String>,

    /// Query the sink for the last exported sample and start from there
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub incremental: bool,

    /// How far back to search for the last written sample (e.g. 90d, 12h)
    #[arg(long, default_value = "90d", value_parser = parse_duration_flexible)]
    pub incremental_since: Duration,

    /// Start this long ago. 0 starts from the first recorded sample.
    #[arg(long, default_value = "0", value_parser = parse_duration_flexible)]
    pub since: Duration,

    /// Steady request rate against the upstream API
    #[arg(long, default_value_t = DEFAULT_REQUESTS_PER_HOUR)]
    pub requests_per_hour: u32,

    /// Burst allowance before throttling engages
    #[arg(long, default_value_t = DEFAULT_BURST)]
    pub burst: u32,
}

/// Parse a duration from a bare number of seconds or a number with an
/// `s`/`m`/`h`/`d`/`w` suffix.
fn parse_duration_flexible(input: &str) -> Result<Duration, CliError> {
    let input = input.trim();
    let (number, multiplier) = match input.char_indices().last() {
        Some((split, 's')) => (&input[..split], 1),
        Some((split, 'm')) => (&input[..split], 60),
        Some((split, 'h')) => (&input[..split], 60 * 60),
        Some((split, 'd')) => (&input[..split], 24 * 60 * 60),
        Some((split, 'w')) => (&input[..split], 7 * 24 * 60 * 60),
        Some(_) => (input, 1),
        None => return Err(CliError::InvalidArgument("empty duration".to_string())),
    };
    let value: u64 = number.parse().map_err(|_| {
        CliError::InvalidArgument(format!("'{input}' is not a valid duration"))
    })?;
    Ok(Duration::from_secs(value * multiplier))
}

/// Load config and build the throttled, authenticated station client.
///
/// Refreshed tokens are written back to the same config store.
pub(crate) fn build_client(
    cli: &Cli,
    shutdown: SharedShutdown,
    requests_per_hour: u32,
    burst: u32,
) -> Result<StationClient> {
    let store = match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::open_default().map_err(CliError::Config)?,
    };
    let config: Config = store.load().map_err(CliError::Config)?;

    if config.client_id.is_empty() || config.client_secret.is_empty() {
        bail!(
            "no OAuth client in {}; seed it with client_id, client_secret and a token",
            store.path().display()
        );
    }
    let token = match &config.token {
        Some(token) => token.clone(),
        None => bail!(
            "no OAuth token in {}; authorize the app and store the token first",
            store.path().display()
        ),
    };

    let limiter = Arc::new(RateLimiter::per_hour(requests_per_hour, burst));
    let transport = Arc::new(ThrottledTransport::new(
        reqwest::Client::new(),
        limiter,
        shutdown,
    ));
    let credentials = OAuthCredentials::new(
        transport.clone(),
        format!("{DEFAULT_BASE_URL}/oauth2/token"),
        config.client_id,
        config.client_secret,
        token,
    )
    .with_observer(Arc::new(store));

    Ok(StationClient::new(transport, Arc::new(credentials)))
}

impl SyncArgs {
    /// Execute the sync command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<()> {
        let resume: Option<ResumeToken> = self
            .resume
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(CliError::ResumeToken)?;

        let client = build_client(cli, shutdown, self.requests_per_hour, self.burst)?;
        let stations = client.get_stations().await.map_err(CliError::Api)?;
        let units = units_for_stations(&stations);
        info!(units = units.len(), "discovered sync units");

        let options = SyncOptions {
            incremental: self.incremental,
            incremental_lookback: self.incremental_since,
            lookback: self.since,
            resume,
        };

        match &self.dest {
            Some(dest) => {
                let mut sink = VictoriaSink::new(dest);
                run_session(&client, &mut sink, &units, options).await
            }
            None => {
                let mut sink = TextExport::stdout();
                run_session(&client, &mut sink, &units, options).await
            }
        }
    }
}

async fn run_session<K: SampleSink + Sync>(
    client: &StationClient,
    sink: &mut K,
    units: &[crate::sync::SyncUnit],
    options: SyncOptions,
) -> Result<()> {
    let mut session = SyncSession::new(client, sink, options);
    session.run(units).await.map_err(CliError::Sync)?;
    Ok(())
}
