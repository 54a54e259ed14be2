use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use qqmusic_api::types::{CoverRequest, LyricFlags};
use qqmusic_api::{
    Config, Credential, CredentialStore, QqMusicClient, Refresher, SqliteStore,
    load_or_bootstrap, parse_vs_param, refresh_credential, submit_credential,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(
    name = "qqmusic",
    version,
    about = "QQ Music proxy: credential refresh, playback URLs, covers and lyrics"
)]
struct Cli {
    /// Config file (default: <config dir>/qqmusic-proxy/config.json)
    #[arg(long, global = true, env = "QQMUSIC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Credential database, overrides the config file
    #[arg(long, global = true, env = "QQMUSIC_DATABASE", value_name = "PATH")]
    database: Option<PathBuf>,
    /// Credential JSON used when the database is empty
    #[arg(
        long,
        global = true,
        env = "QQMUSIC_INITIAL_CREDENTIAL",
        hide_env_values = true,
        value_name = "JSON"
    )]
    initial_credential: Option<String>,
    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored credential
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
    /// Refresh the credential if it expires within 48 hours
    Refresh {
        /// Refresh even if the credential is still fresh
        #[arg(long)]
        force: bool,
    },
    /// Run the refresh check periodically
    Schedule {
        /// Seconds between checks
        #[arg(long, default_value = "86400")]
        interval_secs: u64,
    },
    /// Resolve playback URLs with quality fallback
    Url {
        /// Song mids (comma-separated or repeated)
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
        /// Preferred quality: flac, 320 or 128
        #[arg(short, long, default_value = "flac")]
        quality: String,
    },
    /// Resolve a cover image URL
    Cover {
        /// Song mid (looked up when no album mid or vs is given)
        #[arg(long)]
        mid: Option<String>,
        /// Album mid
        #[arg(long)]
        album_mid: Option<String>,
        /// vs tokens: JSON array or comma-separated list
        #[arg(long)]
        vs: Option<String>,
        /// Edge length: 150, 300, 500 or 800
        #[arg(long, default_value = "300")]
        size: u32,
        /// Skip HEAD validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Fetch and decrypt lyrics
    Lyric {
        /// Song mid
        #[arg(long, required_unless_present = "id")]
        mid: Option<String>,
        /// Numeric song id
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        no_trans: bool,
        #[arg(long)]
        no_qrc: bool,
        #[arg(long)]
        no_roma: bool,
    },
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Store a credential (JSON, bare or wrapped in {"credential": ...})
    Set {
        /// Credential JSON, or "-" to read stdin
        json: String,
    },
    /// Show the stored credential without secrets
    Show,
}

/// Wired-up config, store and client.
struct App {
    store: SqliteStore,
    client: QqMusicClient,
    credential: Option<Credential>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;
    let app = App::open(&cli)?;

    match cli.command {
        Command::Credential { action } => match action {
            CredentialAction::Set { json } => cmd_credential_set(&app, &json),
            CredentialAction::Show => cmd_credential_show(&app),
        },
        Command::Refresh { force } => print_json(&refresh_credential(&app.client, &app.store, force)?),
        Command::Schedule { interval_secs } => cmd_schedule(&app, interval_secs),
        Command::Url { ids, quality } => print_json(&app.client.resolve_playback_urls(
            &ids,
            &quality,
            app.credential.as_ref(),
        )?),
        Command::Cover {
            mid,
            album_mid,
            vs,
            size,
            no_validate,
        } => {
            let request = CoverRequest {
                mid,
                album_mid,
                vs: vs.as_deref().map(parse_vs_param).unwrap_or_default(),
                size,
                validate: !no_validate,
            };
            print_json(&app.client.resolve_cover(&request, app.credential.as_ref())?)
        }
        Command::Lyric {
            mid,
            id,
            no_trans,
            no_qrc,
            no_roma,
        } => {
            let flags = LyricFlags {
                trans: !no_trans,
                qrc: !no_qrc,
                roma: !no_roma,
            };
            print_json(&app.client.fetch_lyrics(
                mid.as_deref(),
                id,
                &flags,
                app.credential.as_ref(),
            )?)
        }
    }
}

fn log_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        // RUST_LOG wins when set and valid
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    // stdout carries the JSON answers
    tracing_subscriber::registry()
        .with(log_filter(verbose, quiet))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .try_init()
        .context("failed to initialise logging")?;
    Ok(())
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
        .context("failed to load config")?;
        if let Some(db) = &cli.database {
            config.database = Some(db.clone());
        }
        if let Some(initial) = &cli.initial_credential {
            config.initial_credential = Some(initial.clone());
        }

        let db_path = config.database_path()?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let credential = load_or_bootstrap(&store, config.initial_credential.as_deref())?;
        let client = QqMusicClient::from_config(&config)?;
        info!(
            database = %db_path.display(),
            authenticated = credential.is_some(),
            "ready"
        );

        Ok(Self {
            store,
            client,
            credential,
        })
    }
}

// ── credential ──

fn cmd_credential_set(app: &App, json: &str) -> Result<()> {
    let input = if json == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else {
        json.to_owned()
    };
    let credential = submit_credential(&app.store, &input).context("credential rejected")?;
    print_json(&json!({ "success": true, "musicid": credential.musicid }))
}

fn cmd_credential_show(app: &App) -> Result<()> {
    let Some(c) = app.store.get()? else {
        bail!("no credential stored, use `qqmusic credential set`");
    };
    print_json(&json!({
        "musicid": c.musicid,
        "login_type": c.effective_login_type(),
        "musickey_createtime": c.musickey_createtime,
        "key_expires_in": c.expires_in(),
        "expiry": c.expiry(),
        "has_refresh_key": !c.refresh_key.is_empty(),
        "has_refresh_token": !c.refresh_token.is_empty(),
    }))
}

// ── schedule ──

fn cmd_schedule(app: &App, interval_secs: u64) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(60));
    let refresher = Refresher::new(&app.client, &app.store);
    info!(interval_secs = interval.as_secs(), "refresh scheduler started");
    loop {
        refresher.run_scheduled();
        thread::sleep(interval);
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
