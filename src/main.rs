use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use netatlas::config::{Config, Overrides, DEFAULT_CONFIG_FILE};
use netatlas::db::devices::MetadataUpdate;
use netatlas::devices::{self, Endpoint, ListParams};
use netatlas::discovery::probe::NetworkProbes;
use netatlas::discovery::Orchestrator;
use netatlas::metrics::RunMetrics;
use netatlas::runs::{self, StartRun};
use netatlas::topology::{self, StoreSource, TopologyQuery};
use netatlas::{db, import, utils};

#[derive(Debug, Parser)]
#[command(version, about = "Network discovery and topology projection")]
struct Cli {
    /// Path of the toml configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Path and name of database
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Increase verbosity; repeat for more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Opaque cursor from a previous page
    #[arg(long)]
    cursor: Option<String>,

    /// Page size (1-500, default 50)
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Debug, Args)]
struct MetadataArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl MetadataArgs {
    fn update(self) -> MetadataUpdate {
        MetadataUpdate {
            display_name: self.name,
            owner: self.owner,
            location: self.location,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the discovery orchestrator until interrupted
    Daemon,
    /// Queue a discovery run
    Discover {
        /// IPv4/IPv6 address or CIDR; defaults to the configured or local network
        #[arg(long)]
        scope: Option<String>,
        /// quick, standard or deep
        #[arg(long)]
        preset: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Execute the run in this process instead of waiting for the daemon
        #[arg(long)]
        now: bool,
    },
    /// Show the latest run and totals over every finished run
    Status,
    /// List runs, newest first
    Runs {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one run
    Run { id: i32 },
    /// List a run's log entries, newest first
    Logs {
        run_id: i32,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List devices
    Devices {
        /// Substring match on name, metadata or address
        #[arg(long)]
        q: Option<String>,
        /// online, offline or changed
        #[arg(long)]
        status: Option<String>,
        /// last_seen, created, updated or last_changed
        #[arg(long)]
        sort: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show every fact known about one device
    Device { id: i32 },
    /// List a device's change events, newest first
    Events {
        id: i32,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a device by hand
    AddDevice {
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Overwrite a device's name or metadata; an empty value clears it
    EditDevice {
        id: i32,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Record a manual physical link between two devices
    Link {
        device: i32,
        peer: i32,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        peer_port: Option<String>,
        #[arg(long = "type")]
        link_type: Option<String>,
    },
    /// Project stored facts into a layered view
    Topology {
        /// physical, l2, l3, services or security
        #[arg(long, default_value = "l3")]
        layer: String,
        /// device, subnet, vlan, zone or service
        #[arg(long)]
        focus_type: Option<String>,
        #[arg(long)]
        focus_id: Option<String>,
        #[arg(long)]
        depth: Option<i64>,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Import a NetBox style device list from a file or URL
    Import { source: String },
}

fn level_filter(level: &str, verbose: u8) -> LevelFilter {
    match verbose {
        0 => match level.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        },
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(config: &Config, verbose: u8) -> anyhow::Result<()> {
    let level = level_filter(&config.log_level, verbose);
    let log_config = simplelog::ConfigBuilder::new()
        .add_filter_ignore_str("sqlx")
        .add_filter_ignore_str("sea_orm")
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path))?;
        loggers.push(WriteLogger::new(level, log_config, file));
    }
    CombinedLogger::init(loggers).context("initializing logger")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn orchestrator(db: &DatabaseConnection, config: &Config) -> Orchestrator {
    let probes = Arc::new(NetworkProbes::new(&config.discovery.arp_table_path));
    Orchestrator::new(
        db.clone(),
        config.discovery.clone(),
        probes,
        Arc::new(RunMetrics::default()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        database: cli.database.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = Config::load(&cli.config, &overrides)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    init_logging(&config, cli.verbose)?;

    let database_url = config.database_url();
    let db = db::connection(&database_url)
        .await
        .with_context(|| format!("opening database {}", database_url))?;

    match cli.command {
        Command::Daemon => {
            let orchestrator = orchestrator(db, &config);
            tokio::select! {
                _ = orchestrator.run_forever() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted; totals {:?}", orchestrator.metrics().snapshot());
                }
            }
        }
        Command::Discover {
            scope,
            preset,
            tags,
            now,
        } => {
            let request = StartRun { scope, preset, tags };
            let run = runs::start_run(db, &config.discovery, &request, Utc::now()).await?;
            if !now {
                return print_json(&run);
            }
            let orchestrator = orchestrator(db, &config);
            // Older queued runs are executed first; stop once ours is terminal.
            loop {
                if orchestrator.poll_once().await?.is_none() {
                    break;
                }
                if runs::get_run(db, run.run_id).await?.status.is_terminal() {
                    break;
                }
            }
            let run = runs::get_run(db, run.run_id).await?;
            if !run.status.is_terminal() {
                bail!("run {} is still {}; is a daemon running?", run.run_id, run.status.as_str());
            }
            print_json(&run)?;
        }
        Command::Status => print_json(&runs::status(db).await?)?,
        Command::Runs { page } => {
            print_json(&runs::list_runs(db, page.cursor.as_deref(), page.limit).await?)?
        }
        Command::Run { id } => print_json(&runs::get_run(db, id).await?)?,
        Command::Logs { run_id, page } => print_json(
            &runs::run_logs(db, run_id, page.cursor.as_deref(), page.limit).await?,
        )?,
        Command::Devices {
            q,
            status,
            sort,
            json,
            page,
        } => {
            let params = ListParams {
                q,
                status,
                sort,
                cursor: page.cursor,
                limit: page.limit,
                ..Default::default()
            };
            let now = Utc::now();
            let list = devices::list_devices(db, &params, now).await?;
            if json {
                print_json(&list)?;
            } else {
                utils::display_devices(&list.items, now);
                if let Some(cursor) = list.next_cursor {
                    println!("\nmore: --cursor {}", cursor);
                }
            }
        }
        Command::Device { id } => print_json(&devices::get_device(db, id).await?)?,
        Command::Events { id, page } => print_json(
            &devices::device_events(db, id, page.cursor.as_deref(), page.limit).await?,
        )?,
        Command::AddDevice { metadata } => {
            print_json(&devices::create_device(db, &metadata.update(), Utc::now()).await?)?
        }
        Command::EditDevice { id, metadata } => print_json(
            &devices::update_device(db, id, &metadata.update(), Utc::now()).await?,
        )?,
        Command::Link {
            device,
            peer,
            port,
            peer_port,
            link_type,
        } => {
            let local = Endpoint {
                device_id: device,
                port,
            };
            let peer = Endpoint {
                device_id: peer,
                port: peer_port,
            };
            print_json(&devices::link_devices(db, &local, &peer, link_type, Utc::now()).await?)?
        }
        Command::Topology {
            layer,
            focus_type,
            focus_id,
            depth,
            limit,
        } => {
            let query = TopologyQuery::parse(
                &layer,
                focus_type.as_deref(),
                focus_id.as_deref(),
                depth,
                limit,
            )?;
            let projection = topology::project(&StoreSource::new(db), &query).await?;
            print_json(&projection)?;
        }
        Command::Import { source } => {
            let report = import::import(db, &source, Utc::now())
                .await
                .with_context(|| format!("importing {}", source))?;
            print_json(&report)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use netatlas::pagination::{DEFAULT_LIMIT, MAX_LIMIT};

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn page_limit_help_matches_pagination_bounds() {
        let cli = Cli::command();
        let runs = cli.find_subcommand("runs").unwrap();
        let limit = runs
            .get_arguments()
            .find(|arg| arg.get_id() == "limit")
            .unwrap();
        let help = limit.get_help().unwrap().to_string();
        assert!(help.contains(&format!("1-{}", MAX_LIMIT)), "{}", help);
        assert!(help.contains(&format!("default {}", DEFAULT_LIMIT)), "{}", help);
    }
}
