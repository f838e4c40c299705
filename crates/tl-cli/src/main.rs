mod chat;
mod gateway;
mod radar;
mod render;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use tl_core::{CoreError, TopologyProjector, classify_offline, is_urgent, urgency::urgency_hits};
use tl_store::config::JOURNAL_FILE;
use tl_store::{Config, Journal, default_base_dir};

use crate::chat::{ChatSession, compressed_path};
use crate::gateway::{AiGateway, ImageFile, interruptible};
use crate::radar::RadarTicker;

#[derive(Parser)]
#[command(name = "tl", about = "TerraLink disaster-response chat console")]
struct Cli {
    /// Config file (default: <data dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a chat message to the log
    Send {
        /// Message text
        text: String,
    },

    /// Broadcast the SOS message
    Sos,

    /// Replay the message log
    Log {
        /// Only urgent messages
        #[arg(long)]
        urgent: bool,
    },

    /// Classify text with the AI service
    Classify {
        text: String,

        /// Use the built-in keyword classifier instead of the service
        #[arg(long)]
        offline: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize text with the AI service
    Summarize {
        text: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compress an image with the AI service
    Compress {
        /// Image to upload
        file: PathBuf,

        /// Output path (default: <name>.compressed.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Watch simulated peer distances
    Radar {
        /// Stop after this many ticks (default: until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,

        /// RNG seed for a reproducible walk
        #[arg(long)]
        seed: Option<u64>,

        /// Tick period in milliseconds (default: from config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Lay out the mesh topology
    Mesh {
        /// Print every relaxation step
        #[arg(long)]
        steps: bool,
    },

    /// Interactive chat session
    Chat {
        /// RNG seed for the radar walk
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn data_dir() -> PathBuf {
    default_base_dir()
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir().join(tl_store::config::CONFIG_FILE));
    Config::load(&path).with_context(|| format!("failed to load config {}", path.display()))
}

fn open_journal() -> Result<Journal> {
    let path = data_dir().join(JOURNAL_FILE);
    Journal::open(&path).with_context(|| format!("failed to open journal {}", path.display()))
}

fn open_gateway(config: &Config) -> Result<AiGateway> {
    let gateway = AiGateway::new(&config.gateway).context("failed to build HTTP client")?;
    tracing::debug!(base_url = gateway.base_url(), "AI gateway ready");
    Ok(gateway)
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Send { text } => cmd_send(text),
        Commands::Sos => cmd_sos(),
        Commands::Log { urgent } => cmd_log(*urgent),
        Commands::Classify {
            text,
            offline,
            json,
        } => cmd_classify(&cli, text, *offline, *json).await,
        Commands::Summarize { text, json } => cmd_summarize(&cli, text, *json).await,
        Commands::Compress { file, output } => cmd_compress(&cli, file, output.as_deref()).await,
        Commands::Radar {
            ticks,
            seed,
            interval_ms,
        } => cmd_radar(&cli, *ticks, *seed, *interval_ms).await,
        Commands::Mesh { steps } => cmd_mesh(&cli, *steps),
        Commands::Chat { seed } => cmd_chat(&cli, *seed).await,
    }
}

fn cmd_send(text: &str) -> Result<()> {
    let journal = open_journal()?;
    let mut log = journal.load().context("failed to replay journal")?;
    let msg = match log.append(text) {
        Ok(msg) => msg,
        Err(CoreError::EmptyMessage) => bail!("message is empty"),
        Err(e) => return Err(e.into()),
    };
    journal.append(&msg).context("failed to journal message")?;
    println!("{}", render::message(&msg));
    Ok(())
}

fn cmd_sos() -> Result<()> {
    let journal = open_journal()?;
    let mut log = journal.load().context("failed to replay journal")?;
    let msg = log.append_sos();
    journal.append(&msg).context("failed to journal message")?;
    println!("{}", render::message(&msg));
    Ok(())
}

fn cmd_log(urgent_only: bool) -> Result<()> {
    let journal = open_journal()?;
    let log = journal.load().context("failed to replay journal")?;
    if log.is_empty() {
        println!("(no messages)");
        return Ok(());
    }
    if urgent_only {
        log.urgent().for_each(|msg| println!("{}", render::message(msg)));
    } else {
        log.all().iter().for_each(|msg| println!("{}", render::message(msg)));
    }
    Ok(())
}

async fn cmd_classify(cli: &Cli, text: &str, offline: bool, json: bool) -> Result<()> {
    let result = if offline {
        classify_offline(text)
    } else {
        let config = load_config(cli)?;
        let gateway = open_gateway(&config)?;
        interruptible(gateway.classify(text))
            .await
            .context("classify failed")?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("{}", render::classification(&result));

    // The local keyword gate is reported alongside, never merged.
    let hits = urgency_hits(text);
    if is_urgent(text) {
        println!("local:   urgent ({})", hits.join(", "));
    } else {
        println!("local:   not urgent");
    }
    Ok(())
}

async fn cmd_summarize(cli: &Cli, text: &str, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let gateway = open_gateway(&config)?;
    let result = interruptible(gateway.summarize(text))
        .await
        .context("summarize failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render::summary(&result));
    }
    Ok(())
}

async fn cmd_compress(cli: &Cli, file: &Path, output: Option<&Path>) -> Result<()> {
    let image = ImageFile::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let config = load_config(cli)?;
    let gateway = open_gateway(&config)?;
    let result = interruptible(gateway.compress(&[image]))
        .await
        .context("compress failed")?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| compressed_path(file, &result));
    tokio::fs::write(&target, &result.bytes)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;
    println!(
        "wrote {} ({} bytes, {})",
        target.display(),
        result.len(),
        result.content_type
    );
    Ok(())
}

async fn cmd_radar(
    cli: &Cli,
    ticks: Option<u64>,
    seed: Option<u64>,
    interval_ms: Option<u64>,
) -> Result<()> {
    let config = load_config(cli)?;
    let estimator = config.radar.estimator().context("invalid radar peers")?;
    let period = Duration::from_millis(interval_ms.unwrap_or(config.radar.tick_ms).max(1));

    let rng = seeded_rng(seed);
    let ticker = match ticks {
        Some(n) => RadarTicker::spawn_bounded(estimator, rng, period, n),
        None => RadarTicker::spawn(estimator, rng, period),
    };
    let mut snapshots = ticker.subscribe();
    println!("{}", render::peers(&ticker.latest()));

    // Watch keeps only the latest value, so a slow terminal may skip a tick.
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", render::peers(&snapshot));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let estimator = ticker.stop().await;
    tracing::debug!(ticks = estimator.ticks(), "radar finished");
    Ok(())
}

fn cmd_mesh(cli: &Cli, steps: bool) -> Result<()> {
    let config = load_config(cli)?;
    let graph = config.mesh.graph().context("invalid mesh topology")?;
    let mut projector = TopologyProjector::new(graph, config.mesh.layout_params());

    while let Some(snapshot) = projector.step() {
        if steps {
            println!("{}", render::layout_step(&snapshot));
        }
    }
    println!("{}", render::layout(&projector));
    Ok(())
}

async fn cmd_chat(cli: &Cli, seed: Option<u64>) -> Result<()> {
    let config = load_config(cli)?;
    let journal = open_journal()?;
    let log = journal.load().context("failed to replay journal")?;
    let estimator = config.radar.estimator().context("invalid radar peers")?;
    let gateway = open_gateway(&config)?;

    let (session, rx) = ChatSession::new(
        log,
        estimator,
        Some(journal),
        gateway,
        config.mesh.clone(),
        seeded_rng(seed),
        std::io::stdout(),
    );
    session.start_radar(Duration::from_millis(config.radar.tick_ms));
    session.start_stdin();

    let (log, proximity) = session.run(rx).await?;
    println!(
        "session closed: {} messages, {} radar ticks",
        log.len(),
        proximity.ticks()
    );
    Ok(())
}
