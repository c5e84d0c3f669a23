use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use imgfloat::asset::{AssetId, CanvasSize, ChannelState};
use imgfloat::catalog::{self, CatalogError};
use imgfloat::config::{ClientConfig, ConfigError};
use imgfloat::loader::{HttpImageLoader, LoadError};
use imgfloat::message::SyncMessage;
use imgfloat::reader::{Reconciler, ResourceLoader};
use imgfloat::relay::memory::MemoryRelay;
use imgfloat::relay::ws::WsConnector;
use imgfloat::relay::{Connector, RelayChannel, RelayError, RelayEvent, Role};
use imgfloat::writer::{WriterError, WriterSession};

const DEMO_CHANNEL: &str = "demo";
const DEMO_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("relay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("timed out waiting for the reader")]
    Timeout,
    #[error("reader diverged from writer")]
    Diverged,
}

#[derive(Parser, Debug)]
#[command(name = "imgfloat", about = "Image overlay writer and reader client")]
struct Cli {
    #[arg(long, env = "IMGFLOAT_RELAY_URL")]
    relay_url: Option<String>,

    #[arg(long, env = "IMGFLOAT_ASSET_BASE_URL")]
    asset_base_url: Option<String>,

    #[arg(long, help = "Consecutive failed connects before giving up; 0 retries forever")]
    max_reconnect_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a channel and log the reconciled state after every message.
    Read { channel: String },
    /// Edit a channel from stdin line commands.
    Write { channel: String },
    /// Run a writer and a reader against an in-process relay.
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(relay_url) = cli.relay_url {
        config.relay_url = relay_url;
    }
    if let Some(asset_base_url) = cli.asset_base_url {
        config.asset_base_url = asset_base_url;
    }
    if let Some(attempts) = cli.max_reconnect_attempts {
        config.max_reconnect_attempts = attempts;
    }

    match cli.command {
        Command::Read { channel } => run_read(&config, &channel).await,
        Command::Write { channel } => run_write(&config, &channel).await,
        Command::Demo => run_demo(&config).await,
    }
}

// =============================================================================
// READ
// =============================================================================

async fn run_read(config: &ClientConfig, channel: &str) -> Result<(), CliError> {
    let connector: Arc<dyn Connector> = Arc::new(WsConnector::new(&config.relay_url, Role::Reader)?);
    let mut relay = RelayChannel::connect(connector, channel)
        .await?
        .with_max_reconnect_attempts(config.max_reconnect_attempts);
    let mut events = relay.subscribe();

    // Readers never publish; the sender only keeps the relay task alive.
    let (_outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let relay_task = tokio::spawn(relay.run(outbound_rx));

    let (loader, mut completions) = HttpImageLoader::new()?;
    let mut reconciler = Reconciler::new(loader);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(outcome) = reconciler.apply_event(event) {
                    debug!(?outcome, "reader: applied");
                    print_state("reader", reconciler.state());
                }
            }
            completion = completions.recv() => {
                let Some(completion) = completion else { break };
                if reconciler.on_resource_loaded(completion) {
                    let ready = reconciler.drawables(config.canvas).count();
                    info!(ready, assets = reconciler.state().len(), "reader: resources updated");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(%channel, stats = ?reconciler.stats(), "reader: interrupted");
                return Ok(());
            }
        }
    }

    relay_task.await??;
    Ok(())
}

// =============================================================================
// WRITE
// =============================================================================

async fn run_write(config: &ClientConfig, channel: &str) -> Result<(), CliError> {
    let connector: Arc<dyn Connector> = Arc::new(WsConnector::new(&config.relay_url, Role::Writer)?);
    let mut relay = RelayChannel::connect(connector, channel)
        .await?
        .with_max_reconnect_attempts(config.max_reconnect_attempts);
    let mut events = relay.subscribe();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let relay_task = tokio::spawn(relay.run(outbound_rx));
    let mut session = WriterSession::new(outbound_tx, config.canvas);
    let http = reqwest::Client::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(WriteCommand::Quit) => break,
                    Some(command) => {
                        if let Err(e) = apply_command(&mut session, command, config, channel, &http).await {
                            eprintln!("error: {e}");
                        }
                    }
                    None => eprintln!("commands: add <ref> | select <x> <y> | move <dx> <dy> | drag <x0> <y0> <x1> <y1> | delete | list | library | resync | quit"),
                }
            }
            event = events.recv() => {
                match event {
                    Some(RelayEvent::Reconnected { generation }) => {
                        info!(generation, "writer: relay reconnected, resyncing");
                        session.resync();
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    drop(session);
    relay_task.await??;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum WriteCommand {
    Add(String),
    Select(f64, f64),
    Move(f64, f64),
    Drag { from: (f64, f64), to: (f64, f64) },
    Delete,
    List,
    Library,
    Resync,
    Quit,
}

fn parse_command(line: &str) -> Option<WriteCommand> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let numbers: Vec<f64> = words.clone().map(str::parse).collect::<Result<_, _>>().unwrap_or_default();
    let command = match (verb, numbers.as_slice()) {
        ("add", _) => WriteCommand::Add(words.next()?.to_owned()),
        ("select", [x, y]) => WriteCommand::Select(*x, *y),
        ("move", [dx, dy]) => WriteCommand::Move(*dx, *dy),
        ("drag", [x0, y0, x1, y1]) => WriteCommand::Drag { from: (*x0, *y0), to: (*x1, *y1) },
        ("delete", []) => WriteCommand::Delete,
        ("list", []) => WriteCommand::List,
        ("library", []) => WriteCommand::Library,
        ("resync", []) => WriteCommand::Resync,
        ("quit" | "exit", []) => WriteCommand::Quit,
        _ => return None,
    };
    Some(command)
}

async fn apply_command(
    session: &mut WriterSession<mpsc::UnboundedSender<SyncMessage>, CanvasSize>,
    command: WriteCommand,
    config: &ClientConfig,
    channel: &str,
    http: &reqwest::Client,
) -> Result<(), CliError> {
    match command {
        WriteCommand::Add(reference) => {
            let source_ref = if reference.contains("://") {
                reference
            } else {
                catalog::source_ref(&config.asset_base_url, channel, &reference)
            };
            let id = session.add_asset(source_ref);
            println!("added {id}");
        }
        WriteCommand::Select(x, y) => match session.select_at(x, y) {
            Some(id) => println!("selected {id}"),
            None => println!("nothing at ({x}, {y})"),
        },
        WriteCommand::Move(dx, dy) => {
            let id = session.move_selected(dx, dy)?;
            println!("moved {id}");
        }
        WriteCommand::Drag { from, to } => {
            if session.begin_drag(from.0, from.1) {
                session.drag_to(to.0, to.1);
                session.end_drag();
                println!("dragged to ({}, {})", to.0, to.1);
            } else {
                println!("press is not on the selected asset");
            }
        }
        WriteCommand::Delete => {
            let id = session.delete_selected()?;
            println!("deleted {id}");
        }
        WriteCommand::List => print_state("writer", session.state()),
        WriteCommand::Library => {
            for entry in catalog::list_assets(http, &config.asset_base_url, channel).await? {
                println!("{}  {}", entry.filename, entry.content_type);
            }
        }
        WriteCommand::Resync => session.resync(),
        WriteCommand::Quit => {}
    }
    Ok(())
}

// =============================================================================
// DEMO
// =============================================================================

/// Demo readers track assets without fetching image content.
struct NoFetch;

impl ResourceLoader for NoFetch {
    type Resource = ();

    fn request(&mut self, id: AssetId, url: &str) {
        debug!(%id, %url, "demo: resource fetch skipped");
    }
}

async fn run_demo(config: &ClientConfig) -> Result<(), CliError> {
    let hub = MemoryRelay::new();

    let mut writer_relay = RelayChannel::connect(Arc::new(hub.connector(Role::Writer)), DEMO_CHANNEL).await?;
    let mut writer_events = writer_relay.subscribe();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(writer_relay.run(outbound_rx));

    let mut reader_relay = RelayChannel::connect(Arc::new(hub.connector(Role::Reader)), DEMO_CHANNEL).await?;
    let mut reader_events = reader_relay.subscribe();
    let (_reader_tx, reader_rx) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(reader_relay.run(reader_rx));

    let mut session = WriterSession::new(outbound_tx, config.canvas);
    let mut reconciler = Reconciler::new(NoFetch);

    session.add_asset("cat.png");
    next_message(&mut reader_events, &mut reconciler).await?;
    session.add_asset("dog.png");
    next_message(&mut reader_events, &mut reconciler).await?;
    session.move_selected(config.canvas.width / 10.0, 0.0)?;
    next_message(&mut reader_events, &mut reconciler).await?;
    print_state("writer", session.state());
    print_state("reader", reconciler.state());

    info!("demo: severing relay links");
    hub.sever(DEMO_CHANNEL);
    loop {
        match tokio::time::timeout(DEMO_EVENT_TIMEOUT, writer_events.recv()).await {
            Ok(Some(RelayEvent::Reconnected { .. })) => break,
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return Err(CliError::Timeout),
        }
    }
    session.resync();
    while reconciler.stats().reconnects == 0 || reconciler.is_stale() || reconciler.state() != session.state() {
        next_message(&mut reader_events, &mut reconciler).await?;
    }

    session.delete_selected()?;
    next_message(&mut reader_events, &mut reconciler).await?;
    print_state("writer", session.state());
    print_state("reader", reconciler.state());
    info!(stats = ?reconciler.stats(), "demo: reader stats");

    let converged = reconciler.state() == session.state();
    drop(session);
    writer_task.await??;
    reader_task.abort();
    if converged { Ok(()) } else { Err(CliError::Diverged) }
}

/// Apply reader events until one carries a sync message.
async fn next_message<L: ResourceLoader>(
    events: &mut mpsc::UnboundedReceiver<RelayEvent>,
    reconciler: &mut Reconciler<L>,
) -> Result<(), CliError> {
    loop {
        let event = match tokio::time::timeout(DEMO_EVENT_TIMEOUT, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) | Err(_) => return Err(CliError::Timeout),
        };
        if let Some(outcome) = reconciler.apply_event(event) {
            debug!(?outcome, "demo: reader applied");
            return Ok(());
        }
    }
}

fn print_state(label: &str, state: &ChannelState) {
    println!("{label}: {} asset(s)", state.len());
    for asset in state.iter() {
        println!(
            "  {}  x={:.2} y={:.2} w={:.2} h={:.2}  {}",
            asset.id(),
            asset.position.x,
            asset.position.y,
            asset.size.w,
            asset.size.h,
            asset.source_ref
        );
    }
}
