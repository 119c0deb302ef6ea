use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use sai_chat::app::App;
use sai_chat::session::SessionEvent;
use sai_chat::tui::{self, EventHandler, Tui};
use sai_chat::{handler, logging, ui, ChatSession, Config, HttpBackend};

#[derive(Parser)]
#[command(name = "sai-chat")]
#[command(version, about = "Terminal chat widget for a local assistant endpoint")]
struct Cli {
    /// Endpoint prompts are POSTed to
    #[arg(short, long, env = "SAI_ENDPOINT")]
    endpoint: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the effective config to the config file and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    if cli.write_config {
        config.save_to(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let log_path = match cli.log_file {
        Some(path) => path,
        None => logging::default_log_path()?,
    };
    logging::configure_logging(&log_path)?;
    info!(endpoint = %config.endpoint, "starting");

    let backend = HttpBackend::new(&config.endpoint, &config.prompt_field)?;
    let (session_tx, mut session_rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::new(backend), config.timings(), session_tx);
    session.check_backend();
    let mut app = App::new(session, config.endpoint.clone());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut session_rx).await;
    tui::restore()?;

    info!("exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    session_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(300));

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event),
            Some(event) = session_rx.recv() => app.session.apply(event),
            else => break,
        }
    }

    Ok(())
}
