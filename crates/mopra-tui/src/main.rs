mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use anyhow::Result;
use mopra_core::{ChatController, Config, FileStore, MopraClient};
use tokio::sync::mpsc;
use tracing::{error, info};

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {:#}", e);
        Config::new()
    });

    // Logging is best effort; the client runs without it
    if let Err(e) = logging::init(config.log_level.as_deref()) {
        eprintln!("{:#}", e);
    }

    let store = FileStore::open_default()?;
    info!(storage = ?store.path(), "starting mopra");

    let client = MopraClient::new(&config.server_url());
    let (tx, completions) = mpsc::unbounded_channel();
    let controller = ChatController::new(client, Box::new(store), &config, tx);
    let mut app = App::new(controller);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, EventHandler::new(completions)).await;
    tui::restore()?;

    if let Err(e) = &result {
        error!("exiting with error: {:#}", e);
    }
    info!("bye");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, mut events: EventHandler) -> Result<()> {
    // The first frame measures the transcript area
    terminal.draw(|frame| ui::render(app, frame))?;
    app.scroll_chat_to_bottom();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
