//! `credshield` - CLI for the exposure coordinator
//!
//! Exposes a record read from a JSON file on the system clipboard and the
//! keyboard bridge, then waits until every exposure has been retracted.
//! Ctrl-C locks the record store, which retracts everything at once.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, info};

use credshield::cli::{Cli, Command, ConfigCommand, ExposeCommand};
use credshield::clipboard::SystemClipboard;
use credshield::keyboard::{KeyboardBridge, UnavailableInputMethods};
use credshield::notify::LogNotifier;
use credshield::store::MemoryRecordStore;
use credshield::{
    init_logging, Collaborators, Config, CoordinatorEvent, ExposeOptions, ExposureCoordinator,
    Record,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Expose(expose_cmd) => handle_expose(config, &expose_cmd).await,
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_expose(mut config: Config, cmd: &ExposeCommand) -> anyhow::Result<()> {
    if let Some(timeout) = cmd.timeout {
        config.clipboard_timeout_seconds = timeout;
    }

    let contents = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("reading record from {}", cmd.file.display()))?;
    let record: Record = serde_json::from_str(&contents)
        .with_context(|| format!("parsing record in {}", cmd.file.display()))?;
    let id = record.id;

    let store = Arc::new(MemoryRecordStore::new());
    store.insert(record);
    store.open(id);

    let coordinator = ExposureCoordinator::new(
        config,
        Collaborators {
            store: store.clone(),
            clipboard: Arc::new(SystemClipboard::new()),
            keyboard: Arc::new(KeyboardBridge::new()),
            notifier: Arc::new(LogNotifier::new()),
            input_methods: Arc::new(UnavailableInputMethods),
        },
    )?;
    let events = coordinator.subscribe();
    let reporter = tokio::spawn(report_events(events));

    let exposed = coordinator
        .expose_by_id(
            &id,
            ExposeOptions {
                close_after_create: cmd.close_after_create,
            },
        )
        .await;

    if cmd.json {
        let output = serde_json::json!({
            "record": id,
            "exposed": exposed,
            "status": coordinator.status(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if exposed.is_empty() {
        println!("Nothing to expose for {id}");
    } else {
        println!("Exposed {id}");
        println!("  Password:  {}", exposed.password);
        println!("  Username:  {}", exposed.username);
        println!("  Keyboard:  {}", exposed.keyboard);
        if let Some(timeout) = coordinator.config().clipboard_timeout() {
            println!("  Clipboard clears in {}s", timeout.as_secs());
        }
    }

    if coordinator.is_active() {
        tokio::select! {
            () = coordinator.wait_for_shutdown() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                info!("Interrupted, locking record store");
                store.lock();
                coordinator.wait_for_shutdown().await;
            }
        }
    }

    drop(coordinator);
    reporter.abort();
    Ok(())
}

async fn report_events(mut events: broadcast::Receiver<CoordinatorEvent>) {
    loop {
        match events.recv().await {
            Ok(CoordinatorEvent::Advisory { message }) => eprintln!("{message}"),
            Ok(CoordinatorEvent::ShutDown { session }) => info!(session, "All exposures retracted"),
            Ok(event) => debug!(?event, "Coordinator event"),
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!(
                    "  Clipboard notifications:  {}",
                    config.enable_clipboard_notifications
                );
                println!("  Keyboard bridge:          {}", config.enable_keyboard_bridge);
                match config.clipboard_timeout() {
                    Some(timeout) => {
                        println!("  Clipboard timeout:        {}s", timeout.as_secs());
                    }
                    None => println!("  Clipboard timeout:        never"),
                }
                println!(
                    "  Auto-open keyboard:       {}",
                    config.auto_open_keyboard_chooser
                );
                println!(
                    "  Keyboard input method:    {}",
                    config.keyboard_input_method_id
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
