//! Voxnote binary: composition root plus a line-oriented driver.
//!
//! The driver stands in for the UI: it forwards requests to the session
//! controller and scripts the mock recognition engine from stdin, so the
//! whole arbitration path can be exercised interactively without audio
//! hardware.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxnote_core::config::VoxnoteConfig;
use voxnote_core::Result;
use voxnote_engine::hypothesis::{final_payload, partial_payload};
use voxnote_engine::{EngineEvent, MockEngine};
use voxnote_mic::{MicrophoneArbiter, StubMicrophoneProbe};
use voxnote_session::{SessionController, SessionControllerHandle, UtteranceProcessor};
use voxnote_store::TranscriptStore;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path() -> PathBuf {
    env::var_os("VOXNOTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| expand_home("~/.voxnote/config.toml"))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = VoxnoteConfig::load_or_default(&config_path());
    init_tracing(&config.general.log_level);

    let store = TranscriptStore::open(expand_home(&config.general.data_dir))?;
    let processor = Arc::new(UtteranceProcessor::new(
        store,
        config.storage.active_folder.clone(),
    ));
    processor.set_on_persisted(Box::new(|utterance| {
        println!("[saved] {}", utterance.render_line());
    }));

    let engine = MockEngine::new();
    let arbiter = MicrophoneArbiter::new(Arc::new(StubMicrophoneProbe));
    let controller = SessionController::spawn(
        Arc::new(engine.clone()),
        arbiter,
        Arc::clone(&processor),
        &config,
    );
    info!(
        phrase = %config.trigger.phrase,
        keyword_spotting = config.trigger.keyword_spotting,
        "Voxnote started"
    );

    run_driver(engine, controller, processor, config.trigger.phrase).await
}

fn print_help() {
    println!("commands:");
    println!("  start | stop          request dictation start/stop");
    println!("  spotting on|off       toggle keyword spotting");
    println!("  phrase <text>         change the trigger phrase");
    println!("  folder <name>         change the active folder");
    println!("  list [filter]         show entries in the active folder");
    println!("  state                 print the session state");
    println!("  trigger               simulate hearing the trigger phrase");
    println!("  partial <text>        simulate a partial hypothesis");
    println!("  final <text>          simulate a final hypothesis");
    println!("  quit");
}

async fn run_driver(
    engine: MockEngine,
    controller: SessionControllerHandle,
    processor: Arc<UtteranceProcessor>,
    mut phrase: String,
) -> Result<()> {
    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "" => {}
            "start" => {
                if let Err(e) = controller.request_start_dictation().await {
                    println!("error: {e}");
                }
            }
            "stop" => controller.request_stop_dictation().await?,
            "spotting" => match rest {
                "on" | "off" => {
                    if let Err(e) = controller.set_keyword_spotting_enabled(rest == "on").await {
                        println!("error: {e}");
                    }
                }
                _ => println!("usage: spotting on|off"),
            },
            "phrase" => {
                if rest.is_empty() {
                    println!("trigger phrase: {phrase}");
                } else {
                    phrase = rest.to_string();
                    controller.set_trigger_phrase(rest).await?;
                }
            }
            "folder" => {
                if rest.is_empty() {
                    println!("active folder: {}", processor.active_folder());
                } else {
                    controller.set_active_folder(rest).await?;
                }
            }
            "list" => {
                let filter = (!rest.is_empty()).then_some(rest);
                match processor.store().list(&processor.active_folder(), filter) {
                    Ok(entries) if entries.is_empty() => println!("(no entries)"),
                    Ok(entries) => {
                        for entry in entries {
                            println!("{entry}");
                        }
                    }
                    Err(e) => println!("error: {e}"),
                }
            }
            "state" => println!("{}", controller.current_state()),
            "trigger" => {
                engine.emit(EngineEvent::Final(final_payload(&phrase)));
            }
            "partial" => {
                engine.emit(EngineEvent::Partial(partial_payload(rest)));
            }
            "final" => {
                engine.emit(EngineEvent::Final(final_payload(rest)));
            }
            "quit" | "exit" => break,
            _ => print_help(),
        }
    }

    controller.shutdown().await?;
    info!("Voxnote stopped");
    Ok(())
}
