use anyhow::Result;
use clap::Parser;
use std::io::Write;
use tracing::info;
use voicelink::{Config, ConnectionPhase, VoiceSession};

#[derive(Parser)]
#[command(name = "voicelink", about = "Real-time voice client for conversational AI agents")]
struct Cli {
    /// Agent to talk to (omit for the backend's default agent)
    #[arg(long)]
    agent: Option<String>,

    /// Configuration file name, config-crate style (extension optional)
    #[arg(long, default_value = "config/voicelink")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("voicelink v0.1.0");
    info!("Realtime endpoint: {}", cfg.backend.ws_url);

    let session = VoiceSession::new(cfg.session_config(cli.agent));
    let mut state_rx = session.subscribe();

    // Render transcripts as they arrive: finals on their own line, the
    // current partial redrawn in place.
    let renderer = tokio::spawn(async move {
        let mut finals_printed = 0usize;
        let mut last_error: Option<String> = None;

        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();

            if state.last_error != last_error {
                if let Some(err) = &state.last_error {
                    eprintln!("\nerror: {err}");
                }
                last_error = state.last_error.clone();
            }

            let finals: Vec<_> = state.transcript.iter().filter(|e| e.is_final).collect();
            for entry in finals.iter().skip(finals_printed) {
                println!("\r[{}] {}", entry.role, entry.content);
            }
            finals_printed = finals.len();

            if let Some(open) = state.transcript.iter().rev().find(|e| !e.is_final) {
                print!("\r[{}] {}", open.role, open.content);
                std::io::stdout().flush().ok();
            }

            if matches!(state.phase, ConnectionPhase::Ended | ConnectionPhase::Error) {
                break;
            }
        }
    });

    session.connect().await;

    if session.state().phase != ConnectionPhase::Connected {
        renderer.abort();
        anyhow::bail!(
            "Could not start session: {}",
            session
                .state()
                .last_error
                .unwrap_or_else(|| "unknown error".to_string())
        );
    }

    info!("Session live, press Ctrl-C to hang up");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Hanging up");
        }
        _ = renderer => {
            info!("Session over");
        }
    }

    session.disconnect().await;

    let stats = session.stats();
    info!(
        "Call {} finished: {:.1}s, {} frames sent, {} frames received, {} transcript entries",
        stats.session_id,
        stats.duration_secs,
        stats.frames_sent,
        stats.frames_received,
        stats.transcript_entries
    );

    Ok(())
}
