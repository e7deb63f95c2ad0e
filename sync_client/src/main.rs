//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p sync_client -- [--addr 127.0.0.1:40000] [--config client.json]
//!       [--name Bob] [--tick-hz 60] [--idle]
//!
//! The client connects to the server, waits for its entity to be bound, then
//! walks a looping patrol script (or stays put with `--idle`) while rendering
//! remote entities into the log.
//!
//! Console commands:
//!   status      - Show client status and entity positions
//!   disconnect  - Leave the server
//!   quit        - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use sync_client::client::{ClientState, GameClient};
use sync_client::input::{InputScript, InputState};
use sync_shared::config::SyncConfig;
use tokio::sync::mpsc;
use tracing::info;

struct Args {
    cfg: SyncConfig,
    idle: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => SyncConfig::load(Path::new(&args[i + 1]))?,
        _ => SyncConfig::default(),
    };
    let mut idle = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().context("parse --tick-hz")?;
                i += 2;
            }
            "--idle" => {
                idle = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(Args { cfg, idle })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, idle } = parse_args()?;
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client connected. Type 'status' for info, 'quit' to exit.");
    println!();

    let script = InputScript::patrol();
    let started = Instant::now();
    let mut interval = tokio::time::interval(cfg.tick_interval());
    let mut frame: u64 = 0;

    loop {
        interval.tick().await;

        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            if matches!(line.as_str(), "quit" | "exit") {
                let _ = client.disconnect("quit").await;
                return Ok(());
            }
            match client.exec_console(&line).await {
                Ok(output) => {
                    for line in output {
                        println!("{}", line);
                    }
                }
                Err(e) => {
                    println!("Error: {}", e);
                }
            }
        }

        let input = if idle || client.state != ClientState::Playing {
            InputState::IDLE
        } else {
            script.sample(started.elapsed().as_secs_f32())
        };
        client.tick(input);

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        // Stand-in for the renderer.
        for event in client.drain_render_events() {
            info!(?event, "Render");
        }

        frame += 1;
        if frame % (cfg.tick_hz.max(1) as u64 * 2) == 0 {
            for line in client.exec_console("status").await? {
                info!("{}", line);
            }
        }
    }

    Ok(())
}
