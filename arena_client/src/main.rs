//! Standalone headless client.
//!
//! Usage:
//!   cargo run -p arena_client -- [--url ws://127.0.0.1:9001] [--id 1] [--token abc] [--config client.json]
//!
//! Joins a room, wanders around firing at random, respawns on death, and
//! steps interpolation at the configured render rate so the same code paths
//! run as under a real renderer.
//!
//! Console commands:
//!   status  - Show session and world status
//!   relife  - Respawn after death
//!   quit    - Close the session and exit

use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use arena_client::{input::InputCell, Session};
use arena_shared::{config::ClientConfig, ids::PlayerId};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    // A config file, if given, is the base the other flags override.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            ClientConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                cfg.server_url = args[i + 1].clone();
                i += 2;
            }
            "--id" if i + 1 < args.len() => {
                cfg.player_id = PlayerId(args[i + 1].parse().context("parse --id")?);
                i += 2;
            }
            "--token" if i + 1 < args.len() => {
                cfg.token = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

fn status_lines(session: &Session) -> Vec<String> {
    let view = session.world().view();
    let mut out = vec![
        format!("Player: {}", session.player_id()),
        format!("State: {:?}", view.state),
        format!(
            "Position: ({:.1}, {:.1}) hp={}",
            view.local.position.x, view.local.position.z, view.local.hp
        ),
        format!("Enemies: {}", view.enemies.len()),
        format!("Bullets: {}", view.bullets.len()),
        format!("Obstacles: {}", view.obstacles.len()),
    ];
    if let Some(t) = view.left_time {
        out.push(format!("Time left: {t}s"));
    }
    out
}

/// Nudges the input to a new random heading now and then.
fn wander(input: &InputCell, rng: &mut impl Rng) {
    if rng.gen_bool(0.05) {
        let heading = rng.gen_range(0.0f32..360.0).to_radians();
        input.update(|i| {
            i.right = heading.sin();
            i.forward = heading.cos();
        });
    }
    if rng.gen_bool(0.1) {
        let aim = rng.gen_range(0.0f32..360.0).to_radians();
        input.update(|i| {
            i.aim_x = aim.sin();
            i.aim_y = aim.cos();
            i.fire = rng.gen_bool(0.5);
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(url = %cfg.server_url, player_id = %cfg.player_id, "Starting client");

    let input = Arc::new(InputCell::new());
    let session = Session::connect(&cfg, input.clone())
        .await
        .context("connect")?;
    let world = session.world();

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
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let render_period = Duration::from_secs_f32(1.0 / cfg.render_hz.max(1) as f32);
    let mut render = tokio::time::interval(render_period);
    let mut rng = rand::thread_rng();
    let mut last_state = session.state();

    loop {
        tokio::select! {
            _ = render.tick() => {
                world.step(session.interp_blend());
                if session.is_started() {
                    wander(&input, &mut rng);
                }
                if input.take_died() {
                    info!("Died, requesting respawn");
                    session.send_relife();
                }
                let state = session.state();
                if state != last_state {
                    for line in status_lines(&session) {
                        info!("{line}");
                    }
                    last_state = state;
                }
            }
            Some(line) = console_rx.recv() => {
                match line.as_str() {
                    "status" => {
                        for l in status_lines(&session) {
                            println!("{l}");
                        }
                    }
                    "relife" => {
                        session.send_relife();
                        println!("Respawn requested");
                    }
                    "quit" | "exit" => {
                        session.close();
                        break;
                    }
                    other => println!("Unknown command: {other}"),
                }
            }
            _ = session.wait_closed() => {
                warn!("Connection to room lost");
                break;
            }
        }
    }

    for line in status_lines(&session) {
        info!("{line}");
    }
    Ok(())
}
