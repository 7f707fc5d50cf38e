use anyhow::Context;
use mc_runner::{ControlRequest, ProcessSupervisor, ServerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

/// Maps a console line onto a supervisor request. Unknown input is passed through.
fn parse_request(line: &str) -> Option<ControlRequest> {
    match line.trim() {
        "" => None,
        "!start" => Some(ControlRequest::Start),
        "!stop" => Some(ControlRequest::StopSlow),
        "!stop-fast" => Some(ControlRequest::StopFast),
        "!restart" => Some(ControlRequest::Restart),
        "!backup" => Some(ControlRequest::Backup),
        command => Some(ControlRequest::Command(command.to_string())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=mc_runner=debug for lifecycle details
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/config.yaml".to_string());
    let supervisor = ProcessSupervisor::from_config_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;

    let mut events = supervisor.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ServerEvent::Output(line) => println!("[{}] {}", line.category, line.line),
                ServerEvent::PlayerCount { count } => println!("* {} player(s) online", count),
                ServerEvent::Status { message } => println!("* {}", message),
                ServerEvent::Failure { kind, message } => {
                    eprintln!("! {:?}: {}", kind, message)
                }
                ServerEvent::Exited { .. } => {}
            }
        }
    });

    println!("Commands: !start !stop !stop-fast !restart !backup !quit, anything else goes to the server");
    supervisor.submit(ControlRequest::Start);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim() == "!quit" {
            break;
        }
        if let Some(request) = parse_request(&line) {
            supervisor.submit(request);
        }
    }

    if supervisor.is_running() {
        supervisor.stop_fast().await?;
    }
    Ok(())
}
