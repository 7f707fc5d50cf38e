#![cfg(unix)]

use mc_runner::config::ServerConfig;
use mc_runner::error::{Error, Result};
use mc_runner::server::ServerProcess;
use mc_runner::transport::{StdinWriter, spawn_line_reader};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

fn process_for(command: &str, args: &[&str]) -> ServerProcess {
    ServerProcess::new(ServerConfig {
        command: command.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        working_dir: PathBuf::from("."),
        env: HashMap::new(),
    })
}

async fn next_line(lines: &mut mpsc::Receiver<Result<String>>) -> Option<Result<String>> {
    tokio::time::timeout(Duration::from_secs(5), lines.recv())
        .await
        .expect("timed out waiting for output")
}

#[tokio::test]
async fn test_commands_echo_back_in_order() -> Result<()> {
    let mut process = process_for("cat", &[]);
    process.start()?;

    let writer = StdinWriter::new("cat", process.take_stdin()?);
    let (tx, mut lines) = mpsc::channel(8);
    spawn_line_reader(process.take_output()?, "output", tx);

    for command in ["list", "say hello", "save-all"] {
        writer.write_line(command).await?;
    }

    assert_eq!(next_line(&mut lines).await.unwrap()?, "list\n");
    assert_eq!(next_line(&mut lines).await.unwrap()?, "say hello\n");
    assert_eq!(next_line(&mut lines).await.unwrap()?, "save-all\n");

    drop(writer);
    assert!(process.wait().await?.success());
    assert!(next_line(&mut lines).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_stderr_is_merged_and_invalid_utf8_replaced() -> Result<()> {
    let mut process = process_for("sh", &["-c", r"printf 'bad \377 byte\n' >&2"]);
    process.start()?;

    let (tx, mut lines) = mpsc::channel(8);
    spawn_line_reader(process.take_output()?, "output", tx);

    let line = next_line(&mut lines).await.unwrap()?;
    assert_eq!(line, "bad \u{FFFD} byte\n");
    assert!(next_line(&mut lines).await.is_none());

    process.wait().await?;
    Ok(())
}

#[tokio::test]
async fn test_stdout_and_stderr_keep_emission_order() -> Result<()> {
    let script = r#"i=0
while [ $i -lt 200 ]; do
    if [ $((i % 2)) -eq 0 ]; then echo "L$i"; else echo "L$i" >&2; fi
    i=$((i + 1))
done"#;
    let mut process = process_for("sh", &["-c", script]);
    process.start()?;

    let (tx, mut lines) = mpsc::channel(8);
    spawn_line_reader(process.take_output()?, "output", tx);

    let mut received = Vec::new();
    while let Some(line) = next_line(&mut lines).await {
        received.push(line?);
    }
    let expected: Vec<String> = (0..200).map(|i| format!("L{}\n", i)).collect();
    assert_eq!(received, expected);

    assert!(process.wait().await?.success());
    Ok(())
}

#[tokio::test]
async fn test_write_after_exit_fails() -> Result<()> {
    let mut process = process_for("true", &[]);
    process.start()?;
    let writer = StdinWriter::new("true", process.take_stdin()?);
    process.wait().await?;

    // The first write can land in the pipe buffer; keep writing until the broken pipe shows
    let mut result = Ok(());
    for _ in 0..64 {
        result = writer.write_line("list").await;
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(Error::Command(_))));
    Ok(())
}

#[tokio::test]
async fn test_pipes_can_only_be_taken_once() -> Result<()> {
    let mut process = process_for("cat", &[]);
    process.start()?;

    let _stdin = process.take_stdin()?;
    assert!(process.take_stdin().is_err());
    let _output = process.take_output()?;
    assert!(process.take_output().is_err());

    process.kill()?;
    process.wait().await?;
    Ok(())
}
