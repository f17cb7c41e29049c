// src/exec/shell.rs

//! Shell command action.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::NodeOutcome;
use crate::exec::action::{ActionFuture, NodeAction};

/// Runs a command line through the platform shell.
///
/// Exit status 0 is success; any other status, or failing to spawn or wait
/// for the process, is a failure with the reason as detail.
#[derive(Debug, Clone)]
pub struct ShellAction {
    cmd: String,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl NodeAction for ShellAction {
    fn execute(&self, node: &str) -> ActionFuture {
        let cmd = self.cmd.clone();
        let node = node.to_string();

        Box::pin(async move {
            match run_command(&node, &cmd).await {
                Ok(outcome) => outcome,
                Err(err) => NodeOutcome::Failed(format!("{err:#}")),
            }
        })
    }
}

async fn run_command(node: &str, cmd_line: &str) -> Result<NodeOutcome> {
    info!(node = %node, cmd = %cmd_line, "starting process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for node '{node}'"))?;

    // Drain both pipes to EOF so the child never blocks on a full buffer or
    // dies of SIGPIPE.
    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let node = node.to_string();
        forwarders.push(tokio::spawn(forward_lines(stdout, move |line| {
            println!("[{node}] {line}");
        })));
    }
    if let Some(stderr) = child.stderr.take() {
        let node = node.to_string();
        forwarders.push(tokio::spawn(forward_lines(stderr, move |line| {
            debug!(node = %node, "stderr: {}", line);
        })));
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of node '{node}'"))?;

    for forwarder in forwarders {
        let _ = forwarder.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(
        node = %node,
        exit_code = code,
        success = status.success(),
        "process exited"
    );

    if status.success() {
        Ok(NodeOutcome::Success)
    } else {
        Ok(NodeOutcome::Failed(format!("exit code {code}")))
    }
}

/// Emit each line of `reader` until EOF. Output is not required to be UTF-8.
async fn forward_lines<R, F>(reader: R, mut emit: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                emit(line.trim_end_matches(['\n', '\r']));
            }
            Err(err) => {
                debug!(error = %err, "stopped reading process output");
                break;
            }
        }
    }
}
