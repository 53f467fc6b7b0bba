//! Child-process transport: spawning the MCP server with piped stdio.

use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};

/// A freshly spawned server with its protocol pipes taken out.
pub struct StdioTransport {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

impl StdioTransport {
    /// Spawn the configured server process.
    ///
    /// stdin/stdout carry the protocol; stderr is forwarded to `tracing`.
    pub fn spawn(config: &ServerConfig) -> Result<Self> {
        if config.command.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "server.command is empty; nothing to launch".into(),
            ));
        }

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, expand_env_vars(value));
        }
        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::Transport(format!("failed to spawn '{}': {e}", config.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Transport("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Transport("server stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            let command = config.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %command, "{line}");
                }
            });
        }

        info!(
            command = %config.command,
            args = ?config.args,
            pid = child.id(),
            "spawned MCP server"
        );

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

/// Expand `${VAR}` references from the parent environment. Unknown variables are left as-is.
pub fn expand_env_vars(input: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env pattern"));

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
