use crate::config::VpnConfig;
use crate::vpn::VpnError;
use async_trait::async_trait;
use tokio::process::Command;

/// Placeholder replaced by the chosen server in connect arguments
const SERVER_PLACEHOLDER: &str = "{server}";

/// Drives the VPN client
#[async_trait]
pub trait Reconnector: Send + Sync {
    async fn disconnect(&self) -> Result<(), VpnError>;

    /// Connects, to `server` when one is configured
    async fn connect(&self, server: Option<&str>) -> Result<(), VpnError>;
}

/// Runs the configured VPN client commands
#[derive(Debug, Clone)]
pub struct CommandReconnector {
    connect: Vec<String>,
    disconnect: Vec<String>,
}

impl CommandReconnector {
    pub fn from_config(config: &VpnConfig) -> Self {
        Self {
            connect: config.connect.clone(),
            disconnect: config.disconnect.clone(),
        }
    }
}

#[async_trait]
impl Reconnector for CommandReconnector {
    async fn disconnect(&self) -> Result<(), VpnError> {
        let argv = command_line(&self.disconnect, None).ok_or(VpnError::NoCommand("disconnect"))?;
        run(argv).await
    }

    async fn connect(&self, server: Option<&str>) -> Result<(), VpnError> {
        let argv = command_line(&self.connect, server).ok_or(VpnError::NoCommand("connect"))?;
        run(argv).await
    }
}

/// Expands the placeholder; None when the command is empty
fn command_line(template: &[String], server: Option<&str>) -> Option<Vec<String>> {
    if template.is_empty() {
        return None;
    }

    Some(
        template
            .iter()
            .map(|arg| arg.replace(SERVER_PLACEHOLDER, server.unwrap_or_default()))
            .filter(|arg| !arg.is_empty())
            .collect(),
    )
}

async fn run(argv: Vec<String>) -> Result<(), VpnError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(VpnError::NoCommand("empty"));
    };

    tracing::debug!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| VpnError::Spawn {
            command: program.clone(),
            source,
        })?;

    if !output.status.success() {
        tracing::warn!(
            "{} failed: {}",
            program,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(VpnError::Command {
            command: program.clone(),
            code: output.status.code(),
        });
    }

    Ok(())
}
