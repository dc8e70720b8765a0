//! External service management.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::common::error::ProcessError;

/// Restarts services on the host running the bot.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn restart_service(&self, name: &str) -> Result<(), ProcessError>;
}

/// Drives a service manager CLI such as `systemctl`.
#[derive(Debug, Clone)]
pub struct ServiceManager {
    program: String,
}

impl ServiceManager {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ProcessManager for ServiceManager {
    async fn restart_service(&self, name: &str) -> Result<(), ProcessError> {
        info!("Running {} restart {}", self.program, name);

        let output = Command::new(&self.program)
            .arg("restart")
            .arg(name)
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            debug!(
                "{} stderr: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Err(ProcessError::Failed {
                service: name.to_string(),
                code: output.status.code(),
            })
        }
    }
}
