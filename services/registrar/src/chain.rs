//! Wallet/node CLI collaborator

use std::process::Stdio;

use async_trait::async_trait;
use ledger::Reservation;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

/// Every command the registrar is allowed to send to the node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainCommand {
    GetBlockCount,
    GetBalance,
    GetNewAddress,
    NameNew {
        name: String,
    },
    NameFirstUpdate {
        name: String,
        rand: String,
        txid: String,
        value: String,
    },
}

impl ChainCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ChainCommand::GetBlockCount => "getblockcount",
            ChainCommand::GetBalance => "getbalance",
            ChainCommand::GetNewAddress => "getnewaddress",
            ChainCommand::NameNew { .. } => "name_new",
            ChainCommand::NameFirstUpdate { .. } => "name_firstupdate",
        }
    }

    /// Arguments passed to the CLI, command name first
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];
        match self {
            ChainCommand::GetBlockCount | ChainCommand::GetBalance | ChainCommand::GetNewAddress => {}
            ChainCommand::NameNew { name } => args.push(name.clone()),
            ChainCommand::NameFirstUpdate { name, rand, txid, value } => {
                args.extend([name.clone(), rand.clone(), txid.clone(), value.clone()]);
            }
        }
        args
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {status:?}: {stderr}")]
    Exit {
        command: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    #[error("{command} returned malformed output: {output:?}")]
    Malformed {
        command: &'static str,
        output: String,
    },
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Run one command, returning its trimmed stdout
    async fn execute(&self, command: &ChainCommand) -> Result<String, CommandError>;
}

/// Shells out to the node's CLI binary
pub struct CliChain {
    program: String,
}

impl CliChain {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl ChainClient for CliChain {
    async fn execute(&self, command: &ChainCommand) -> Result<String, CommandError> {
        debug!(program = %self.program, command = command.name(), "chain: executing");

        let output = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::Spawn { program: self.program.clone(), source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(command = command.name(), status = ?output.status.code(), %stderr, "chain: command failed");
            return Err(CommandError::Exit {
                command: command.name(),
                status: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub async fn block_height(chain: &dyn ChainClient) -> Result<u64, CommandError> {
    let out = chain.execute(&ChainCommand::GetBlockCount).await?;
    parse_height(&out)
}

pub async fn balance(chain: &dyn ChainClient) -> Result<f64, CommandError> {
    let out = chain.execute(&ChainCommand::GetBalance).await?;
    parse_balance(&out)
}

/// Submit the reservation transaction for `name`
pub async fn reserve_name(chain: &dyn ChainClient, name: &str) -> Result<Reservation, CommandError> {
    let out = chain
        .execute(&ChainCommand::NameNew { name: name.to_string() })
        .await?;
    parse_reservation(&out)
}

pub fn parse_height(output: &str) -> Result<u64, CommandError> {
    output.trim().parse().map_err(|_| CommandError::Malformed {
        command: "getblockcount",
        output: output.to_string(),
    })
}

pub fn parse_balance(output: &str) -> Result<f64, CommandError> {
    let malformed = || CommandError::Malformed { command: "getbalance", output: output.to_string() };
    let value: f64 = output.trim().parse().map_err(|_| malformed())?;
    if !value.is_finite() {
        return Err(malformed());
    }
    Ok(value)
}

/// Decode the `["<txid>", "<rand>"]` reply of `name_new`
pub fn parse_reservation(output: &str) -> Result<Reservation, CommandError> {
    let malformed = || CommandError::Malformed { command: "name_new", output: output.to_string() };
    let (txid, token): (String, String) = serde_json::from_str(output.trim()).map_err(|_| malformed())?;
    if txid.is_empty() || token.is_empty() {
        return Err(malformed());
    }
    Ok(Reservation { txid, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_argv_per_variant() {
        assert_eq!(ChainCommand::GetBlockCount.args(), vec!["getblockcount"]);
        assert_eq!(
            ChainCommand::NameNew { name: "d/x".into() }.args(),
            vec!["name_new", "d/x"]
        );
        let update = ChainCommand::NameFirstUpdate {
            name: "d/x".into(),
            rand: "{rand}".into(),
            txid: "t".into(),
            value: "{\"ip\":\"1.2.3.4\"}".into(),
        };
        assert_eq!(
            update.args(),
            vec!["name_firstupdate", "d/x", "{rand}", "t", "{\"ip\":\"1.2.3.4\"}"]
        );
    }

    #[test]
    fn parses_reservation() {
        let r = parse_reservation("[\"abc123\", \"f00d\"]\n").unwrap();
        assert_eq!(r.txid, "abc123");
        assert_eq!(r.token, "f00d");

        for bad in ["", "abc", "[\"only\"]", "[\"a\", \"b\", \"c\"]", "[\"\", \"b\"]", "{}"] {
            assert!(
                matches!(parse_reservation(bad), Err(CommandError::Malformed { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_height("1234\n").unwrap(), 1234);
        assert!(parse_height("-1").is_err());
        assert_eq!(parse_balance("0.50000000").unwrap(), 0.5);
        assert!(parse_balance("NaN").is_err());
        assert!(parse_balance("lots").is_err());
    }

    #[tokio::test]
    async fn cli_returns_trimmed_stdout() {
        // echo prints the rendered argv back
        let chain = CliChain::new("echo");
        let out = chain
            .execute(&ChainCommand::NameNew { name: "d/x".into() })
            .await
            .unwrap();
        assert_eq!(out, "name_new d/x");
    }

    #[tokio::test]
    async fn cli_nonzero_exit_is_reported() {
        let chain = CliChain::new("false");
        let err = chain.execute(&ChainCommand::GetBlockCount).await.unwrap_err();
        match err {
            CommandError::Exit { command, status, stderr } => {
                assert_eq!(command, "getblockcount");
                assert_eq!(status, Some(1));
                assert!(stderr.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cli_missing_binary_is_spawn_error() {
        let chain = CliChain::new("/nonexistent/registrar-node-cli");
        let err = chain.execute(&ChainCommand::GetBalance).await.unwrap_err();
        assert!(
            matches!(&err, CommandError::Spawn { program, .. } if program == "/nonexistent/registrar-node-cli"),
            "{err:?}"
        );
    }
}
