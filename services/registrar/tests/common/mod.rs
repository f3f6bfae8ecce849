#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use registrar::chain::{ChainClient, ChainCommand, CommandError};

/// In-process node double: scripted heights and replies, records every call.
pub struct ScriptedChain {
    heights: Mutex<VecDeque<u64>>,
    last_height: Mutex<u64>,
    balance: String,
    name_new: String,
    first_update: String,
    fail_on: Option<&'static str>,
    log: Mutex<Vec<ChainCommand>>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self {
            heights: Mutex::new(VecDeque::new()),
            last_height: Mutex::new(0),
            balance: "10.00000000".to_string(),
            name_new: r#"["reserve-tx", "a1b2c3"]"#.to_string(),
            first_update: "finalize-tx".to_string(),
            fail_on: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Heights returned by successive `getblockcount` calls; the last one repeats
    pub fn with_heights(self, heights: &[u64]) -> Self {
        *self.heights.lock().unwrap() = heights.iter().copied().collect();
        self
    }

    pub fn with_balance(mut self, balance: &str) -> Self {
        self.balance = balance.to_string();
        self
    }

    pub fn with_name_new(mut self, reply: &str) -> Self {
        self.name_new = reply.to_string();
        self
    }

    /// Make the named command exit non-zero
    pub fn failing(mut self, command: &'static str) -> Self {
        self.fail_on = Some(command);
        self
    }

    pub fn calls(&self) -> Vec<ChainCommand> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.name() == name).count()
    }

    fn next_height(&self) -> u64 {
        let mut last = self.last_height.lock().unwrap();
        if let Some(h) = self.heights.lock().unwrap().pop_front() {
            *last = h;
        }
        *last
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn execute(&self, command: &ChainCommand) -> Result<String, CommandError> {
        self.log.lock().unwrap().push(command.clone());

        if self.fail_on == Some(command.name()) {
            return Err(CommandError::Exit {
                command: command.name(),
                status: Some(1),
                stderr: "error: node unavailable".to_string(),
            });
        }

        Ok(match command {
            ChainCommand::GetBlockCount => self.next_height().to_string(),
            ChainCommand::GetBalance => self.balance.clone(),
            ChainCommand::GetNewAddress => "N1addr".to_string(),
            ChainCommand::NameNew { .. } => self.name_new.clone(),
            ChainCommand::NameFirstUpdate { .. } => self.first_update.clone(),
        })
    }
}
