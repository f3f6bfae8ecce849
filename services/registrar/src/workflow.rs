use std::sync::Arc;
use std::time::Duration;

use ledger::{IntentStore, LedgerError, RegistrationIntent, Reservation};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use tracing::{info, warn};

use crate::chain::{self, ChainClient, ChainCommand, CommandError};
use crate::gate::{ConfirmationGate, GateError};

/// Blocks to wait between reservation and finalization
pub const CONFIRMATION_DEPTH: u64 = 12;
pub const POLL_EVERY: Duration = Duration::from_secs(60);
pub const MIN_BALANCE: f64 = 0.01;

#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub confirmation_depth: u64,
    pub poll_every: Duration,
    pub min_balance: f64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            confirmation_depth: CONFIRMATION_DEPTH,
            poll_every: POLL_EVERY,
            min_balance: MIN_BALANCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("balance {balance} below required minimum {minimum}")]
    InsufficientBalance { balance: f64, minimum: f64 },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// The intent record could not be written.
///
/// Carries whatever the node had already accepted for the intent.
#[derive(Debug, Error)]
#[error("journal write failed for intent {intent_id}{}: {source}", pending_on_chain(.reservation, .finalize_txid))]
pub struct JournalError {
    pub intent_id: Uuid,
    pub reservation: Option<Reservation>,
    pub finalize_txid: Option<String>,
    #[source]
    pub source: LedgerError,
}

impl JournalError {
    fn new(intent: &RegistrationIntent, source: LedgerError) -> Self {
        Self {
            intent_id: intent.intent_id,
            reservation: intent.reservation.clone(),
            finalize_txid: intent.finalize_txid.clone(),
            source,
        }
    }
}

fn pending_on_chain(reservation: &Option<Reservation>, finalize_txid: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(r) = reservation {
        out.push_str(&format!(" (reservation txid={} rand={})", r.txid, r.token));
    }
    if let Some(txid) = finalize_txid {
        out.push_str(&format!(" (finalize txid={txid})"));
    }
    out
}

/// Reserve-then-finalize registration of one name.
///
/// Each intent is journaled before every node call. Failures end the intent
/// in `Failed` with the reason kept; nothing is retried here.
pub struct RegistrationWorkflow {
    chain: Arc<dyn ChainClient>,
    intents: IntentStore,
    settings: WorkflowSettings,
}

impl RegistrationWorkflow {
    pub fn new(chain: Arc<dyn ChainClient>, intents: IntentStore, settings: WorkflowSettings) -> Self {
        Self { chain, intents, settings }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Journal a fresh intent in `Reserved`
    pub async fn accept(
        &self,
        domain_name: &str,
        on_chain_value: &str,
    ) -> Result<RegistrationIntent, LedgerError> {
        let intent = RegistrationIntent::new(domain_name, on_chain_value);
        self.intents.save(&intent).await?;
        info!(intent_id = %intent.intent_id, domain = %intent.domain_name, "workflow: accepted");
        Ok(intent)
    }

    /// `accept` followed by `run`
    pub async fn register(
        &self,
        domain_name: &str,
        on_chain_value: &str,
        cancel: &CancellationToken,
    ) -> Result<RegistrationIntent, JournalError> {
        let intent = RegistrationIntent::new(domain_name, on_chain_value);
        self.journal(&intent).await?;
        info!(intent_id = %intent.intent_id, domain = %intent.domain_name, "workflow: accepted");
        self.run(intent, cancel).await
    }

    /// Drive an accepted intent to `Finalized` or `Failed`.
    ///
    /// Only a failure to write the journal itself is returned as `Err`.
    pub async fn run(
        &self,
        mut intent: RegistrationIntent,
        cancel: &CancellationToken,
    ) -> Result<RegistrationIntent, JournalError> {
        match self.advance(&mut intent, cancel).await {
            Ok(()) => {
                info!(intent_id = %intent.intent_id, domain = %intent.domain_name, "workflow: finalized");
            }
            Err(WorkflowError::Journal(e)) => return Err(e),
            Err(e) => {
                warn!(
                    intent_id = %intent.intent_id,
                    domain = %intent.domain_name,
                    phase = %intent.phase,
                    error = %e,
                    "workflow: failed"
                );
                intent.fail(e.to_string()).map_err(|e| JournalError::new(&intent, e))?;
                self.journal(&intent).await?;
            }
        }
        Ok(intent)
    }

    async fn advance(
        &self,
        intent: &mut RegistrationIntent,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        // phase 1: reservation
        let balance = chain::balance(self.chain.as_ref()).await?;
        if balance < self.settings.min_balance {
            return Err(WorkflowError::InsufficientBalance {
                balance,
                minimum: self.settings.min_balance,
            });
        }

        let reservation = chain::reserve_name(self.chain.as_ref(), &intent.domain_name).await?;
        // only record of the token until the journal write lands
        warn!(
            intent_id = %intent.intent_id,
            txid = %reservation.txid,
            rand = %reservation.token,
            "workflow: reservation submitted"
        );
        intent
            .confirm(reservation.clone())
            .map_err(|e| JournalError::new(intent, e))?;
        self.journal(intent).await?;
        info!(intent_id = %intent.intent_id, txid = %reservation.txid, "workflow: reserved");

        // phase 2: wait for confirmations, then finalize
        let gate = ConfirmationGate::create(
            self.chain.clone(),
            self.settings.confirmation_depth,
            self.settings.poll_every,
        )
        .await?;
        gate.await_reached(cancel).await?;

        let finalize_txid = self
            .chain
            .execute(&ChainCommand::NameFirstUpdate {
                name: intent.domain_name.clone(),
                rand: reservation.token,
                txid: reservation.txid,
                value: intent.on_chain_value.clone(),
            })
            .await?;

        intent
            .finalize(finalize_txid)
            .map_err(|e| JournalError::new(intent, e))?;
        self.journal(intent).await?;
        Ok(())
    }

    async fn journal(&self, intent: &RegistrationIntent) -> Result<(), JournalError> {
        self.intents
            .save(intent)
            .await
            .map_err(|e| JournalError::new(intent, e))
    }
}
