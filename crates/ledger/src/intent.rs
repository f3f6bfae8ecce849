use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentPhase {
    Reserved,
    Confirming,
    Finalized,
    Failed,
}

impl IntentPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentPhase::Reserved => "reserved",
            IntentPhase::Confirming => "confirming",
            IntentPhase::Finalized => "finalized",
            IntentPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IntentPhase::Finalized | IntentPhase::Failed)
    }
}

impl fmt::Display for IntentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentPhase {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reserved" => Ok(IntentPhase::Reserved),
            "confirming" => Ok(IntentPhase::Confirming),
            "finalized" => Ok(IntentPhase::Finalized),
            "failed" => Ok(IntentPhase::Failed),
            other => Err(LedgerError::Validation(format!("unknown intent phase: {other}"))),
        }
    }
}

/// `(transaction_id, reservation_token)` returned by the reservation command
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub txid: String,
    pub token: String,
}

/// One two-phase registration and how far it got
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationIntent {
    pub intent_id: Uuid,
    pub domain_name: String,
    pub on_chain_value: String,
    pub phase: IntentPhase,
    pub reservation: Option<Reservation>,
    pub finalize_txid: Option<String>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationIntent {
    pub fn new(domain_name: impl Into<String>, on_chain_value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            intent_id: Uuid::new_v4(),
            domain_name: domain_name.into(),
            on_chain_value: on_chain_value.into(),
            phase: IntentPhase::Reserved,
            reservation: None,
            finalize_txid: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reserved -> Confirming
    pub fn confirm(&mut self, reservation: Reservation) -> Result<()> {
        self.transition(IntentPhase::Reserved, IntentPhase::Confirming)?;
        self.reservation = Some(reservation);
        Ok(())
    }

    /// Confirming -> Finalized
    pub fn finalize(&mut self, txid: impl Into<String>) -> Result<()> {
        self.transition(IntentPhase::Confirming, IntentPhase::Finalized)?;
        self.finalize_txid = Some(txid.into());
        Ok(())
    }

    /// Any non-terminal phase -> Failed, keeping the reason
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(illegal(self.phase, IntentPhase::Failed));
        }
        self.phase = IntentPhase::Failed;
        self.failure = Some(reason.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition(&mut self, from: IntentPhase, to: IntentPhase) -> Result<()> {
        if self.phase != from {
            return Err(illegal(self.phase, to));
        }
        self.phase = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn illegal(from: IntentPhase, to: IntentPhase) -> LedgerError {
    LedgerError::Validation(format!("illegal intent transition: {from} -> {to}"))
}
