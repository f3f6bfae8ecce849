use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::intent::{IntentPhase, RegistrationIntent, Reservation};
use crate::{LedgerError, Result};

/// Durable journal of registration intents, keyed by intent id
#[derive(Clone)]
pub struct IntentStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct IntentRow {
    intent_id: String,
    domain_name: String,
    on_chain_value: String,
    phase: String,
    reservation_txid: Option<String>,
    reservation_token: Option<String>,
    finalize_txid: Option<String>,
    failure: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntentRow> for RegistrationIntent {
    type Error = LedgerError;

    fn try_from(r: IntentRow) -> Result<Self> {
        let intent_id = Uuid::parse_str(&r.intent_id)
            .map_err(|e| LedgerError::Validation(format!("bad intent id {}: {e}", r.intent_id)))?;
        let reservation = match (r.reservation_txid, r.reservation_token) {
            (Some(txid), Some(token)) => Some(Reservation { txid, token }),
            _ => None,
        };
        Ok(Self {
            intent_id,
            domain_name: r.domain_name,
            on_chain_value: r.on_chain_value,
            phase: r.phase.parse()?,
            reservation,
            finalize_txid: r.finalize_txid,
            failure: r.failure,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT_INTENT: &str = r#"
    SELECT intent_id, domain_name, on_chain_value, phase, reservation_txid,
           reservation_token, finalize_txid, failure, created_at, updated_at
    FROM registration_intents
"#;

impl IntentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the journal entry for `intent`
    pub async fn save(&self, intent: &RegistrationIntent) -> Result<()> {
        let (txid, token) = match &intent.reservation {
            Some(r) => (Some(r.txid.as_str()), Some(r.token.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO registration_intents (
              intent_id, domain_name, on_chain_value, phase, reservation_txid,
              reservation_token, finalize_txid, failure, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (intent_id) DO UPDATE SET
              phase = excluded.phase,
              reservation_txid = excluded.reservation_txid,
              reservation_token = excluded.reservation_token,
              finalize_txid = excluded.finalize_txid,
              failure = excluded.failure,
              updated_at = excluded.updated_at
            "#,
        )
        .bind(intent.intent_id.to_string())
        .bind(&intent.domain_name)
        .bind(&intent.on_chain_value)
        .bind(intent.phase.as_str())
        .bind(txid)
        .bind(token)
        .bind(intent.finalize_txid.as_deref())
        .bind(intent.failure.as_deref())
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, intent_id: Uuid) -> Result<Option<RegistrationIntent>> {
        let sql = format!("{SELECT_INTENT} WHERE intent_id = ?");
        let row: Option<IntentRow> = sqlx::query_as(&sql)
            .bind(intent_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(RegistrationIntent::try_from).transpose()
    }

    /// All intents for a domain, oldest first
    pub async fn list_for_domain(&self, domain_name: &str) -> Result<Vec<RegistrationIntent>> {
        let sql = format!("{SELECT_INTENT} WHERE domain_name = ? ORDER BY created_at ASC");
        let rows: Vec<IntentRow> = sqlx::query_as(&sql)
            .bind(domain_name)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(RegistrationIntent::try_from).collect()
    }

    /// Fail every intent a previous process left in flight.
    ///
    /// Run at start-up, before any new workflow starts.
    pub async fn fail_abandoned(&self, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE registration_intents
            SET phase = ?, failure = ?, updated_at = ?
            WHERE phase IN (?, ?)
            "#,
        )
        .bind(IntentPhase::Failed.as_str())
        .bind(reason)
        .bind(Utc::now())
        .bind(IntentPhase::Reserved.as_str())
        .bind(IntentPhase::Confirming.as_str())
        .execute(&self.pool)
        .await?;

        let failed = result.rows_affected();
        if failed > 0 {
            warn!(count = failed, reason, "intent_store: failed abandoned intents");
        } else {
            info!("intent_store: no abandoned intents");
        }
        Ok(failed)
    }
}
