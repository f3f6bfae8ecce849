use std::sync::Arc;

use ledger::{HashLedger, IntentStore, SqlitePool, TreeStore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::chain::ChainClient;
use crate::config::AppConfig;
use crate::workflow::RegistrationWorkflow;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: AppConfig,
    pub ledger: HashLedger,
    pub trees: TreeStore,
    pub intents: IntentStore,
    pub chain: Arc<dyn ChainClient>,
    pub workflow: Arc<RegistrationWorkflow>,
    /// Cancelled on shutdown; every spawned workflow holds a child token
    pub shutdown: CancellationToken,
    /// Background workflows still running
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: AppConfig, pool: SqlitePool, chain: Arc<dyn ChainClient>) -> Self {
        let intents = IntentStore::new(pool.clone());
        let workflow = RegistrationWorkflow::new(chain.clone(), intents.clone(), config.workflow_settings());
        Self {
            ledger: HashLedger::new(pool.clone()),
            trees: TreeStore::new(pool),
            intents,
            chain,
            workflow: Arc::new(workflow),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            config,
        }
    }

    /// Cancel every background workflow and wait for each to journal its outcome
    pub async fn drain(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}
