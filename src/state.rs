use std::sync::Arc;

use crate::circles::CircleLifecycleManager;
use crate::config::Config;
use crate::store::{CircleStore, TransactionStore};
use crate::trading::TradingEngine;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub circles: Arc<dyn CircleStore>,
    pub ledger: Arc<dyn TransactionStore>,
    pub lifecycle: Arc<CircleLifecycleManager>,
    pub trading: Arc<TradingEngine>,
}
