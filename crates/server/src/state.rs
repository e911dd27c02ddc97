use crate::{auth::TokenIssuer, config::Config, db::Database};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let tokens = TokenIssuer::new(&config.auth);
        Self {
            db,
            config: Arc::new(config),
            tokens,
        }
    }
}
