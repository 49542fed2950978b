pub mod api;
pub mod config;
pub mod db;
pub mod services;

pub use db::DbPool;

use config::Config;
use services::{ExpenseService, GroupService, IdentityService};

pub struct AppState {
    pub identity: IdentityService,
    pub groups: GroupService,
    pub expenses: ExpenseService,
}

impl AppState {
    pub fn new(config: &Config, db: DbPool) -> Self {
        let secret = config.auth.resolve_secret();
        Self {
            identity: IdentityService::new(db.clone(), &secret, config.auth.token_ttl()),
            groups: GroupService::new(db.clone()),
            expenses: ExpenseService::new(db),
        }
    }
}
