use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::EnrollmentLedger;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub ledger: Arc<EnrollmentLedger>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        let ledger = Arc::new(EnrollmentLedger::new(db.clone()));
        Self { db, ledger }
    }
}
