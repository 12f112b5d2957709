use std::sync::Arc;

use crate::{config::AppConfig, db::OrmConn, security::JwtKeys};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        let jwt = JwtKeys::new(config.jwt_secret.as_bytes());
        Self {
            orm,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }
}
