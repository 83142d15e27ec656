use std::sync::Arc;

use chrono::Utc;
use db::{
    DBService, DbErr,
    models::{
        session::Session,
        worker::{CreateWorker, Worker, WorkerError},
    },
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::{
    config::Config,
    password::{PasswordError, hash_password},
};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct Deployment {
    db: DBService,
    config: Arc<Config>,
}

impl Deployment {
    pub async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the configured bootstrap worker unless that username exists.
    pub async fn ensure_bootstrap_worker(&self) -> Result<Option<Worker>, DeploymentError> {
        let Some(bootstrap) = &self.config.bootstrap_worker else {
            return Ok(None);
        };

        if Worker::find_by_username(&self.db.pool, &bootstrap.username)
            .await?
            .is_some()
        {
            tracing::debug!(username = %bootstrap.username, "bootstrap worker already exists");
            return Ok(None);
        }

        let password_hash = hash_password(bootstrap.password.expose_secret())?;
        let worker = Worker::create(
            &self.db.pool,
            &CreateWorker::new(bootstrap.username.clone(), password_hash),
        )
        .await?;
        tracing::info!(worker_id = worker.id, username = %worker.username, "created bootstrap worker");
        Ok(Some(worker))
    }

    pub async fn prune_expired_sessions(&self) -> Result<u64, DbErr> {
        let removed = Session::delete_expired(&self.db.pool, Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "pruned expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;

    fn memory_config(bootstrap: bool) -> Config {
        Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "TASK_MANAGER_DATA_DIR" => Some("/tmp/task-manager-test".to_string()),
            "TASK_MANAGER_BOOTSTRAP_USERNAME" if bootstrap => Some("admin".to_string()),
            "TASK_MANAGER_BOOTSTRAP_PASSWORD" if bootstrap => Some("changeme".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn bootstrap_worker_is_created_once() {
        let deployment = Deployment::new(memory_config(true)).await.unwrap();

        let created = deployment.ensure_bootstrap_worker().await.unwrap().unwrap();
        assert_eq!(created.username, "admin");
        assert!(verify_password("changeme", &created.password_hash));

        assert!(deployment.ensure_bootstrap_worker().await.unwrap().is_none());
        assert_eq!(Worker::count(&deployment.db().pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn without_bootstrap_config_nothing_is_created() {
        let deployment = Deployment::new(memory_config(false)).await.unwrap();
        assert!(deployment.ensure_bootstrap_worker().await.unwrap().is_none());
        assert_eq!(deployment.prune_expired_sessions().await.unwrap(), 0);
    }
}
