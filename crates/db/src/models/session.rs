use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;

use crate::{
    entities::{session, worker},
    models::worker::Worker,
};

/// A server-side login record. The key is the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i64,
    #[serde(skip_serializing)]
    pub session_key: String,
    pub worker_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn from_model(model: session::Model) -> Self {
        Self {
            id: model.id,
            session_key: model.session_key,
            worker_id: model.worker_id,
            expires_at: model.expires_at.into(),
            created_at: model.created_at.into(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        session_key: &str,
        worker_id: i64,
        ttl: Duration,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = session::ActiveModel {
            session_key: Set(session_key.to_string()),
            worker_id: Set(worker_id),
            expires_at: Set((now + ttl).into()),
            created_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_key<C: ConnectionTrait>(
        db: &C,
        session_key: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = session::Entity::find()
            .filter(session::Column::SessionKey.eq(session_key))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Resolves an unexpired session key to its active worker.
    pub async fn find_worker<C: ConnectionTrait>(
        db: &C,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Worker>, DbErr> {
        let record = session::Entity::find()
            .filter(session::Column::SessionKey.eq(session_key))
            .filter(session::Column::ExpiresAt.gt(now))
            .find_also_related(worker::Entity)
            .one(db)
            .await?;

        Ok(record
            .and_then(|(_, worker)| worker)
            .map(Worker::from_model)
            .filter(|worker| worker.is_active))
    }

    pub async fn delete_by_key<C: ConnectionTrait>(
        db: &C,
        session_key: &str,
    ) -> Result<u64, DbErr> {
        let result = session::Entity::delete_many()
            .filter(session::Column::SessionKey.eq(session_key))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_expired<C: ConnectionTrait>(
        db: &C,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(now))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::worker::CreateWorker, test_support::setup_db};

    #[tokio::test]
    async fn live_sessions_resolve_to_their_worker() {
        let db = setup_db().await;
        let ada = Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        let session = Session::create(&db, "live-key", ada.id, Duration::hours(1))
            .await
            .unwrap();
        assert!(!session.is_expired(Utc::now()));

        let worker = Session::find_worker(&db, "live-key", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(worker.id, ada.id);
        assert!(
            Session::find_worker(&db, "unknown", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_sessions_never_authenticate_and_are_purged() {
        let db = setup_db().await;
        let ada = Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        Session::create(&db, "old-key", ada.id, Duration::seconds(-5))
            .await
            .unwrap();
        Session::create(&db, "new-key", ada.id, Duration::hours(1))
            .await
            .unwrap();

        assert!(
            Session::find_worker(&db, "old-key", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(Session::delete_expired(&db, Utc::now()).await.unwrap(), 1);
        assert!(Session::find_by_key(&db, "old-key").await.unwrap().is_none());
        assert!(Session::find_by_key(&db, "new-key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn inactive_workers_are_not_resolved() {
        let db = setup_db().await;
        let retired = Worker::create(
            &db,
            &CreateWorker {
                is_active: false,
                ..CreateWorker::new("retired", "hash")
            },
        )
        .await
        .unwrap();
        Session::create(&db, "retired-key", retired.id, Duration::hours(1))
            .await
            .unwrap();

        assert!(
            Session::find_worker(&db, "retired-key", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(Session::delete_by_key(&db, "retired-key").await.unwrap(), 1);
    }
}
