use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr, Query};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entities::{session, task_assignee, team, worker},
    models::{
        pagination::{Page, PageError, PageRequest, fetch_page},
        position::Position,
        task::Task,
        team::Team,
    },
};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Worker not found")]
    NotFound,
    #[error("A user with that username already exists.")]
    UsernameTaken,
}

/// A worker account. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worker {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub position_id: Option<i64>,
    pub team_id: Option<i64>,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

/// A worker together with its position and team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerWithRelations {
    #[serde(flatten)]
    pub worker: Worker,
    pub position: Option<Position>,
    pub team: Option<Team>,
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerDetail {
    #[serde(flatten)]
    pub worker: WorkerWithRelations,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorker {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub position_id: Option<i64>,
    pub team_id: Option<i64>,
}

impl CreateWorker {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: String::new(),
            password_hash: password_hash.into(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            position_id: None,
            team_id: None,
        }
    }
}

impl fmt::Display for WorkerWithRelations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl Worker {
    pub(crate) fn from_model(model: worker::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            password_hash: model.password_hash,
            first_name: model.first_name,
            last_name: model.last_name,
            is_active: model.is_active,
            position_id: model.position_id,
            team_id: model.team_id,
            last_login: model.last_login.map(Into::into),
            date_joined: model.date_joined.into(),
        }
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        worker::Entity::find().count(db).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = worker::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = worker::Entity::find()
            .filter(worker::Column::Username.eq(username))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// All workers ordered by username, for assignee pickers.
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<WorkerWithRelations>, DbErr> {
        let records = worker::Entity::find()
            .order_by_asc(worker::Column::Username)
            .all(db)
            .await?;
        Self::with_relations(db, records.into_iter().map(Self::from_model).collect()).await
    }

    pub async fn find_by_team_id<C: ConnectionTrait>(
        db: &C,
        team_id: i64,
    ) -> Result<Vec<WorkerWithRelations>, DbErr> {
        let records = worker::Entity::find()
            .filter(worker::Column::TeamId.eq(team_id))
            .order_by_asc(worker::Column::Username)
            .all(db)
            .await?;
        Self::with_relations(db, records.into_iter().map(Self::from_model).collect()).await
    }

    /// Returns the ids from `ids` that do not name an existing worker.
    pub async fn missing_ids<C: ConnectionTrait>(db: &C, ids: &[i64]) -> Result<Vec<i64>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: HashSet<i64> = worker::Entity::find()
            .filter(worker::Column::Id.is_in(ids.to_vec()))
            .all(db)
            .await?
            .into_iter()
            .map(|model| model.id)
            .collect();
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    /// One page of workers ordered by username.
    ///
    /// A non-blank `query` keeps the workers whose username, first name,
    /// last name or team name contains it, ignoring case.
    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        query: Option<&str>,
        request: PageRequest,
    ) -> Result<Page<WorkerWithRelations>, PageError> {
        let mut select = worker::Entity::find().order_by_asc(worker::Column::Username);
        if let Some(query) = query.map(str::trim).filter(|query| !query.is_empty()) {
            select = select.filter(search_condition(query));
        }

        let mut page = fetch_page(db, select, request).await?;
        let models = std::mem::take(&mut page.items);
        let items =
            Self::with_relations(db, models.into_iter().map(Self::from_model).collect()).await?;
        Ok(page.with_items(items))
    }

    pub async fn find_detail<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<WorkerDetail>, DbErr> {
        let Some(worker) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let tasks = Task::find_assigned_to(db, worker.id).await?;
        let worker = Self::with_relations(db, vec![worker])
            .await?
            .into_iter()
            .next()
            .ok_or(DbErr::RecordNotFound("Worker not found".to_string()))?;
        Ok(Some(WorkerDetail { worker, tasks }))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateWorker,
    ) -> Result<Self, WorkerError> {
        if Self::find_by_username(db, &data.username).await?.is_some() {
            return Err(WorkerError::UsernameTaken);
        }

        let active = worker::ActiveModel {
            username: Set(data.username.clone()),
            email: Set(data.email.clone()),
            password_hash: Set(data.password_hash.clone()),
            first_name: Set(data.first_name.clone()),
            last_name: Set(data.last_name.clone()),
            is_active: Set(data.is_active),
            position_id: Set(data.position_id),
            team_id: Set(data.team_id),
            last_login: Set(None),
            date_joined: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn set_password_hash<C: ConnectionTrait>(
        db: &C,
        id: i64,
        password_hash: &str,
    ) -> Result<(), WorkerError> {
        let record = worker::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(WorkerError::NotFound)?;
        let mut active: worker::ActiveModel = record.into();
        active.password_hash = Set(password_hash.to_string());
        active.update(db).await?;
        Ok(())
    }

    pub async fn record_login<C: ConnectionTrait>(
        db: &C,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        worker::Entity::update_many()
            .col_expr(worker::Column::LastLogin, Expr::value(Some(at)))
            .filter(worker::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Deletes the worker with its task assignments and sessions.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        task_assignee::Entity::delete_many()
            .filter(task_assignee::Column::WorkerId.eq(id))
            .exec(db)
            .await?;
        session::Entity::delete_many()
            .filter(session::Column::WorkerId.eq(id))
            .exec(db)
            .await?;
        let result = worker::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Attaches position and team to each worker with one query per table.
    pub(crate) async fn with_relations<C: ConnectionTrait>(
        db: &C,
        workers: Vec<Self>,
    ) -> Result<Vec<WorkerWithRelations>, DbErr> {
        let position_ids = workers.iter().filter_map(|w| w.position_id).collect();
        let team_ids = workers.iter().filter_map(|w| w.team_id).collect();
        let positions = Position::find_map(db, position_ids).await?;
        let teams = Team::find_map(db, team_ids).await?;

        Ok(workers
            .into_iter()
            .map(|worker| {
                let position = worker.position_id.and_then(|id| positions.get(&id).cloned());
                let team = worker.team_id.and_then(|id| teams.get(&id).cloned());
                let display = match &position {
                    Some(position) => format!("{} ({})", worker.username, position.name),
                    None => worker.username.clone(),
                };
                WorkerWithRelations {
                    worker,
                    position,
                    team,
                    display,
                }
            })
            .collect())
    }
}

const LIKE_ESCAPE: char = '!';

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, LIKE_ESCAPE | '%' | '_') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

fn search_condition(query: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
    let contains = |column: worker::Column| {
        Expr::expr(Func::lower(Expr::col((worker::Entity, column))))
            .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
    };

    let matching_teams = Query::select()
        .column(team::Column::Id)
        .from(team::Entity)
        .and_where(
            Expr::expr(Func::lower(Expr::col((team::Entity, team::Column::Name))))
                .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
        )
        .to_owned();

    Condition::any()
        .add(contains(worker::Column::Username))
        .add(contains(worker::Column::FirstName))
        .add(contains(worker::Column::LastName))
        .add(worker::Column::TeamId.in_subquery(matching_teams))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{position::CreatePosition, team::CreateTeam},
        test_support::setup_db,
    };

    async fn seed(db: &sea_orm::DatabaseConnection) {
        let backend = Team::create(
            db,
            &CreateTeam {
                name: "Backend Team".to_string(),
            },
        )
        .await
        .unwrap();
        let frontend = Team::create(
            db,
            &CreateTeam {
                name: "Frontend Team".to_string(),
            },
        )
        .await
        .unwrap();

        Worker::create(
            db,
            &CreateWorker {
                first_name: "John".to_string(),
                last_name: "Smith".to_string(),
                team_id: Some(backend.id),
                ..CreateWorker::new("jsmith", "hash")
            },
        )
        .await
        .unwrap();
        Worker::create(
            db,
            &CreateWorker {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                team_id: Some(frontend.id),
                ..CreateWorker::new("jdoe", "hash")
            },
        )
        .await
        .unwrap();
        Worker::create(db, &CreateWorker::new("solo_dev", "hash"))
            .await
            .unwrap();
    }

    async fn search(db: &sea_orm::DatabaseConnection, query: &str) -> Vec<String> {
        Worker::find_page(db, Some(query), PageRequest::first(10))
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|worker| worker.worker.username)
            .collect()
    }

    #[tokio::test]
    async fn search_matches_any_field_ignoring_case() {
        let db = setup_db().await;
        seed(&db).await;

        assert_eq!(search(&db, "jsmith").await, vec!["jsmith"]);
        assert_eq!(search(&db, "john").await, vec!["jsmith"]);
        assert_eq!(search(&db, "DOE").await, vec!["jdoe"]);
        assert_eq!(search(&db, "Backend").await, vec!["jsmith"]);
        assert_eq!(search(&db, "team").await, vec!["jdoe", "jsmith"]);
        assert!(search(&db, "nobody").await.is_empty());
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = setup_db().await;
        seed(&db).await;

        assert_eq!(search(&db, "_dev").await, vec!["solo_dev"]);
        assert!(search(&db, "%").await.is_empty());
    }

    #[tokio::test]
    async fn blank_query_lists_everyone_by_username() {
        let db = setup_db().await;
        seed(&db).await;

        let page = Worker::find_page(&db, Some("   "), PageRequest::first(10))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|w| w.worker.username.as_str()).collect();
        assert_eq!(names, vec!["jdoe", "jsmith", "solo_dev"]);
        assert_eq!(page.items[1].team.as_ref().map(|t| t.name.as_str()), Some("Backend Team"));
    }

    #[tokio::test]
    async fn display_includes_position_when_present() {
        let db = setup_db().await;
        let position = Position::create(
            &db,
            &CreatePosition {
                name: "QA".to_string(),
            },
        )
        .await
        .unwrap();
        let tester = Worker::create(
            &db,
            &CreateWorker {
                position_id: Some(position.id),
                ..CreateWorker::new("tester", "hash")
            },
        )
        .await
        .unwrap();
        let plain = Worker::create(&db, &CreateWorker::new("plain", "hash"))
            .await
            .unwrap();

        let workers = Worker::with_relations(&db, vec![tester, plain]).await.unwrap();
        assert_eq!(workers[0].to_string(), "tester (QA)");
        assert_eq!(workers[0].display, "tester (QA)");
        assert_eq!(workers[1].to_string(), "plain");
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let db = setup_db().await;
        Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        assert!(matches!(
            Worker::create(&db, &CreateWorker::new("ada", "other")).await,
            Err(WorkerError::UsernameTaken)
        ));
        assert_eq!(Worker::count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_ids_reports_unknown_workers() {
        let db = setup_db().await;
        let ada = Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        assert_eq!(
            Worker::missing_ids(&db, &[ada.id, ada.id + 100]).await.unwrap(),
            vec![ada.id + 100]
        );
    }

    #[tokio::test]
    async fn record_login_sets_timestamp() {
        let db = setup_db().await;
        let ada = Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        assert!(ada.last_login.is_none());

        Worker::record_login(&db, ada.id, Utc::now()).await.unwrap();
        let ada = Worker::find_by_id(&db, ada.id).await.unwrap().unwrap();
        assert!(ada.last_login.is_some());
    }

    #[tokio::test]
    async fn delete_drops_assignments_but_keeps_tasks() {
        use chrono::NaiveDate;

        use crate::models::{
            session::Session,
            task::CreateTask,
            task_type::{CreateTaskType, TaskType},
        };

        let db = setup_db().await;
        let ada = Worker::create(&db, &CreateWorker::new("ada", "hash"))
            .await
            .unwrap();
        let task_type = TaskType::create(
            &db,
            &CreateTaskType {
                name: "Bug".to_string(),
            },
        )
        .await
        .unwrap();
        let mut data = CreateTask::new(
            "Fix",
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            task_type.id,
        );
        data.assignee_ids = vec![ada.id];
        let task = Task::create(&db, &data).await.unwrap();
        Session::create(&db, "key", ada.id, chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(Worker::delete(&db, ada.id).await.unwrap(), 1);
        assert!(Worker::find_by_id(&db, ada.id).await.unwrap().is_none());
        assert!(Task::find_by_id(&db, task.id).await.unwrap().is_some());
        assert!(Task::assignee_ids(&db, task.id).await.unwrap().is_empty());
        assert!(Session::find_by_key(&db, "key").await.unwrap().is_none());
    }
}
