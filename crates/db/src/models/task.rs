use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use sea_orm::sea_query::Query;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entities::{project, task, task_assignee, task_type, worker},
    models::{
        pagination::{Page, PageError, PageRequest, fetch_page},
        project::Project,
        task_type::TaskType,
        worker::{Worker, WorkerWithRelations},
    },
    types::TaskPriority,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Task type {0} does not exist")]
    TaskTypeNotFound(i64),
    #[error("Project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("Workers do not exist: {0:?}")]
    WorkersNotFound(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub is_completed: bool,
    pub priority: TaskPriority,
    pub task_type_id: i64,
    pub project_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub task_type: TaskType,
    pub project: Option<Project>,
    pub assignees: Vec<WorkerWithRelations>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub name: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub priority: TaskPriority,
    pub task_type_id: i64,
    pub project_id: Option<i64>,
    pub assignee_ids: Vec<i64>,
}

impl CreateTask {
    pub fn new(name: impl Into<String>, deadline: NaiveDate, task_type_id: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            deadline,
            priority: TaskPriority::default(),
            task_type_id,
            project_id: None,
            assignee_ids: Vec::new(),
        }
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub is_completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    pub task_type_id: Option<i64>,
    /// `Some(None)` detaches the task from its project.
    pub project_id: Option<Option<i64>>,
    pub assignee_ids: Option<Vec<i64>>,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.priority)
    }
}

impl Task {
    fn from_model(model: task::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            deadline: model.deadline,
            is_completed: model.is_completed,
            priority: model.priority,
            task_type_id: model.task_type_id,
            project_id: model.project_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Tasks whose assignee set contains `worker_id`, soonest deadline first.
    fn assigned_to(worker_id: i64) -> Select<task::Entity> {
        let linked = Query::select()
            .column(task_assignee::Column::TaskId)
            .from(task_assignee::Entity)
            .and_where(task_assignee::Column::WorkerId.eq(worker_id))
            .to_owned();
        task::Entity::find()
            .filter(task::Column::Id.in_subquery(linked))
            .order_by_asc(task::Column::Deadline)
            .order_by_asc(task::Column::Id)
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        task::Entity::find().count(db).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Dashboard listing: earliest deadline first, most urgent first within a day.
    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        request: PageRequest,
    ) -> Result<Page<Self>, PageError> {
        let select = task::Entity::find()
            .order_by_asc(task::Column::Deadline)
            .order_by_desc(task::Column::Priority)
            .order_by_asc(task::Column::Id);
        Ok(fetch_page(db, select, request).await?.map(Self::from_model))
    }

    pub async fn find_assigned_page<C: ConnectionTrait>(
        db: &C,
        worker_id: i64,
        request: PageRequest,
    ) -> Result<Page<Self>, PageError> {
        let select = Self::assigned_to(worker_id);
        Ok(fetch_page(db, select, request).await?.map(Self::from_model))
    }

    pub async fn find_assigned_to<C: ConnectionTrait>(
        db: &C,
        worker_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = Self::assigned_to(worker_id).all(db).await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_project_id<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_id))
            .order_by_asc(task::Column::Deadline)
            .order_by_desc(task::Column::Priority)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_detail<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<TaskDetail>, DbErr> {
        let Some(record) = task::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };

        let task_type = record
            .find_related(task_type::Entity)
            .one(db)
            .await?
            .map(TaskType::from_model)
            .ok_or(DbErr::RecordNotFound("Task type not found".to_string()))?;
        let project = record
            .find_related(project::Entity)
            .one(db)
            .await?
            .map(Project::from_model);
        let assignees = record
            .find_related(worker::Entity)
            .order_by_asc(worker::Column::Username)
            .all(db)
            .await?
            .into_iter()
            .map(Worker::from_model)
            .collect();
        let assignees = Worker::with_relations(db, assignees).await?;

        Ok(Some(TaskDetail {
            task: Self::from_model(record),
            task_type,
            project,
            assignees,
        }))
    }

    pub async fn assignee_ids<C: ConnectionTrait>(db: &C, task_id: i64) -> Result<Vec<i64>, DbErr> {
        task_assignee::Entity::find()
            .select_only()
            .column(task_assignee::Column::WorkerId)
            .filter(task_assignee::Column::TaskId.eq(task_id))
            .order_by_asc(task_assignee::Column::WorkerId)
            .into_tuple()
            .all(db)
            .await
    }

    /// Inserts the task and its assignee links. Run inside a transaction so a
    /// failed link leaves no task row behind.
    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateTask) -> Result<Self, TaskError> {
        ensure_references(
            db,
            Some(data.task_type_id),
            data.project_id,
            Some(data.assignee_ids.as_slice()),
        )
        .await?;

        let now = Utc::now();
        let active = task::ActiveModel {
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            deadline: Set(data.deadline),
            is_completed: Set(false),
            priority: Set(data.priority),
            task_type_id: Set(data.task_type_id),
            project_id: Set(data.project_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        replace_assignees(db, model.id, &data.assignee_ids).await?;

        tracing::debug!(task_id = model.id, name = %model.name, "task created");
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        ensure_references(
            db,
            data.task_type_id,
            data.project_id.flatten(),
            data.assignee_ids.as_deref(),
        )
        .await?;

        let mut active: task::ActiveModel = record.into();
        if let Some(name) = data.name.clone() {
            active.name = Set(name);
        }
        if let Some(description) = data.description.clone() {
            active.description = Set(description);
        }
        if let Some(deadline) = data.deadline {
            active.deadline = Set(deadline);
        }
        if let Some(is_completed) = data.is_completed {
            active.is_completed = Set(is_completed);
        }
        if let Some(priority) = data.priority {
            active.priority = Set(priority);
        }
        if let Some(task_type_id) = data.task_type_id {
            active.task_type_id = Set(task_type_id);
        }
        if let Some(project_id) = data.project_id {
            active.project_id = Set(project_id);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        if let Some(assignee_ids) = &data.assignee_ids {
            replace_assignees(db, updated.id, assignee_ids).await?;
        }
        Ok(Self::from_model(updated))
    }

    /// Deletes the task and its assignee links.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        task_assignee::Entity::delete_many()
            .filter(task_assignee::Column::TaskId.eq(id))
            .exec(db)
            .await?;
        let result = task::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

async fn ensure_references<C: ConnectionTrait>(
    db: &C,
    task_type_id: Option<i64>,
    project_id: Option<i64>,
    assignee_ids: Option<&[i64]>,
) -> Result<(), TaskError> {
    if let Some(task_type_id) = task_type_id
        && TaskType::find_by_id(db, task_type_id).await?.is_none()
    {
        return Err(TaskError::TaskTypeNotFound(task_type_id));
    }
    if let Some(project_id) = project_id
        && Project::find_by_id(db, project_id).await?.is_none()
    {
        return Err(TaskError::ProjectNotFound(project_id));
    }
    if let Some(assignee_ids) = assignee_ids {
        let missing = Worker::missing_ids(db, assignee_ids).await?;
        if !missing.is_empty() {
            return Err(TaskError::WorkersNotFound(missing));
        }
    }
    Ok(())
}

async fn replace_assignees<C: ConnectionTrait>(
    db: &C,
    task_id: i64,
    worker_ids: &[i64],
) -> Result<(), DbErr> {
    task_assignee::Entity::delete_many()
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .exec(db)
        .await?;

    let unique: BTreeSet<i64> = worker_ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }
    let links = unique.into_iter().map(|worker_id| task_assignee::ActiveModel {
        task_id: Set(task_id),
        worker_id: Set(worker_id),
    });
    task_assignee::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}
