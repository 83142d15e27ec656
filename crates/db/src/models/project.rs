use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{project, task},
    models::{
        pagination::{Page, PageError, PageRequest, fetch_page},
        task::Task,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
    /// Task names joined with ", ".
    pub task_names: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
}

impl Project {
    pub(crate) fn from_model(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_asc(project::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        request: PageRequest,
    ) -> Result<Page<Self>, PageError> {
        let select = project::Entity::find().order_by_asc(project::Column::Name);
        Ok(fetch_page(db, select, request).await?.map(Self::from_model))
    }

    pub async fn find_detail<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<ProjectDetail>, DbErr> {
        let Some(project) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let tasks = Task::find_by_project_id(db, project.id).await?;
        let task_names = tasks
            .iter()
            .map(|task| task.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(ProjectDetail {
            project,
            tasks,
            task_names,
        }))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateProject) -> Result<Self, DbErr> {
        let active = project::ActiveModel {
            name: Set(data.name.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Deletes the project; its tasks are kept and detached.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        task::Entity::update_many()
            .col_expr(task::Column::ProjectId, Expr::value(None::<i64>))
            .filter(task::Column::ProjectId.eq(id))
            .exec(db)
            .await?;

        let result = project::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        models::{
            task::CreateTask,
            task_type::{CreateTaskType, TaskType},
        },
        test_support::setup_db,
    };

    async fn task_in(
        db: &sea_orm::DatabaseConnection,
        name: &str,
        project_id: i64,
        type_id: i64,
    ) -> Task {
        Task::create(
            db,
            &CreateTask {
                project_id: Some(project_id),
                ..CreateTask::new(name, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), type_id)
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn detail_lists_tasks_and_deletion_detaches_them() {
        let db = setup_db().await;
        let task_type = TaskType::create(
            &db,
            &CreateTaskType {
                name: "Feature".to_string(),
            },
        )
        .await
        .unwrap();
        let project = Project::create(
            &db,
            &CreateProject {
                name: "Website".to_string(),
            },
        )
        .await
        .unwrap();
        let first = task_in(&db, "Landing page", project.id, task_type.id).await;
        task_in(&db, "Pricing page", project.id, task_type.id).await;

        let detail = Project::find_detail(&db, project.id).await.unwrap().unwrap();
        assert_eq!(detail.tasks.len(), 2);
        assert!(detail.task_names.contains("Landing page"));
        assert!(detail.task_names.contains(", "));

        assert_eq!(Project::delete(&db, project.id).await.unwrap(), 1);
        let first = Task::find_by_id(&db, first.id).await.unwrap().unwrap();
        assert_eq!(first.project_id, None);
        assert_eq!(Task::count(&db).await.unwrap(), 2);
    }
}
