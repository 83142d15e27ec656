use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::{task, task_assignee, task_type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskType {
    pub name: String,
}

impl TaskType {
    pub(crate) fn from_model(model: task_type::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = task_type::Entity::find()
            .order_by_asc(task_type::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = task_type::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateTaskType) -> Result<Self, DbErr> {
        let active = task_type::ActiveModel {
            name: Set(data.name.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Deletes the task type together with every task of that type.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let task_ids: Vec<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::Id)
            .filter(task::Column::TaskTypeId.eq(id))
            .into_tuple()
            .all(db)
            .await?;

        if !task_ids.is_empty() {
            task_assignee::Entity::delete_many()
                .filter(task_assignee::Column::TaskId.is_in(task_ids.clone()))
                .exec(db)
                .await?;
            let removed = task::Entity::delete_many()
                .filter(task::Column::Id.is_in(task_ids))
                .exec(db)
                .await?;
            tracing::debug!(
                task_type_id = id,
                tasks = removed.rows_affected,
                "removed tasks of deleted type"
            );
        }

        let result = task_type::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
