use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};

use crate::entities::{position, worker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePosition {
    pub name: String,
}

impl Position {
    pub(crate) fn from_model(model: position::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = position::Entity::find()
            .order_by_asc(position::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = position::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub(crate) async fn find_map<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i64>,
    ) -> Result<HashMap<i64, Self>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let records = position::Entity::find()
            .filter(position::Column::Id.is_in(ids))
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| (model.id, Self::from_model(model)))
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreatePosition) -> Result<Self, DbErr> {
        let active = position::ActiveModel {
            name: Set(data.name.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Deletes the position; its workers keep their rows with no position.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        worker::Entity::update_many()
            .col_expr(worker::Column::PositionId, Expr::value(None::<i64>))
            .filter(worker::Column::PositionId.eq(id))
            .exec(db)
            .await?;

        let result = position::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
