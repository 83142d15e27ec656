use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{team, worker},
    models::{
        pagination::{Page, PageError, PageRequest, fetch_page},
        worker::{Worker, WorkerWithRelations},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<WorkerWithRelations>,
    /// Member usernames joined with ", ".
    pub member_names: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeam {
    pub name: String,
}

impl Team {
    pub(crate) fn from_model(model: team::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = team::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub(crate) async fn find_map<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i64>,
    ) -> Result<HashMap<i64, Self>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let records = team::Entity::find()
            .filter(team::Column::Id.is_in(ids))
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| (model.id, Self::from_model(model)))
            .collect())
    }

    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        request: PageRequest,
    ) -> Result<Page<Self>, PageError> {
        let select = team::Entity::find().order_by_asc(team::Column::Name);
        Ok(fetch_page(db, select, request).await?.map(Self::from_model))
    }

    pub async fn find_detail<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<TeamDetail>, DbErr> {
        let Some(team) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let members = Worker::find_by_team_id(db, team.id).await?;
        let member_names = members
            .iter()
            .map(|member| member.worker.username.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(TeamDetail {
            team,
            members,
            member_names,
        }))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateTeam) -> Result<Self, DbErr> {
        let active = team::ActiveModel {
            name: Set(data.name.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Deletes the team; its members stay, without a team.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        worker::Entity::update_many()
            .col_expr(worker::Column::TeamId, Expr::value(None::<i64>))
            .filter(worker::Column::TeamId.eq(id))
            .exec(db)
            .await?;

        let result = team::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::worker::CreateWorker, test_support::setup_db};

    #[tokio::test]
    async fn detail_lists_members() {
        let db = setup_db().await;
        let team = Team::create(
            &db,
            &CreateTeam {
                name: "Platform".to_string(),
            },
        )
        .await
        .unwrap();
        for username in ["zoe", "amir"] {
            Worker::create(
                &db,
                &CreateWorker {
                    team_id: Some(team.id),
                    ..CreateWorker::new(username, "hash")
                },
            )
            .await
            .unwrap();
        }
        Worker::create(&db, &CreateWorker::new("outsider", "hash"))
            .await
            .unwrap();

        let detail = Team::find_detail(&db, team.id).await.unwrap().unwrap();
        assert_eq!(detail.members.len(), 2);
        assert_eq!(detail.member_names, "amir, zoe");
        assert!(Team::find_detail(&db, team.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_team_keeps_members() {
        let db = setup_db().await;
        let team = Team::create(
            &db,
            &CreateTeam {
                name: "Ops".to_string(),
            },
        )
        .await
        .unwrap();
        let member = Worker::create(
            &db,
            &CreateWorker {
                team_id: Some(team.id),
                ..CreateWorker::new("oscar", "hash")
            },
        )
        .await
        .unwrap();

        assert_eq!(Team::delete(&db, team.id).await.unwrap(), 1);
        let member = Worker::find_by_id(&db, member.id).await.unwrap().unwrap();
        assert_eq!(member.team_id, None);
        assert_eq!(Team::delete(&db, team.id).await.unwrap(), 0);
    }
}
