use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub position_id: Option<i64>,
    pub team_id: Option<i64>,
    pub last_login: Option<DateTimeUtc>,
    pub date_joined: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::position::Entity",
        from = "Column::PositionId",
        to = "super::position::Column::Id",
        on_delete = "SetNull"
    )]
    Position,
    #[sea_orm(
        belongs_to = "super::team::Entity",
        from = "Column::TeamId",
        to = "super::team::Column::Id",
        on_delete = "SetNull"
    )]
    Team,
    #[sea_orm(has_many = "super::task_assignee::Entity")]
    TaskAssignee,
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
}

impl Related<super::position::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Position.def()
    }
}

impl Related<super::team::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Team.def()
    }
}

impl Related<super::task_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskAssignee.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        super::task_assignee::Relation::Task.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::task_assignee::Relation::Worker.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
