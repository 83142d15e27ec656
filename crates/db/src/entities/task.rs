use sea_orm::entity::prelude::*;

use crate::types::TaskPriority;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub deadline: Date,
    pub is_completed: bool,
    pub priority: TaskPriority,
    pub task_type_id: i64,
    pub project_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task_type::Entity",
        from = "Column::TaskTypeId",
        to = "super::task_type::Column::Id",
        on_delete = "Cascade"
    )]
    TaskType,
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "SetNull"
    )]
    Project,
    #[sea_orm(has_many = "super::task_assignee::Entity")]
    TaskAssignee,
}

impl Related<super::task_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskType.def()
    }
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::task_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskAssignee.def()
    }
}

impl Related<super::worker::Entity> for Entity {
    fn to() -> RelationDef {
        super::task_assignee::Relation::Worker.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::task_assignee::Relation::Task.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
