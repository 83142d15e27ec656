use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(named_table(manager, Positions::Table, Positions::Id, Positions::Name))
            .await?;
        manager
            .create_table(named_table(manager, Teams::Table, Teams::Id, Teams::Name))
            .await?;
        manager
            .create_table(named_table(manager, Projects::Table, Projects::Id, Projects::Name))
            .await?;
        manager
            .create_table(named_table(manager, TaskTypes::Table, TaskTypes::Id, TaskTypes::Name))
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Workers::Table)
                    .col(pk_id_col(manager, Workers::Id))
                    .col(
                        ColumnDef::new(Workers::Username)
                            .string_len(150)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Workers::Email)
                            .string_len(254)
                            .not_null()
                            .default(Expr::val("")),
                    )
                    .col(ColumnDef::new(Workers::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Workers::FirstName)
                            .string_len(150)
                            .not_null()
                            .default(Expr::val("")),
                    )
                    .col(
                        ColumnDef::new(Workers::LastName)
                            .string_len(150)
                            .not_null()
                            .default(Expr::val("")),
                    )
                    .col(
                        ColumnDef::new(Workers::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(fk_id_nullable_col(manager, Workers::PositionId))
                    .col(fk_id_nullable_col(manager, Workers::TeamId))
                    .col(ColumnDef::new(Workers::LastLogin).timestamp())
                    .col(timestamp_col(Workers::DateJoined))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workers_position_id")
                            .from(Workers::Table, Workers::PositionId)
                            .to(Positions::Table, Positions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workers_team_id")
                            .from(Workers::Table, Workers::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_workers_position_id")
                    .table(Workers::Table)
                    .col(Workers::PositionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_workers_team_id")
                    .table(Workers::Table)
                    .col(Workers::TeamId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(ColumnDef::new(Tasks::Name).string_len(200).not_null())
                    .col(ColumnDef::new(Tasks::Description).text().not_null())
                    .col(ColumnDef::new(Tasks::Deadline).date().not_null())
                    .col(
                        ColumnDef::new(Tasks::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .integer()
                            .not_null()
                            .default(Expr::val(1)),
                    )
                    .col(fk_id_col(manager, Tasks::TaskTypeId))
                    .col(fk_id_nullable_col(manager, Tasks::ProjectId))
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_task_type_id")
                            .from(Tasks::Table, Tasks::TaskTypeId)
                            .to(TaskTypes::Table, TaskTypes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project_id")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_deadline_priority")
                    .table(Tasks::Table)
                    .col(Tasks::Deadline)
                    .col(Tasks::Priority)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_task_type_id")
                    .table(Tasks::Table)
                    .col(Tasks::TaskTypeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_project_id")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TaskAssignees::Table)
                    .col(fk_id_col(manager, TaskAssignees::TaskId))
                    .col(fk_id_col(manager, TaskAssignees::WorkerId))
                    .primary_key(
                        Index::create()
                            .name("pk_task_assignees")
                            .col(TaskAssignees::TaskId)
                            .col(TaskAssignees::WorkerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignees_task_id")
                            .from(TaskAssignees::Table, TaskAssignees::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignees_worker_id")
                            .from(TaskAssignees::Table, TaskAssignees::WorkerId)
                            .to(Workers::Table, Workers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_assignees_worker_id")
                    .table(TaskAssignees::Table)
                    .col(TaskAssignees::WorkerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskAssignees::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Positions::Table).to_owned())
            .await?;
        Ok(())
    }
}

/// Positions, teams, projects and task types share one shape: an id and a unique name.
fn named_table<T, C, N>(manager: &SchemaManager, table: T, id: C, name: N) -> TableCreateStatement
where
    T: Iden + 'static,
    C: Iden + 'static,
    N: Iden + 'static,
{
    Table::create()
        .if_not_exists()
        .table(table)
        .col(pk_id_col(manager, id))
        .col(ColumnDef::new(name).string_len(100).not_null().unique_key())
        .to_owned()
}

fn pk_id_col<T: Iden + 'static>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden + 'static>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden + 'static>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn timestamp_col<T: Iden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Positions {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Teams {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum TaskTypes {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Workers {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    IsActive,
    PositionId,
    TeamId,
    LastLogin,
    DateJoined,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Name,
    Description,
    Deadline,
    IsCompleted,
    Priority,
    TaskTypeId,
    ProjectId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TaskAssignees {
    Table,
    TaskId,
    WorkerId,
}
