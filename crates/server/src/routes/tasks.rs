use axum::{
    Extension, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::{Json as ResponseJson, Response},
    routing::get,
};
use db::{
    TransactionTrait,
    models::{
        pagination::Page,
        task::{Task, TaskDetail},
    },
};
use serde::Serialize;

use crate::{
    Deployment,
    error::ApiError,
    forms::{FormFields, TaskFormContext, TaskFormInitial, validate_create, validate_update},
    http::auth::CurrentWorker,
    middleware::load_task_middleware,
    response::{ApiResponse, found},
    routes::{PageQuery, TASKS_PER_PAGE},
};

const TASK_LIST_PATH: &str = "/tasks";

#[derive(Debug, Serialize)]
pub struct TaskUpdateForm {
    #[serde(flatten)]
    pub context: TaskFormContext,
    pub initial: TaskFormInitial,
}

/// Every task, soonest deadline first.
pub async fn dashboard(
    State(deployment): State<Deployment>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Task>>>, ApiError> {
    let request = query.request(TASKS_PER_PAGE)?;
    let page = Task::find_page(&deployment.db().pool, request).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// Tasks assigned to the signed-in worker.
pub async fn get_my_tasks(
    State(deployment): State<Deployment>,
    Extension(CurrentWorker(worker)): Extension<CurrentWorker>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Task>>>, ApiError> {
    let request = query.request(TASKS_PER_PAGE)?;
    let page = Task::find_assigned_page(&deployment.db().pool, worker.id, request).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<TaskDetail>>, ApiError> {
    let detail = Task::find_detail(&deployment.db().pool, task.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn get_create_form(
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<TaskFormContext>>, ApiError> {
    let context = TaskFormContext::load(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(context)))
}

pub async fn create_task(
    State(deployment): State<Deployment>,
    Extension(CurrentWorker(worker)): Extension<CurrentWorker>,
    fields: FormFields,
) -> Result<Response, ApiError> {
    let tx = deployment.db().pool.begin().await?;
    let data = validate_create(&tx, &fields).await?;
    let task = Task::create(&tx, &data).await?;
    tx.commit().await?;

    tracing::info!(
        task_id = task.id,
        worker_id = worker.id,
        assignees = data.assignee_ids.len(),
        "created task"
    );
    Ok(found(TASK_LIST_PATH))
}

pub async fn get_update_form(
    Extension(task): Extension<Task>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<TaskUpdateForm>>, ApiError> {
    let pool = &deployment.db().pool;
    let context = TaskFormContext::load(pool).await?;
    let assignee_ids = Task::assignee_ids(pool, task.id).await?;
    Ok(ResponseJson(ApiResponse::success(TaskUpdateForm {
        context,
        initial: TaskFormInitial { task, assignee_ids },
    })))
}

pub async fn update_task(
    Extension(existing_task): Extension<Task>,
    State(deployment): State<Deployment>,
    fields: FormFields,
) -> Result<Response, ApiError> {
    let tx = deployment.db().pool.begin().await?;
    let data = validate_update(&tx, &fields).await?;
    let task = Task::update(&tx, existing_task.id, &data).await?;
    tx.commit().await?;

    tracing::info!(task_id = task.id, is_completed = task.is_completed, "updated task");
    Ok(found(TASK_LIST_PATH))
}

/// The task about to be deleted, for the confirmation view.
pub async fn get_delete_confirmation(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(deployment): State<Deployment>,
) -> Result<Response, ApiError> {
    let tx = deployment.db().pool.begin().await?;
    let rows_affected = Task::delete(&tx, task.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    tx.commit().await?;

    tracing::info!(task_id = task.id, "deleted task");
    Ok(found(TASK_LIST_PATH))
}

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let task_id_router = Router::new()
        .route("/", get(get_task))
        .route("/update", get(get_update_form).post(update_task))
        .route("/delete", get(get_delete_confirmation).post(delete_task))
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware::<Deployment>));

    let inner = Router::new()
        .route("/", get(get_my_tasks))
        .route("/create", get(get_create_form).post(create_task))
        .nest("/{task_id}", task_id_router);

    Router::new()
        .route("/", get(dashboard))
        .nest("/tasks", inner)
}
