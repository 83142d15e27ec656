//! Form input decoding and task form validation.
//!
//! Bodies may be `application/x-www-form-urlencoded` (repeated keys for
//! multi-valued fields such as `assignees`) or a flat JSON object.

use std::{collections::BTreeMap, str::FromStr};

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
};
use chrono::NaiveDate;
use db::{
    DbErr,
    models::{
        project::Project,
        task::{CreateTask, Task, UpdateTask},
        task_type::TaskType,
        worker::{Worker, WorkerWithRelations},
    },
    types::TaskPriority,
};
use sea_orm::ConnectionTrait;
use url::form_urlencoded;

use crate::error::{ApiError, FieldErrors};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const NAME_MAX_CHARS: usize = 200;

/// Submitted form fields, each with every value it was given.
#[derive(Debug, Default, Clone)]
pub struct FormFields(BTreeMap<String, Vec<String>>);

impl FormFields {
    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut fields = BTreeMap::<String, Vec<String>>::new();
        for (key, value) in form_urlencoded::parse(body) {
            fields
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self(fields)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| ApiError::BadRequest(format!("Invalid JSON body: {err}")))?;
        let serde_json::Value::Object(object) = value else {
            return Err(ApiError::BadRequest("Expected a JSON object".to_string()));
        };

        let mut fields = BTreeMap::new();
        for (key, value) in object {
            let values = match value {
                serde_json::Value::Array(items) => items.into_iter().filter_map(scalar).collect(),
                other => scalar(other).into_iter().collect(),
            };
            fields.insert(key, values);
        }
        Ok(Self(fields))
    }

    /// The first value of `name`, trimmed.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.trim())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

fn scalar(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        if is_json {
            Self::from_json(&body)
        } else {
            Ok(Self::from_urlencoded(&body))
        }
    }
}

#[derive(Default)]
struct Errors(FieldErrors);

impl Errors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ApiError> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

/// Task form fields after parsing; absent fields are `None`.
#[derive(Debug, Default)]
struct TaskInput {
    name: Option<String>,
    description: Option<String>,
    deadline: Option<NaiveDate>,
    priority: Option<TaskPriority>,
    task_type_id: Option<i64>,
    project_id: Option<Option<i64>>,
    assignee_ids: Option<Vec<i64>>,
    is_completed: Option<bool>,
}

/// Which fields must be present.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

pub async fn validate_create<C: ConnectionTrait>(
    db: &C,
    fields: &FormFields,
) -> Result<CreateTask, ApiError> {
    let input = parse_task_input(db, fields, Mode::Create).await?;
    // `parse_task_input` reported every missing required field.
    let (Some(name), Some(description), Some(deadline), Some(task_type_id)) = (
        input.name,
        input.description,
        input.deadline,
        input.task_type_id,
    ) else {
        return Err(ApiError::Internal("validated task form lost a field".to_string()));
    };

    Ok(CreateTask {
        name,
        description,
        deadline,
        priority: input.priority.unwrap_or_default(),
        task_type_id,
        project_id: input.project_id.flatten(),
        assignee_ids: input.assignee_ids.unwrap_or_default(),
    })
}

pub async fn validate_update<C: ConnectionTrait>(
    db: &C,
    fields: &FormFields,
) -> Result<UpdateTask, ApiError> {
    let input = parse_task_input(db, fields, Mode::Update).await?;
    Ok(UpdateTask {
        name: input.name,
        description: input.description,
        deadline: input.deadline,
        is_completed: input.is_completed,
        priority: input.priority,
        task_type_id: input.task_type_id,
        project_id: input.project_id,
        assignee_ids: input.assignee_ids,
    })
}

async fn parse_task_input<C: ConnectionTrait>(
    db: &C,
    fields: &FormFields,
    mode: Mode,
) -> Result<TaskInput, ApiError> {
    let mut errors = Errors::default();
    let mut input = TaskInput::default();
    let required = |name: &str| mode == Mode::Create || fields.contains(name);

    match fields.get("name").filter(|value| !value.is_empty()) {
        Some(name) => {
            let chars = name.chars().count();
            if chars > NAME_MAX_CHARS {
                errors.add(
                    "name",
                    format!(
                        "Ensure this value has at most {NAME_MAX_CHARS} characters (it has {chars})."
                    ),
                );
            } else {
                input.name = Some(name.to_string());
            }
        }
        None if required("name") => errors.add("name", REQUIRED),
        None => {}
    }

    match fields.get("description").filter(|value| !value.is_empty()) {
        Some(description) => input.description = Some(description.to_string()),
        None if required("description") => errors.add("description", REQUIRED),
        None => {}
    }

    match fields.get("deadline").filter(|value| !value.is_empty()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(deadline) => input.deadline = Some(deadline),
            Err(_) => errors.add("deadline", INVALID_DATE),
        },
        None if required("deadline") => errors.add("deadline", REQUIRED),
        None => {}
    }

    if let Some(raw) = fields.get("priority").filter(|value| !value.is_empty()) {
        match TaskPriority::from_str(raw) {
            Ok(priority) => input.priority = Some(priority),
            Err(_) => errors.add(
                "priority",
                format!("Select a valid choice. {raw} is not one of the available choices."),
            ),
        }
    }

    match fields.get("task_type").filter(|value| !value.is_empty()) {
        Some(raw) => {
            let task_type = match raw.parse::<i64>() {
                Ok(id) => TaskType::find_by_id(db, id).await?,
                Err(_) => None,
            };
            match task_type {
                Some(task_type) => input.task_type_id = Some(task_type.id),
                None => errors.add("task_type", INVALID_CHOICE),
            }
        }
        None if required("task_type") => errors.add("task_type", REQUIRED),
        None => {}
    }

    if let Some(raw) = fields.get("project") {
        if raw.is_empty() {
            input.project_id = Some(None);
        } else {
            let project = match raw.parse::<i64>() {
                Ok(id) => Project::find_by_id(db, id).await?,
                Err(_) => None,
            };
            match project {
                Some(project) => input.project_id = Some(Some(project.id)),
                None => errors.add("project", INVALID_CHOICE),
            }
        }
    }

    if required("assignees") {
        match parse_assignees(db, fields.get_all("assignees")).await? {
            Ok(ids) if ids.is_empty() => errors.add("assignees", REQUIRED),
            Ok(ids) => input.assignee_ids = Some(ids),
            Err(message) => errors.add("assignees", message),
        }
    }

    if let Some(raw) = fields.get("is_completed") {
        input.is_completed = Some(parse_checkbox(raw));
    }

    errors.finish(|| input)
}

/// Resolves assignee ids, collapsing duplicates. The inner error names the
/// first value that is not a known worker.
async fn parse_assignees<C: ConnectionTrait>(
    db: &C,
    raw: &[String],
) -> Result<Result<Vec<i64>, String>, DbErr> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
        match value.parse::<i64>() {
            Ok(id) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Err(_) => return Ok(Err(format!("“{value}” is not a valid value."))),
        }
    }

    let missing = Worker::missing_ids(db, &ids).await?;
    if let Some(id) = missing.first() {
        return Ok(Err(format!(
            "Select a valid choice. {id} is not one of the available choices."
        )));
    }
    Ok(Ok(ids))
}

/// Checkbox semantics: anything but an explicit false value is checked.
fn parse_checkbox(raw: &str) -> bool {
    !matches!(
        raw.to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no"
    )
}

/// Everything a client needs to render the task form.
#[derive(Debug, serde::Serialize)]
pub struct TaskFormContext {
    pub task_types: Vec<TaskType>,
    pub projects: Vec<Project>,
    pub workers: Vec<WorkerWithRelations>,
    pub priorities: Vec<TaskPriority>,
    pub default_priority: TaskPriority,
}

impl TaskFormContext {
    pub async fn load<C: ConnectionTrait>(db: &C) -> Result<Self, DbErr> {
        Ok(Self {
            task_types: TaskType::find_all(db).await?,
            projects: Project::find_all(db).await?,
            workers: Worker::find_all(db).await?,
            priorities: TaskPriority::choices(),
            default_priority: TaskPriority::default(),
        })
    }
}

/// Current values of an existing task, for pre-filling the update form.
#[derive(Debug, serde::Serialize)]
pub struct TaskFormInitial {
    pub task: Task,
    pub assignee_ids: Vec<i64>,
}
