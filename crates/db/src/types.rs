use sea_orm::{Iterable, entity::prelude::*};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Urgency of a task. Stored as its rank so that ordering by the column
/// orders by urgency.
///
/// Lists sort by this rank rather than by label text, which would put
/// `High` ahead of `Low` and `Medium`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[strum(ascii_case_insensitive)]
pub enum TaskPriority {
    #[sea_orm(num_value = 0)]
    Low,
    #[default]
    #[sea_orm(num_value = 1)]
    Medium,
    #[sea_orm(num_value = 2)]
    High,
    #[sea_orm(num_value = 3)]
    Critical,
}

impl TaskPriority {
    pub fn choices() -> Vec<TaskPriority> {
        <TaskPriority as Iterable>::iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(TaskPriority::from_str("High").unwrap(), TaskPriority::High);
        assert_eq!(TaskPriority::from_str("critical").unwrap(), TaskPriority::Critical);
        assert!(TaskPriority::from_str("Urgent").is_err());
    }

    #[test]
    fn choices_are_ordered_by_urgency() {
        assert_eq!(
            TaskPriority::choices(),
            vec![
                TaskPriority::Low,
                TaskPriority::Medium,
                TaskPriority::High,
                TaskPriority::Critical
            ]
        );
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(TaskPriority::High.to_string(), "High");
    }
}
