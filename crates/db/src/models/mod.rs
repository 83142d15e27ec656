pub mod pagination;
pub mod position;
pub mod project;
pub mod session;
pub mod task;
pub mod task_type;
pub mod team;
pub mod worker;
