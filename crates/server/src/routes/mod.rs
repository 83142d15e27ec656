use db::models::pagination::PageRequest;
use serde::Deserialize;

use crate::error::ApiError;

pub mod accounts;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod teams;
pub mod workers;

pub const TASKS_PER_PAGE: u64 = 10;
pub const WORKERS_PER_PAGE: u64 = 10;
pub const TEAMS_PER_PAGE: u64 = 3;
pub const PROJECTS_PER_PAGE: u64 = 3;

/// `?page=` as sent; parsed by [`page_request`] so a bad value becomes a 404.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn request(&self, per_page: u64) -> Result<PageRequest, ApiError> {
        page_request(self.page.as_deref(), per_page)
    }
}

pub fn page_request(raw: Option<&str>, per_page: u64) -> Result<PageRequest, ApiError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(PageRequest::first(per_page)),
        Some(raw) => raw
            .parse::<u64>()
            .map(|page| PageRequest::new(page, per_page))
            .map_err(|_| {
                ApiError::NotFound("Invalid page: That page number is not an integer".to_string())
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_to_first() {
        assert_eq!(page_request(None, 10).unwrap(), PageRequest::first(10));
        assert_eq!(page_request(Some(" "), 3).unwrap(), PageRequest::first(3));
        assert_eq!(page_request(Some("2"), 3).unwrap(), PageRequest::new(2, 3));
    }

    #[test]
    fn non_numeric_page_is_rejected() {
        assert!(matches!(
            page_request(Some("two"), 10),
            Err(ApiError::NotFound(_))
        ));
        assert!(page_request(Some("-1"), 10).is_err());
    }
}
