use sea_orm::{
    ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Invalid page ({0}): That page contains no results")]
    OutOfRange(u64),
}

/// A 1-based page position and its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    pub fn first(per_page: u64) -> Self {
        Self::new(1, per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(mut self, f: impl FnMut(T) -> U) -> Page<U> {
        let items = std::mem::take(&mut self.items).into_iter().map(f).collect();
        self.with_items(items)
    }

    /// Replaces the items, keeping the position metadata.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fetches one page of `select`.
///
/// An empty result still has one (empty) page; any page past the last one,
/// or page 0, is `PageError::OutOfRange`.
pub async fn fetch_page<'db, C, E>(
    db: &'db C,
    select: Select<E>,
    request: PageRequest,
) -> Result<Page<E::Model>, PageError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync + 'db,
{
    let per_page = request.per_page.max(1);
    let paginator = select.paginate(db, per_page);
    let totals = paginator.num_items_and_pages().await?;
    let total_pages = totals.number_of_pages.max(1);

    if request.page == 0 || request.page > total_pages {
        return Err(PageError::OutOfRange(request.page));
    }

    let items = paginator.fetch_page(request.page - 1).await?;
    Ok(Page {
        items,
        page: request.page,
        per_page,
        total_items: totals.number_of_items,
        total_pages,
        has_next: request.page < total_pages,
        has_previous: request.page > 1,
    })
}

#[cfg(test)]
mod tests {
    use sea_orm::QueryOrder;

    use super::*;
    use crate::{
        entities::team,
        models::team::{CreateTeam, Team},
        test_support::setup_db,
    };

    async fn seed_teams(db: &sea_orm::DatabaseConnection, count: usize) {
        for index in 0..count {
            Team::create(
                db,
                &CreateTeam {
                    name: format!("Team {index:02}"),
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn pages_split_and_report_neighbours() {
        let db = setup_db().await;
        seed_teams(&db, 7).await;

        let select = || team::Entity::find().order_by_asc(team::Column::Name);

        let first = fetch_page(&db, select(), PageRequest::first(3)).await.unwrap();
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.total_items, 7);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.items[0].name, "Team 00");

        let last = fetch_page(&db, select(), PageRequest::new(3, 3)).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "Team 06");
        assert!(!last.has_next);
        assert!(last.has_previous);

        assert!(matches!(
            fetch_page(&db, select(), PageRequest::new(4, 3)).await,
            Err(PageError::OutOfRange(4))
        ));
        assert!(matches!(
            fetch_page(&db, select(), PageRequest::new(0, 3)).await,
            Err(PageError::OutOfRange(0))
        ));
    }

    #[tokio::test]
    async fn empty_result_has_a_single_empty_page() {
        let db = setup_db().await;

        let page = fetch_page(&db, team::Entity::find(), PageRequest::first(3))
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);

        assert!(matches!(
            fetch_page(&db, team::Entity::find(), PageRequest::new(2, 3)).await,
            Err(PageError::OutOfRange(2))
        ));
    }
}
