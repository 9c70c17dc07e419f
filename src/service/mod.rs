//! Business rules over the repository interfaces.
//!
//! Each service owns its repository handle and a `tracing::Span` handed in by
//! the caller; events are emitted under that span rather than a global logger.

pub mod auth;
pub mod invitation;
pub mod notification;
pub mod ttr;
pub mod user;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::ttr::Ttr;
use crate::repository::TtrRepository;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Clamps optional pagination parameters to `(limit, offset)`.
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

pub(crate) async fn load_ttr<R: TtrRepository>(repo: &R, id: Uuid) -> Result<Ttr, AppError> {
    repo.find_ttr(id)
        .await?
        .ok_or_else(|| AppError::NotFound("TTR not found".into()))
}

pub(crate) fn is_captain(ttr: &Ttr, actor: Uuid) -> bool {
    ttr.captain_id == actor
}

/// Captain or co-captain.
pub(crate) async fn can_manage<R: TtrRepository>(
    repo: &R,
    ttr: &Ttr,
    actor: Uuid,
) -> Result<bool, AppError> {
    if is_captain(ttr, actor) {
        return Ok(true);
    }
    repo.is_co_captain(ttr.id, actor).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_bounds() {
        assert_eq!(page(None, None), (20, 0));
        assert_eq!(page(Some(500), Some(-3)), (100, 0));
        assert_eq!(page(Some(0), Some(40)), (1, 40));
    }
}
