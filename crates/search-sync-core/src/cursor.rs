//! Forward-only cursor pagination over eligible project ids.
//!
//! A [`Cursor`] is the last id seen on the previous page. It is opaque on
//! purpose: it can only be produced from an id the store returned, and it
//! has no arithmetic, so it cannot be mistaken for an offset.

use anyhow::Result;
use std::fmt;

use crate::models::ProjectId;
use crate::source::ProjectSource;

/// Position after the last id of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(ProjectId);

impl Cursor {
    /// Cursor positioned after `id`.
    pub fn after(id: impl Into<ProjectId>) -> Self {
        Cursor(id.into())
    }

    /// The id the next page starts strictly after.
    pub fn last_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of coarse-eligible ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub ids: Vec<ProjectId>,
    /// Cursor after the last id of this page; `None` when the page is empty.
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Fetch the page of eligible ids that follows `cursor`.
///
/// Starts from the beginning when `cursor` is `None`.
pub async fn next_page(
    source: &dyn ProjectSource,
    cursor: Option<&Cursor>,
    limit: usize,
) -> Result<Page> {
    let ids = source.list_eligible_ids(cursor, limit).await?;
    let next_cursor = ids.last().map(|id| Cursor::after(id.clone()));
    Ok(Page { ids, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::{sample_project, InMemoryProjectSource};

    fn source(n: usize) -> InMemoryProjectSource {
        let source = InMemoryProjectSource::new();
        for i in 0..n {
            source.insert(sample_project(&format!("p{:05}", i)));
        }
        source
    }

    #[tokio::test]
    async fn pages_walk_forward_in_identity_order() {
        let source = source(5);

        let first = next_page(&source, None, 2).await.unwrap();
        assert_eq!(first.ids, vec!["p00000", "p00001"]);
        assert_eq!(first.next_cursor, Some(Cursor::after("p00001")));

        let second = next_page(&source, first.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(second.ids, vec!["p00002", "p00003"]);

        let third = next_page(&source, second.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(third.ids, vec!["p00004"]);

        let done = next_page(&source, third.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert!(done.is_empty());
        assert_eq!(done.next_cursor, None);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_page() {
        let source = InMemoryProjectSource::new();
        let page = next_page(&source, None, 1000).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.next_cursor, None);
    }
}
