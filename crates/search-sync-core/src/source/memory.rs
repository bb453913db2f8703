//! In-memory [`ProjectSource`] for tests.
//!
//! Projects live in a `BTreeMap` keyed by id, so identity order is the
//! map's key order. Every coarse listing call is recorded so tests can
//! assert on how the orchestrator paged through the store.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::cursor::Cursor;
use crate::models::{
    EnvironmentSupport, HydratedProject, ProjectId, PublishingStatus, TeamMember, Visibility,
};

use super::ProjectSource;

/// One recorded call to [`ProjectSource::list_eligible_ids`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<String>,
    pub limit: usize,
    pub returned: usize,
}

/// In-memory project store.
pub struct InMemoryProjectSource {
    projects: RwLock<BTreeMap<ProjectId, HydratedProject>>,
    /// Ids that still list as eligible but vanish before hydration.
    vanished: RwLock<HashSet<ProjectId>>,
    requests: RwLock<Vec<PageRequest>>,
    fail_hydrate: RwLock<bool>,
}

impl InMemoryProjectSource {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(BTreeMap::new()),
            vanished: RwLock::new(HashSet::new()),
            requests: RwLock::new(Vec::new()),
            fail_hydrate: RwLock::new(false),
        }
    }

    pub fn insert(&self, project: HydratedProject) {
        self.projects
            .write()
            .unwrap()
            .insert(project.id.clone(), project);
    }

    /// Keep `id` in coarse listings but make hydration miss it.
    pub fn vanish(&self, id: &str) {
        self.vanished.write().unwrap().insert(id.to_string());
    }

    /// Make every subsequent [`hydrate`](ProjectSource::hydrate) call fail.
    pub fn fail_hydration(&self) {
        *self.fail_hydrate.write().unwrap() = true;
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.requests.read().unwrap().clone()
    }
}

impl Default for InMemoryProjectSource {
    fn default() -> Self {
        Self::new()
    }
}

fn coarse_eligible(p: &HydratedProject) -> bool {
    matches!(p.visibility, Visibility::Listed | Visibility::Archived)
        && p.status == PublishingStatus::Approved
}

#[async_trait]
impl ProjectSource for InMemoryProjectSource {
    async fn list_eligible_ids(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<ProjectId>> {
        let projects = self.projects.read().unwrap();
        let ids: Vec<ProjectId> = projects
            .values()
            .filter(|p| after.map_or(true, |c| p.id.as_str() > c.last_id()))
            .filter(|p| coarse_eligible(p))
            .take(limit)
            .map(|p| p.id.clone())
            .collect();

        self.requests.write().unwrap().push(PageRequest {
            after: after.map(|c| c.last_id().to_string()),
            limit,
            returned: ids.len(),
        });
        Ok(ids)
    }

    async fn hydrate(&self, ids: &[ProjectId]) -> Result<Vec<Option<HydratedProject>>> {
        if *self.fail_hydrate.read().unwrap() {
            bail!("hydration failed: store unavailable");
        }
        let projects = self.projects.read().unwrap();
        let vanished = self.vanished.read().unwrap();
        Ok(ids
            .iter()
            .map(|id| {
                if vanished.contains(id) {
                    None
                } else {
                    projects.get(id).cloned()
                }
            })
            .collect())
    }

    async fn count_eligible(&self) -> Result<u64> {
        let projects = self.projects.read().unwrap();
        Ok(projects.values().filter(|p| coarse_eligible(p)).count() as u64)
    }
}

/// A listed, approved project with one team member, for fixtures.
pub fn sample_project(id: &str) -> HydratedProject {
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    HydratedProject {
        id: id.to_string(),
        name: format!("Project {}", id),
        slug: id.to_lowercase(),
        summary: format!("Summary of {}", id),
        icon_file_id: None,
        color: None,
        project_type: vec!["mod".to_string()],
        loaders: vec!["fabric".to_string()],
        game_versions: vec!["1.20.1".to_string()],
        categories: vec!["utility".to_string()],
        featured_categories: Vec::new(),
        downloads: 0,
        followers: 0,
        date_published: ts,
        date_updated: ts,
        client_side: EnvironmentSupport::Optional,
        server_side: EnvironmentSupport::Required,
        project_source_url: None,
        visibility: Visibility::Listed,
        status: PublishingStatus::Approved,
        members: vec![TeamMember {
            user_name: "owner".to_string(),
            role: "Owner".to_string(),
            is_owner: true,
        }],
        organisation: None,
        gallery: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coarse_listing_skips_ineligible() {
        let source = InMemoryProjectSource::new();
        source.insert(sample_project("a"));
        let mut hidden = sample_project("b");
        hidden.visibility = Visibility::Private;
        source.insert(hidden);
        let mut pending = sample_project("c");
        pending.status = PublishingStatus::Processing;
        source.insert(pending);
        let mut archived = sample_project("d");
        archived.visibility = Visibility::Archived;
        source.insert(archived);

        let ids = source.list_eligible_ids(None, 10).await.unwrap();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(source.count_eligible().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn hydrate_keeps_slots_for_missing_ids() {
        let source = InMemoryProjectSource::new();
        source.insert(sample_project("a"));
        source.insert(sample_project("b"));
        source.vanish("b");

        let ids = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        let hydrated = source.hydrate(&ids).await.unwrap();
        assert_eq!(hydrated.len(), 3);
        assert!(hydrated[0].is_some());
        assert!(hydrated[1].is_none());
        assert!(hydrated[2].is_none());
    }

    #[tokio::test]
    async fn records_page_requests() {
        let source = InMemoryProjectSource::new();
        source.insert(sample_project("a"));
        source.list_eligible_ids(None, 5).await.unwrap();
        source
            .list_eligible_ids(Some(&Cursor::after("a")), 5)
            .await
            .unwrap();

        let requests = source.page_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].returned, 1);
        assert_eq!(requests[1].after.as_deref(), Some("a"));
        assert_eq!(requests[1].returned, 0);
    }
}
