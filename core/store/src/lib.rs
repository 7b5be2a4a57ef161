//! The embedded, file-backed local store: one SQLite database holding
//! projects, milestones, issues and their labels/dependencies, comments,
//! remote links, and sync bookkeeping. `Store` is the facade every
//! caller goes through; the per-entity modules hold the actual SQL and
//! are not meant to be reached around.

pub mod comments;
pub mod connection;
pub mod issues;
pub mod links;
pub mod milestones;
pub mod projects;
pub mod safety;
pub mod schema;
pub mod state;

use roadmap_common::SyncResult;
use roadmap_model::{FileSyncState, Issue, Milestone, Project, RemoteLink};

pub use comments::Comment;
pub use connection::Store;

impl Store {
    pub fn create_project(&self, project: &Project) -> SyncResult<()> {
        projects::create(self.conn(), project)
    }

    pub fn update_project(&self, project: &Project) -> SyncResult<bool> {
        projects::update(self.conn(), project)
    }

    pub fn get_project(&self, id: &str) -> SyncResult<Option<Project>> {
        projects::get(self.conn(), id)
    }

    pub fn list_projects(&self) -> SyncResult<Vec<Project>> {
        projects::list(self.conn())
    }

    pub fn delete_project(&self, id: &str) -> SyncResult<bool> {
        projects::delete(self.conn(), id)
    }

    pub fn create_milestone(&self, milestone: &Milestone) -> SyncResult<()> {
        milestones::create(self.conn(), milestone)
    }

    pub fn update_milestone(&self, milestone: &Milestone) -> SyncResult<bool> {
        milestones::update(self.conn(), milestone)
    }

    pub fn get_milestone(&self, id: &str) -> SyncResult<Option<Milestone>> {
        milestones::get(self.conn(), id)
    }

    pub fn get_milestone_by_name(&self, name: &str) -> SyncResult<Option<Milestone>> {
        milestones::get_by_name(self.conn(), name)
    }

    pub fn list_milestones(&self) -> SyncResult<Vec<Milestone>> {
        milestones::list(self.conn())
    }

    pub fn delete_milestone(&self, id: &str) -> SyncResult<bool> {
        milestones::delete(self.conn(), id)
    }

    pub fn create_issue(&self, issue: &Issue) -> SyncResult<()> {
        issues::create(self.conn(), issue)
    }

    pub fn update_issue(&self, issue: &Issue) -> SyncResult<bool> {
        issues::update(self.conn(), issue)
    }

    pub fn get_issue(&self, id: &str) -> SyncResult<Option<Issue>> {
        issues::get(self.conn(), id)
    }

    /// `milestone_id: None` is a pass-through returning every issue.
    pub fn list_issues(&self, milestone_id: Option<&str>) -> SyncResult<Vec<Issue>> {
        issues::list(self.conn(), milestone_id)
    }

    pub fn delete_issue(&self, id: &str) -> SyncResult<bool> {
        issues::delete(self.conn(), id)
    }

    pub fn add_comment(&self, comment: &Comment) -> SyncResult<()> {
        comments::create(self.conn(), comment)
    }

    pub fn list_comments(&self, issue_id: &str) -> SyncResult<Vec<Comment>> {
        comments::list_for_issue(self.conn(), issue_id)
    }

    pub fn upsert_remote_link(&self, link: &RemoteLink) -> SyncResult<()> {
        links::upsert(self.conn(), link)
    }

    pub fn get_remote_link(&self, local_entity_id: &str, backend_name: &str) -> SyncResult<Option<RemoteLink>> {
        links::get(self.conn(), local_entity_id, backend_name)
    }

    pub fn get_remote_link_by_remote_id(&self, backend_name: &str, remote_id: &str) -> SyncResult<Option<RemoteLink>> {
        links::get_by_remote_id(self.conn(), backend_name, remote_id)
    }

    pub fn delete_remote_link(&self, local_entity_id: &str, backend_name: &str) -> SyncResult<bool> {
        links::delete(self.conn(), local_entity_id, backend_name)
    }

    pub fn get_file_sync_state(&self, path: &str) -> SyncResult<Option<FileSyncState>> {
        links::get_file_state(self.conn(), path)
    }

    pub fn upsert_file_sync_state(&self, state: &FileSyncState) -> SyncResult<()> {
        links::upsert_file_state(self.conn(), state)
    }

    pub fn has_file_changed(&self, path: &str, current_hash: &str) -> SyncResult<bool> {
        links::has_file_changed(self.conn(), path, current_hash)
    }

    pub fn get_state(&self, key: &str) -> SyncResult<Option<String>> {
        state::get(self.conn(), key)
    }

    pub fn set_state(&self, key: &str, value: &str) -> SyncResult<()> {
        state::set(self.conn(), key, value)
    }

    /// See [`safety::is_safe_for_writes`].
    pub fn is_safe_for_writes<'a>(&self, files: impl IntoIterator<Item = (&'a str, &'a str)>) -> SyncResult<(bool, Option<String>)> {
        safety::is_safe_for_writes(self.conn(), files)
    }
}
