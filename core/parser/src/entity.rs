//! Constructs typed entities from a parsed markdown file, dispatching
//! on the managed subtree the file lives under (`issues/`, `milestones/`,
//! `projects/`, including their `archive/` mirrors).

use std::path::Path;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{Issue, IssueStatus, Milestone, MilestoneStatus, Project, ProjectStatus};
use serde_yaml::Value;

use crate::frontmatter::parse_with_body;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Issue,
    Milestone,
    Project,
}

#[derive(Debug, Clone)]
pub enum ParsedEntity {
    Issue(Issue),
    Milestone(Milestone),
    Project(Project),
}

/// Infers entity kind from the nearest `issues`/`milestones`/`projects`
/// path component, tolerating an `archive/` prefix.
pub fn infer_entity_kind(path: &Path) -> Option<EntityKind> {
    path.components().find_map(|c| match c.as_os_str().to_str() {
        Some("issues") => Some(EntityKind::Issue),
        Some("milestones") => Some(EntityKind::Milestone),
        Some("projects") => Some(EntityKind::Project),
        _ => None,
    })
}

fn schema_error(path: &Path, message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorType::SchemaMismatch, message.into()).with_entity("file", path.display().to_string())
}

fn string_field(map: &std::collections::HashMap<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn stem_id(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
}

/// Reads the file, extracts frontmatter + body, and constructs the
/// typed entity the managed subtree implies. A frontmatter block that
/// fails to parse surfaces as a `schema_mismatch` naming the path;
/// frontmatter-less files are not an error (an effectively-empty entity
/// is constructed from just the filename and body).
pub fn parse(path: &Path) -> SyncResult<ParsedEntity> {
    let kind = infer_entity_kind(path)
        .ok_or_else(|| schema_error(path, "file is not under a managed issues/milestones/projects subtree"))?;

    let (frontmatter, body) = parse_with_body(path).map_err(|msg| schema_error(path, msg))?;
    let id = string_field(&frontmatter, "id").unwrap_or_else(|| stem_id(path));

    match kind {
        EntityKind::Issue => {
            let title = string_field(&frontmatter, "title").ok_or_else(|| schema_error(path, "issue frontmatter missing title"))?;
            let status = frontmatter
                .get("status")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_value::<IssueStatus>(serde_json::Value::String(s.to_string())).ok())
                .unwrap_or(IssueStatus::Backlog);

            let mut issue = Issue::new(id, title, status).map_err(|e| schema_error(path, e.message))?;
            issue.content = body;
            issue.assignee = string_field(&frontmatter, "assignee");
            issue.milestone = string_field(&frontmatter, "milestone");
            if let Some(Value::Sequence(labels)) = frontmatter.get("labels") {
                issue.labels = labels.iter().filter_map(Value::as_str).map(str::to_string).collect();
            }
            if let Some(Value::Sequence(deps)) = frontmatter.get("depends_on") {
                issue.depends_on = deps.iter().filter_map(Value::as_str).map(str::to_string).collect();
            }
            Ok(ParsedEntity::Issue(issue))
        }
        EntityKind::Milestone => {
            let name = string_field(&frontmatter, "name")
                .or_else(|| string_field(&frontmatter, "title"))
                .ok_or_else(|| schema_error(path, "milestone frontmatter missing name"))?;
            let mut milestone = Milestone::new(id, name).map_err(|e| schema_error(path, e.message))?;
            milestone.headline = body.lines().next().unwrap_or_default().to_string();
            milestone.project = string_field(&frontmatter, "project");
            if string_field(&frontmatter, "status").as_deref() == Some("closed") {
                milestone.status = MilestoneStatus::Closed;
            }
            Ok(ParsedEntity::Milestone(milestone))
        }
        EntityKind::Project => {
            let name = string_field(&frontmatter, "name")
                .or_else(|| string_field(&frontmatter, "title"))
                .ok_or_else(|| schema_error(path, "project frontmatter missing name"))?;
            let mut project = Project::new(id, name).map_err(|e| schema_error(path, e.message))?;
            project.description = body;
            if string_field(&frontmatter, "status").as_deref() == Some("archived") {
                project.status = ProjectStatus::Archived;
            }
            Ok(ParsedEntity::Project(project))
        }
    }
}
