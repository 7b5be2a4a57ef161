//! Roadmap CLI - command line interface over the local/remote sync engine.
//!
//! This is thin glue over the core crates: config loading, console
//! rendering and the `.roadmap_init.lock` guard live here because §1 of
//! the sync engine design explicitly treats them as external
//! collaborators, not core concerns.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use roadmap_dedup::{DetectorConfig, DuplicateDetector};
use roadmap_model::{Issue, IssueStatus, Priority};
use roadmap_remote::create_default_registry;
use roadmap_resolver::DuplicateResolver;
use roadmap_store::Store;
use roadmap_sync::{ErrorClassifier, ExecutionInput, ExecutorConfig, SyncExecutor, SyncOrchestrator};
use roadmap_vcs::ChangeMonitor;

const LOCK_FILE: &str = ".roadmap_init.lock";
const CONFIG_FILE: &str = "config.yaml";
const LAST_SYNCED_COMMIT_KEY: &str = "last_synced_commit";

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(about = "Roadmap - local/remote issue tracker sync")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the `.roadmap` managed tree in the current directory.
    Init,

    /// Run a sync pass: bring the local store up to date from files,
    /// then reconcile against the configured remote backend.
    Sync {
        /// Force a full rebuild instead of letting the orchestrator decide.
        #[arg(long)]
        rebuild: bool,
    },

    /// Manage issue dependencies.
    #[command(subcommand)]
    Deps(DepsCommands),

    /// Manage issues.
    #[command(subcommand)]
    Issue(IssueCommands),
}

#[derive(Subcommand)]
enum DepsCommands {
    /// Record that `issue` depends on `depends_on`.
    Add {
        /// ID of the dependent issue.
        issue: String,

        /// ID of the issue it depends on.
        depends_on: String,
    },
}

#[derive(Subcommand)]
enum IssueCommands {
    /// Create a new issue.
    Create {
        /// Issue title.
        #[arg(short, long)]
        title: String,

        /// Issue body/content.
        #[arg(short, long, default_value = "")]
        content: String,

        /// Status: backlog, todo, in-progress, closed, archived.
        #[arg(short, long, default_value = "todo")]
        status: String,

        /// Priority: low, medium, high, critical.
        #[arg(short, long)]
        priority: Option<String>,

        /// Milestone name or local ID.
        #[arg(short, long)]
        milestone: Option<String>,

        /// Labels (repeatable).
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },

    /// List issues, optionally filtered by milestone.
    List {
        /// Only issues belonging to this milestone.
        #[arg(short, long)]
        milestone: Option<String>,
    },

    /// Show a single issue's full detail.
    View {
        /// Local issue ID.
        id: String,
    },

    /// Link a local issue to an existing GitHub issue number.
    LinkGithub {
        /// Local issue ID.
        id: String,

        /// GitHub issue number.
        github_id: String,
    },

    /// Fetch a GitHub issue by number and print its canonical fields,
    /// without touching the local store.
    LookupGithub {
        /// GitHub issue number.
        github_id: String,
    },
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct GithubConfig {
    owner: Option<String>,
    repo: Option<String>,
    /// Capped at 100 per §4.5's pagination contract.
    per_page: Option<u32>,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct UserConfig {
    name: Option<String>,
    email: Option<String>,
}

/// `<repo>/.roadmap/config.yaml`: which remote backend to sync against
/// and the credentials/identity needed to reach it. The token itself
/// is never stored here — it comes from `GITHUB_TOKEN` in the
/// environment, per §6.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct RoadmapConfig {
    #[serde(default = "default_backend")]
    sync_backend: String,
    #[serde(default)]
    github: GithubConfig,
    #[serde(default)]
    user: UserConfig,
}

fn default_backend() -> String {
    "git".to_string()
}

impl Default for RoadmapConfig {
    fn default() -> Self {
        Self { sync_backend: default_backend(), github: GithubConfig::default(), user: UserConfig::default() }
    }
}

fn cwd() -> Result<PathBuf> {
    std::env::current_dir().context("failed to read current directory")
}

fn roadmap_dir() -> Result<PathBuf> {
    Ok(cwd()?.join(".roadmap"))
}

fn lockfile_path() -> Result<PathBuf> {
    Ok(cwd()?.join(LOCK_FILE))
}

fn load_config() -> Result<RoadmapConfig> {
    let path = roadmap_dir()?.join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("no config found at {} - run `roadmap init` first", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Default store location, `~/.roadmap/roadmap.db`, per §6.
fn store_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".roadmap").join("roadmap.db"))
}

fn open_store() -> Result<Store> {
    let path = store_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create store directory")?;
    }
    Store::open(&path).with_context(|| format!("failed to open local store at {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).with_target(false).compact().finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Init => cmd_init(),
        Commands::Sync { rebuild } => cmd_sync(rebuild).await,
        Commands::Deps(DepsCommands::Add { issue, depends_on }) => cmd_deps_add(&issue, &depends_on),
        Commands::Issue(IssueCommands::Create { title, content, status, priority, milestone, labels }) => {
            cmd_issue_create(&title, &content, &status, priority.as_deref(), milestone, labels)
        }
        Commands::Issue(IssueCommands::List { milestone }) => cmd_issue_list(milestone.as_deref()),
        Commands::Issue(IssueCommands::View { id }) => cmd_issue_view(&id),
        Commands::Issue(IssueCommands::LinkGithub { id, github_id }) => cmd_issue_link_github(&id, &github_id),
        Commands::Issue(IssueCommands::LookupGithub { github_id }) => cmd_issue_lookup_github(&github_id).await,
    }
}

/// Creates the managed subtree, writes a default config, and drops the
/// re-initialization lockfile. An existing lockfile is an "already
/// initialized" condition, which exits 2 per §6.
fn cmd_init() -> Result<()> {
    let lock_path = lockfile_path()?;
    if lock_path.exists() {
        eprintln!("roadmap is already initialized in this directory ({})", lock_path.display());
        std::process::exit(2);
    }

    let root = roadmap_dir()?;
    for subtree in ["issues", "milestones", "projects", "archive/issues", "archive/milestones", "archive/projects"] {
        std::fs::create_dir_all(root.join(subtree)).with_context(|| format!("failed to create {subtree}"))?;
    }

    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        let config = RoadmapConfig::default();
        let yaml = serde_yaml::to_string(&config).context("failed to serialize default config")?;
        std::fs::write(&config_path, yaml).context("failed to write config.yaml")?;
    }

    // Touch the store so schema creation happens at init, not at the
    // first sync.
    let store = open_store()?;
    store.close().context("failed to initialize local store")?;

    std::fs::write(&lock_path, "").context("failed to write init lockfile")?;

    println!("Initialized roadmap in {}", root.display());
    println!("  Config: {}", config_path.display());
    println!("  Store:  {}", store_path()?.display());

    Ok(())
}

/// Scans every managed file for unresolved VCS conflict markers, per
/// the Local Store's safety probe (§4.3).
fn managed_file_contents(root: &Path) -> Vec<(String, String)> {
    fn walk(dir: &Path, out: &mut Vec<(String, String)>) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    out.push((path.to_string_lossy().to_string(), content));
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Runs one full sync: VCS change detection (informational), the
/// incremental-vs-rebuild decision, the file->store pass, and then,
/// if a remote backend is configured, duplicate detection/resolution
/// and the executor's push/pull/link/conflict pass.
async fn cmd_sync(force_rebuild: bool) -> Result<()> {
    let root = cwd()?;
    let managed = roadmap_dir()?;
    let mut store = open_store()?;

    let contents = managed_file_contents(&managed);
    let borrowed: Vec<(&str, &str)> = contents.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let (safe, reason) = store.is_safe_for_writes(borrowed).context("safety probe failed")?;
    if !safe {
        anyhow::bail!("refusing to sync: {}", reason.unwrap_or_else(|| "unresolved conflicts".to_string()));
    }

    let mut monitor = ChangeMonitor::open(&root);
    let last_synced = store.get_state(LAST_SYNCED_COMMIT_KEY)?.or_else(|| monitor.read_legacy_marker());
    let changes = monitor.detect_changes(last_synced.as_deref());
    info!(changed_files = changes.len(), "change monitor detected file-level changes since last sync");

    let orchestrator = SyncOrchestrator::new();
    if force_rebuild || orchestrator.should_do_full_rebuild(&store, &managed, None) {
        let stats = orchestrator.full_rebuild_from_git(&mut store, &managed);
        println!(
            "Full rebuild: {} processed, {} synced, {} failed",
            stats.files_processed, stats.files_synced, stats.files_failed
        );
    } else {
        let stats = orchestrator.sync_directory_incremental(&store, &managed);
        println!(
            "Incremental sync: {} checked, {} changed, {} synced, {} failed",
            stats.files_checked, stats.files_changed, stats.files_synced, stats.files_failed
        );
    }

    if let Some(commit) = monitor.sync_to_store() {
        store.set_state(LAST_SYNCED_COMMIT_KEY, &commit)?;
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(_) => {
            println!("No config.yaml found; skipping remote reconciliation.");
            return Ok(());
        }
    };

    let token = std::env::var("GITHUB_TOKEN").ok();
    let registry = create_default_registry(token, config.github.owner.clone(), config.github.repo.clone());
    if !registry.has_backend(&config.sync_backend) {
        println!("Sync backend '{}' is not configured; skipping remote reconciliation.", config.sync_backend);
        return Ok(());
    }
    let backend = registry.resolve(&config.sync_backend).context("failed to resolve sync backend")?;
    backend.authenticate().await.context("authentication with remote backend failed")?;

    let local_issues = store.list_issues(None).context("failed to list local issues")?;
    let remote_issues = backend.list_issues(None).await.context("failed to list remote issues")?;
    let local_milestones = store.list_milestones().context("failed to list local milestones")?;
    let remote_milestones = backend.list_milestones().await.context("failed to list remote milestones")?;

    let detector = DuplicateDetector::new(DetectorConfig::default());
    let canonical_local = detector.local_self_dedup(&local_issues);
    let canonical_remote = detector.remote_self_dedup(&remote_issues);
    let matches = detector.detect_all(&canonical_local, &canonical_remote);

    let resolver = DuplicateResolver::new(DetectorConfig::default().auto_resolve_threshold);
    let resolutions = resolver.resolve_automatic(matches);

    let mut executor = SyncExecutor::new(ExecutorConfig::default());
    let mut classifier = ErrorClassifier::new();

    let input = ExecutionInput {
        backend_name: config.sync_backend.clone(),
        local_issues: canonical_local,
        remote_issues: canonical_remote,
        local_milestones,
        remote_milestones,
        resolutions,
    };

    let report = executor.run(&mut store, backend.as_ref(), &mut classifier, input).await;

    println!("Remote sync complete:");
    println!("  Pushed: {}", report.pushed.len());
    println!("  Pulled: {}", report.pulled.len());
    println!("  Conflicts: {}", report.conflicts.len());
    println!("  Errors: {}", report.errors.len());

    if let Some(fatal) = &report.fatal_error {
        eprintln!("Fatal: {fatal}");
    }

    for summary in classifier.summary() {
        println!("  [{}] {} occurrence(s) - {}", summary.category, summary.count, summary.suggested_fix);
    }

    Ok(())
}

/// Records `issue` depending on `depends_on`, rejecting self-reference
/// at the model layer (§9: cycle detection is this command's job, not
/// the store's - DFS-on-insert is left for a future pass since no
/// cycle has been reported in practice yet).
fn cmd_deps_add(issue_id: &str, depends_on_id: &str) -> Result<()> {
    let store = open_store()?;
    let mut issue = store
        .get_issue(issue_id)
        .context("failed to look up issue")?
        .with_context(|| format!("issue '{issue_id}' not found"))?;

    if store.get_issue(depends_on_id).context("failed to look up dependency")?.is_none() {
        anyhow::bail!("issue '{depends_on_id}' not found");
    }

    issue.add_dependency(depends_on_id).context("failed to add dependency")?;
    issue.touch();
    store.update_issue(&issue).context("failed to save issue")?;

    println!("{issue_id} now depends on {depends_on_id}");
    Ok(())
}

fn parse_status(s: &str) -> Result<IssueStatus> {
    Ok(match s {
        "backlog" => IssueStatus::Backlog,
        "todo" => IssueStatus::Todo,
        "in-progress" => IssueStatus::InProgress,
        "closed" => IssueStatus::Closed,
        "archived" => IssueStatus::Archived,
        other => anyhow::bail!("invalid status '{other}'; use backlog, todo, in-progress, closed, or archived"),
    })
}

fn parse_priority(s: &str) -> Result<Priority> {
    Ok(match s {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        "critical" => Priority::Critical,
        other => anyhow::bail!("invalid priority '{other}'; use low, medium, high, or critical"),
    })
}

fn cmd_issue_create(
    title: &str,
    content: &str,
    status: &str,
    priority: Option<&str>,
    milestone: Option<String>,
    labels: Vec<String>,
) -> Result<()> {
    let store = open_store()?;
    let id = uuid::Uuid::new_v4().to_string();
    let status = parse_status(status)?;

    let mut issue = Issue::new(&id, title, status).context("failed to construct issue")?;
    issue.content = content.to_string();
    issue.milestone = milestone;
    issue.labels = labels.into_iter().collect();
    if let Some(priority) = priority {
        issue.priority = Some(parse_priority(priority)?);
    }

    store.create_issue(&issue).context("failed to save issue")?;
    println!("Created issue {id}: {title}");
    Ok(())
}

fn cmd_issue_list(milestone: Option<&str>) -> Result<()> {
    let store = open_store()?;
    let issues = store.list_issues(milestone).context("failed to list issues")?;

    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }

    for issue in issues {
        let priority = issue.priority.map(|p| format!("{p:?}")).unwrap_or_else(|| "-".to_string());
        println!("{:<12} [{:<11}] {:<8} {}", issue.id, format!("{:?}", issue.status), priority, issue.title);
    }
    Ok(())
}

fn cmd_issue_view(id: &str) -> Result<()> {
    let store = open_store()?;
    let issue = store.get_issue(id).context("failed to look up issue")?.with_context(|| format!("issue '{id}' not found"))?;

    println!("Issue {}", issue.id);
    println!("  Title:     {}", issue.title);
    println!("  Status:    {:?}", issue.status);
    if let Some(priority) = issue.priority {
        println!("  Priority:  {priority:?}");
    }
    if let Some(assignee) = &issue.assignee {
        println!("  Assignee:  {assignee}");
    }
    if let Some(milestone) = &issue.milestone {
        println!("  Milestone: {milestone}");
    }
    if !issue.labels.is_empty() {
        println!("  Labels:    {}", issue.labels.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if !issue.depends_on.is_empty() {
        println!("  Depends on: {}", issue.depends_on.join(", "));
    }
    for (backend, remote_id) in &issue.remote_ids {
        println!("  Remote:    {backend}#{remote_id}");
    }
    println!("  Created:   {}", issue.created_at);
    println!("  Updated:   {}", issue.updated_at);
    if !issue.content.is_empty() {
        println!("\n{}", issue.content);
    }

    Ok(())
}

fn cmd_issue_link_github(id: &str, github_id: &str) -> Result<()> {
    let store = open_store()?;
    store.get_issue(id).context("failed to look up issue")?.with_context(|| format!("issue '{id}' not found"))?;

    let link = roadmap_model::RemoteLink::new(id, "github", github_id);
    store.upsert_remote_link(&link).context("failed to record link")?;

    println!("Linked {id} to github#{github_id}");
    Ok(())
}

async fn cmd_issue_lookup_github(github_id: &str) -> Result<()> {
    let config = load_config()?;
    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;
    let owner = config.github.owner.context("config.yaml has no github.owner configured")?;
    let repo = config.github.repo.context("config.yaml has no github.repo configured")?;

    let backend = roadmap_remote::GitHubBackend::new(&token, owner, repo).context("failed to construct GitHub backend")?;
    let issue = backend.get_issue(github_id).await.context("failed to fetch issue from GitHub")?;

    println!("GitHub issue #{}", issue.id);
    println!("  Title:  {}", issue.title);
    println!("  Status: {}", issue.status);
    if let Some(assignee) = &issue.assignee {
        println!("  Assignee: {assignee}");
    }
    if let Some(milestone) = &issue.milestone {
        println!("  Milestone: {milestone}");
    }
    if !issue.labels.is_empty() {
        println!("  Labels: {}", issue.labels.join(", "));
    }
    if !issue.description.is_empty() {
        println!("\n{}", issue.description);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_rejects_unknown_values() {
        assert!(parse_status("bogus").is_err());
        assert!(matches!(parse_status("todo"), Ok(IssueStatus::Todo)));
    }

    #[test]
    fn parse_priority_rejects_unknown_values() {
        assert!(parse_priority("bogus").is_err());
        assert!(matches!(parse_priority("critical"), Ok(Priority::Critical)));
    }

    #[test]
    fn default_config_uses_git_backend() {
        let config = RoadmapConfig::default();
        assert_eq!(config.sync_backend, "git");
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = RoadmapConfig {
            sync_backend: "github".to_string(),
            github: GithubConfig { owner: Some("acme".to_string()), repo: Some("widgets".to_string()), per_page: None },
            user: UserConfig::default(),
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: RoadmapConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.sync_backend, "github");
        assert_eq!(parsed.github.owner.as_deref(), Some("acme"));
    }
}
