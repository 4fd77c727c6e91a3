use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which CI system a workflow file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    GithubActions,
    GitlabCi,
}

impl Dialect {
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::GithubActions => "github-actions",
            Dialect::GitlabCi => "gitlab-ci",
        }
    }

    /// Guess the dialect from a file name. `.gitlab-ci.yml` and variants map
    /// to GitLab, everything else defaults to GitHub Actions.
    pub fn from_file_name(file_name: &str) -> Self {
        let base = file_name.rsplit('/').next().unwrap_or(file_name);
        if base.contains("gitlab-ci") {
            Dialect::GitlabCi
        } else {
            Dialect::GithubActions
        }
    }
}

/// The raw trigger spec. GitHub's `on:` field can be a string, a list, or a
/// map with per-event configuration; the variants keep that shape at the
/// boundary so downstream code works off the normalized `events()` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerSpec {
    None,
    Single(String),
    List(Vec<String>),
    Map(IndexMap<String, serde_yaml::Value>),
}

impl TriggerSpec {
    /// Flatten into a plain list of event names.
    pub fn events(&self) -> Vec<String> {
        match self {
            TriggerSpec::None => Vec::new(),
            TriggerSpec::Single(e) => vec![e.clone()],
            TriggerSpec::List(events) => events.clone(),
            TriggerSpec::Map(map) => map.keys().cloned().collect(),
        }
    }

    pub fn contains(&self, event: &str) -> bool {
        match self {
            TriggerSpec::None => false,
            TriggerSpec::Single(e) => e == event,
            TriggerSpec::List(events) => events.iter().any(|e| e == event),
            TriggerSpec::Map(map) => map.contains_key(event),
        }
    }
}

impl Default for TriggerSpec {
    fn default() -> Self {
        TriggerSpec::None
    }
}

/// Workflow or job `permissions` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Permissions {
    WriteAll,
    ReadAll,
    Disabled,
    Scoped(IndexMap<String, String>),
}

impl Permissions {
    pub fn is_write_all(&self) -> bool {
        matches!(self, Permissions::WriteAll)
    }

    pub fn grants_write(&self, scope: &str) -> bool {
        match self {
            Permissions::WriteAll => true,
            Permissions::ReadAll | Permissions::Disabled => false,
            Permissions::Scoped(map) => map.get(scope).is_some_and(|v| v == "write"),
        }
    }
}

/// Reference to an external action in `owner/repo[/path]@ref` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRef {
    pub raw: String,
    pub owner: String,
    pub repo: String,
    pub subpath: Option<String>,
    pub reference: String,
}

impl ActionRef {
    pub fn parse(raw: &str) -> Self {
        let (name, reference) = match raw.rsplit_once('@') {
            Some((n, r)) => (n, r.to_string()),
            None => (raw, String::new()),
        };
        let mut parts = name.splitn(3, '/');
        let owner = parts.next().unwrap_or_default().to_string();
        let repo = parts.next().unwrap_or_default().to_string();
        let subpath = parts.next().map(String::from);
        ActionRef {
            raw: raw.to_string(),
            owner,
            repo,
            subpath,
            reference,
        }
    }

    /// `owner/repo` without the ref or subpath.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// True if the ref is a full 40-character commit SHA.
    pub fn is_sha_pinned(&self) -> bool {
        self.reference.len() == 40
            && self.reference.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Local actions (`./path`) and docker images are not pinnable refs.
    pub fn is_pinnable(&self) -> bool {
        !self.raw.starts_with("./") && !self.raw.starts_with("docker://")
    }
}

/// A single step within a job. `uses` and `run` are mutually exclusive in
/// practice, and both may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub uses: Option<ActionRef>,
    pub run: Option<String>,
    pub with: IndexMap<String, String>,
    pub env: IndexMap<String, String>,
    pub condition: Option<String>,
    /// 1-based source line of the step's opening key.
    pub line: usize,
}

/// A job in the canonical model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub name: Option<String>,
    pub runs_on: Vec<String>,
    /// Raw `needs` targets. Dangling ids are kept as written; the call
    /// graph builder reports them instead of failing here.
    pub needs: Vec<String>,
    pub steps: Vec<Step>,
    pub permissions: Option<Permissions>,
    pub env: IndexMap<String, String>,
    pub condition: Option<String>,
    pub concurrency_group: Option<String>,
    pub timeout_minutes: Option<u64>,
    /// 1-based source line of the job's defining key.
    pub line: usize,
}

/// The canonical, dialect-independent workflow representation.
///
/// Job iteration order is insertion order from the source file, which keeps
/// line-number reporting deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub name: String,
    pub dialect: Dialect,
    pub triggers: TriggerSpec,
    pub permissions: Option<Permissions>,
    pub env: IndexMap<String, String>,
    pub jobs: IndexMap<String, Job>,
}

impl WorkflowDocument {
    pub fn new(name: String, dialect: Dialect) -> Self {
        Self {
            name,
            dialect,
            triggers: TriggerSpec::None,
            permissions: None,
            env: IndexMap::new(),
            jobs: IndexMap::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn step_count(&self) -> usize {
        self.jobs.values().map(|j| j.steps.len()).sum()
    }
}
