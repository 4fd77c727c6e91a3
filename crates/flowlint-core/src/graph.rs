use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::{Job, WorkflowDocument};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

/// How one job depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Explicit `needs:` declaration.
    Needs,
    /// Inferred from matching upload/download artifact names.
    Artifact,
    /// Inferred from a `needs.<job>.outputs.*` expression.
    Output,
    /// Inferred from a `needs.<job>` reference in an env value.
    Env,
}

/// A directed dependency edge between two jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub detail: Option<String>,
}

/// One `uses:` reference, recorded per originating job and step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionUsage {
    pub action: String,
    pub version: String,
    pub job: String,
    pub step: usize,
}

/// The derived job dependency structure of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphData {
    pub job_dependencies: Vec<JobEdge>,
    pub action_usage: Vec<ActionUsage>,
    /// Jobs grouped by topological level; jobs in one level can start
    /// together once the previous level completes.
    pub levels: Vec<Vec<String>>,
    /// Longest dependency chains, source to sink.
    pub critical_paths: Vec<Vec<String>>,
    /// Jobs with no incoming or outgoing edges.
    pub isolated_jobs: Vec<String>,
    /// Members of `needs` cycles, if any.
    pub cycles: Vec<Vec<String>>,
}

fn outputs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"needs\.([A-Za-z0-9_-]+)\.outputs").unwrap())
}

fn env_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"needs\.([A-Za-z0-9_-]+)\.result").unwrap())
}

/// Build the call graph. Graph inconsistencies (dangling `needs`, cycles)
/// become `structure` findings instead of errors.
pub fn build(doc: &WorkflowDocument, file_name: &str) -> (CallGraphData, Vec<Finding>) {
    let mut findings = Vec::new();
    let mut graph: DiGraph<String, EdgeKind> = DiGraph::new();
    let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

    for job_id in doc.jobs.keys() {
        let idx = graph.add_node(job_id.clone());
        node_map.insert(job_id.clone(), idx);
    }

    let mut edges: Vec<JobEdge> = Vec::new();
    let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
    let mut add_edge = |graph: &mut DiGraph<String, EdgeKind>,
                        edges: &mut Vec<JobEdge>,
                        from: &str,
                        to: &str,
                        kind: EdgeKind,
                        detail: Option<String>| {
        if from == to {
            return;
        }
        if !seen.insert((from.to_string(), to.to_string(), kind)) {
            return;
        }
        graph.add_edge(node_map[from], node_map[to], kind);
        edges.push(JobEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            detail,
        });
    };

    // Explicit needs edges; dangling targets are recorded, not fatal.
    for (job_id, job) in &doc.jobs {
        for target in &job.needs {
            if doc.jobs.contains_key(target) {
                add_edge(&mut graph, &mut edges, target, job_id, EdgeKind::Needs, None);
            } else {
                findings.push(
                    Finding::new(
                        FindingKind::Structure,
                        Severity::Warning,
                        format!("job '{job_id}' needs unknown job '{target}'"),
                        format!(
                            "The `needs` list of job '{job_id}' references '{target}', \
                             which is not defined in this workflow."
                        ),
                        file_name,
                    )
                    .at(Location::job(job_id, job.line))
                    .suggest(format!("Remove '{target}' from `needs` or define the job.")),
                );
            }
        }
    }

    // Inferred output/env edges from expression references.
    for (job_id, job) in &doc.jobs {
        for referenced in expression_refs(job, outputs_re()) {
            if doc.jobs.contains_key(&referenced) {
                add_edge(
                    &mut graph,
                    &mut edges,
                    &referenced,
                    job_id,
                    EdgeKind::Output,
                    Some(format!("consumes outputs of '{referenced}'")),
                );
            }
        }
        for referenced in expression_refs(job, env_ref_re()) {
            if doc.jobs.contains_key(&referenced) {
                add_edge(
                    &mut graph,
                    &mut edges,
                    &referenced,
                    job_id,
                    EdgeKind::Env,
                    Some(format!("reads result of '{referenced}'")),
                );
            }
        }
    }

    // Inferred artifact edges from matching upload/download names.
    let uploads = artifact_steps(doc, "actions/upload-artifact");
    let downloads = artifact_steps(doc, "actions/download-artifact");
    for (down_job, down_name) in &downloads {
        for (up_job, up_name) in &uploads {
            // A download without a name pulls every artifact.
            let matches = down_name.is_none() || down_name == up_name;
            if matches && up_job != down_job {
                let label = up_name.clone().unwrap_or_else(|| "artifact".to_string());
                add_edge(
                    &mut graph,
                    &mut edges,
                    up_job,
                    down_job,
                    EdgeKind::Artifact,
                    Some(format!("artifact '{label}'")),
                );
            }
        }
    }

    let action_usage = collect_action_usage(doc);

    // Kahn's algorithm: topological levels plus cycle detection. Nodes left
    // unprocessed after the queue drains are cycle members.
    let (levels, topo_order, cycle_members) = kahn_levels(&graph, doc);
    let mut cycles = Vec::new();
    if !cycle_members.is_empty() {
        cycles.push(cycle_members.clone());
        findings.push(
            Finding::new(
                FindingKind::Structure,
                Severity::Error,
                "circular job dependency",
                format!(
                    "Jobs {} form a `needs` cycle and can never start.",
                    cycle_members
                        .iter()
                        .map(|id| format!("'{id}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                file_name,
            )
            .at(Location {
                job: cycle_members.first().cloned(),
                step: None,
                line: cycle_members
                    .first()
                    .and_then(|id| doc.jobs.get(id))
                    .map(|j| j.line),
            })
            .suggest("Break the cycle by removing one of the `needs` entries."),
        );
    }

    let critical_paths = critical_paths(&graph, &topo_order);

    let isolated_jobs = doc
        .jobs
        .keys()
        .filter(|id| {
            let idx = node_map[*id];
            graph.neighbors_directed(idx, Direction::Incoming).count() == 0
                && graph.neighbors_directed(idx, Direction::Outgoing).count() == 0
        })
        .cloned()
        .collect();

    (
        CallGraphData {
            job_dependencies: edges,
            action_usage,
            levels,
            critical_paths,
            isolated_jobs,
            cycles,
        },
        findings,
    )
}

/// Jobs referenced by expression patterns in a job's steps and env.
fn expression_refs(job: &Job, re: &Regex) -> Vec<String> {
    let mut refs = Vec::new();
    let mut scan = |text: &str| {
        for caps in re.captures_iter(text) {
            let id = caps[1].to_string();
            if !refs.contains(&id) {
                refs.push(id);
            }
        }
    };
    for value in job.env.values() {
        scan(value);
    }
    if let Some(cond) = &job.condition {
        scan(cond);
    }
    for step in &job.steps {
        if let Some(run) = &step.run {
            scan(run);
        }
        for value in step.with.values().chain(step.env.values()) {
            scan(value);
        }
    }
    refs
}

/// (job, artifact name) pairs for upload or download steps.
fn artifact_steps(doc: &WorkflowDocument, action: &str) -> Vec<(String, Option<String>)> {
    let mut result = Vec::new();
    for (job_id, job) in &doc.jobs {
        for step in &job.steps {
            let Some(uses) = &step.uses else { continue };
            if uses.slug() == action {
                result.push((job_id.clone(), step.with.get("name").cloned()));
            }
        }
    }
    result
}

fn collect_action_usage(doc: &WorkflowDocument) -> Vec<ActionUsage> {
    let mut usage = Vec::new();
    for (job_id, job) in &doc.jobs {
        for (i, step) in job.steps.iter().enumerate() {
            if let Some(uses) = &step.uses {
                if !uses.is_pinnable() {
                    continue;
                }
                usage.push(ActionUsage {
                    action: uses.slug(),
                    version: uses.reference.clone(),
                    job: job_id.clone(),
                    step: i,
                });
            }
        }
    }
    usage
}

/// Zero-in-degree queue processing. Returns the level partition, the full
/// topological order of processed nodes, and any unprocessed (cyclic) jobs
/// in source order.
fn kahn_levels(
    graph: &DiGraph<String, EdgeKind>,
    doc: &WorkflowDocument,
) -> (Vec<Vec<String>>, Vec<NodeIndex>, Vec<String>) {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|idx| in_degree[idx] == 0)
        .collect();

    let mut levels = Vec::new();
    let mut topo_order = Vec::new();
    let mut processed: HashSet<NodeIndex> = HashSet::new();

    while !queue.is_empty() {
        let mut level: Vec<String> = Vec::new();
        let mut next: VecDeque<NodeIndex> = VecDeque::new();
        while let Some(idx) = queue.pop_front() {
            level.push(graph[idx].clone());
            topo_order.push(idx);
            processed.insert(idx);
            for succ in graph.neighbors_directed(idx, Direction::Outgoing) {
                let d = in_degree.get_mut(&succ).unwrap();
                *d -= 1;
                if *d == 0 {
                    next.push_back(succ);
                }
            }
        }
        level.sort();
        levels.push(level);
        queue = next;
    }

    let cycle_members = doc
        .jobs
        .keys()
        .filter(|id| {
            graph
                .node_indices()
                .find(|idx| &graph[*idx] == *id)
                .is_some_and(|idx| !processed.contains(&idx))
        })
        .cloned()
        .collect();

    (levels, topo_order, cycle_members)
}

/// Longest node-weighted paths over the acyclic portion via DAG dynamic
/// programming. Ties are broken by lexical job-id order.
fn critical_paths(graph: &DiGraph<String, EdgeKind>, topo_order: &[NodeIndex]) -> Vec<Vec<String>> {
    let mut dist: HashMap<NodeIndex, usize> = HashMap::new();
    let mut best_pred: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for &node in topo_order {
        let mut longest = 1usize;
        let mut pred: Option<NodeIndex> = None;
        for p in graph.neighbors_directed(node, Direction::Incoming) {
            let Some(&pd) = dist.get(&p) else { continue };
            let candidate = pd + 1;
            let better = candidate > longest
                || (candidate == longest
                    && pred.is_some_and(|cur| graph[p] < graph[cur]));
            if better {
                longest = candidate;
                pred = Some(p);
            }
        }
        dist.insert(node, longest);
        if let Some(p) = pred {
            best_pred.insert(node, p);
        }
    }

    let max_len = dist.values().copied().max().unwrap_or(0);
    // A chain needs at least two jobs; a dependency-free workflow has no
    // critical path.
    if max_len < 2 {
        return Vec::new();
    }

    let mut paths: Vec<Vec<String>> = Vec::new();
    for &node in topo_order {
        if dist[&node] != max_len {
            continue;
        }
        if graph.neighbors_directed(node, Direction::Outgoing).count() != 0 {
            continue;
        }
        let mut path = vec![graph[node].clone()];
        let mut current = node;
        while let Some(&p) = best_pred.get(&current) {
            path.push(graph[p].clone());
            current = p;
        }
        path.reverse();
        paths.push(path);
    }
    paths.sort();
    paths
}
