use serde::Deserialize;

/// What the scheduler does once a node fails.
///
/// - `FailFast`: stop issuing new work after the first failure; nodes that
///   are already running are allowed to finish.
/// - `Continue`: keep issuing work for every branch that does not depend on
///   the failed node. Dependents of the failure are skipped either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Continue,
}

/// How the scheduler picks among several simultaneously ready nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingOrder {
    /// Lowest ordering key (declaration order) first.
    #[default]
    Declaration,
    /// Nodes with the most transitive dependents first, ties broken by
    /// ordering key. Tends to start the critical path earlier.
    MostDependents,
}
