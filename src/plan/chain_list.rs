//! Line-based chain definitions
//!
//! Each line declares one node whose id is its engine name:
//!
//! ```text
//! metaxa
//! langdetect;dependsOn=metaxa
//! ner;dependsOn=langdetect
//! zemanta;optional
//! geonames;optional;dependsOn=ner
//! refactor;dependsOn=geonames,zemanta
//! ```

use super::graph::{ExecutionPlanGraph, PlanError};
use super::node::ExecutionNode;

const DEPENDS_ON: &str = "dependsOn";
const OPTIONAL: &str = "optional";

/// Parse a single `<engine>[;<param>[=<v1>,<v2>]]*` line.
pub fn parse_chain_line(line: &str) -> Result<ExecutionNode, PlanError> {
    let syntax = |reason: &str| PlanError::Syntax {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = line.split(';').map(str::trim);
    let engine = parts.next().unwrap_or_default();
    if engine.is_empty() {
        return Err(syntax("missing engine name"));
    }

    let mut node = ExecutionNode::for_engine(engine);
    for param in parts.filter(|p| !p.is_empty()) {
        let (key, value) = match param.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (param, None),
        };
        match key {
            DEPENDS_ON => {
                let deps = value.ok_or_else(|| syntax("dependsOn requires at least one engine"))?;
                for dep in deps.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                    node = node.depends_on(dep);
                }
                if node.depends_on.is_empty() {
                    return Err(syntax("dependsOn requires at least one engine"));
                }
            }
            OPTIONAL => {
                let optional = match value {
                    None | Some("") => true,
                    Some(v) if v.eq_ignore_ascii_case("true") => true,
                    Some(v) if v.eq_ignore_ascii_case("false") => false,
                    Some(_) => return Err(syntax("optional must be 'true' or 'false'")),
                };
                node = node.with_optional(optional);
            }
            other => {
                tracing::debug!(engine, parameter = other, "ignoring unknown chain parameter");
            }
        }
    }
    Ok(node)
}

/// Parse a list of chain lines into a validated plan.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_chain_list<I, S>(name: &str, lines: I) -> Result<ExecutionPlanGraph, PlanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let nodes = lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            (!line.is_empty() && !line.starts_with('#')).then(|| parse_chain_line(line))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if nodes.is_empty() {
        return Err(PlanError::EmptyPlan(name.to_string()));
    }
    ExecutionPlanGraph::new(name, nodes)
}
