//! Discovery of child pathnames from traversed switches.

use std::sync::Arc;

use crate::routing::pattern::Pattern;
use crate::routing::url::join_pathname;
use crate::routing::{MatcherNode, RawParams};

/// Supplies concrete parameter sets for parameterized child patterns, which
/// the crawler cannot enumerate on its own.
///
/// `mount` is the canonical pathname of the switch owning `pattern`. Each
/// returned set is formatted with [`Pattern::format`]; sets that do not fit
/// the pattern are logged and skipped.
pub trait PatternExpander: Send + Sync {
    fn expand(&self, mount: &str, pattern: &Pattern) -> Vec<RawParams>;
}

impl<F> PatternExpander for F
where
    F: Fn(&str, &Pattern) -> Vec<RawParams> + Send + Sync,
{
    fn expand(&self, mount: &str, pattern: &Pattern) -> Vec<RawParams> {
        self(mount, pattern)
    }
}

/// Canonical pathnames of every enumerable child of the switch at `mount`.
pub(crate) fn child_pathnames(
    mount: &str,
    node: &MatcherNode,
    expander: Option<&Arc<dyn PatternExpander>>,
) -> Vec<String> {
    let MatcherNode::Switch(switch) = node else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (pattern, _) in switch.children() {
        if pattern.is_static() {
            if let Ok(suffix) = pattern.format(&RawParams::new()) {
                found.push(join_pathname(mount, &suffix));
            }
            continue;
        }

        let Some(expander) = expander else {
            continue;
        };
        for params in expander.expand(mount, pattern) {
            match pattern.format(&params) {
                Ok(suffix) => found.push(join_pathname(mount, &suffix)),
                Err(e) => {
                    tracing::warn!(
                        mount = %mount,
                        pattern = %pattern,
                        error = %e,
                        "Expanded parameters rejected"
                    );
                }
            }
        }
    }
    found
}
