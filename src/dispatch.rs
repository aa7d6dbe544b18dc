//! Rule registry: which handler runs for which node.

use tracing::debug;

use crate::convert::Session;
use crate::document::Element;
use crate::error::Result;
use crate::path::{NodePath, Pattern};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What a handler did with the node it was given
pub enum Outcome {
    /// Handled, descend into the children
    Handled,
    /// Handled, including everything below this node
    Consumed,
    /// Nothing produced, and nothing below this node is visited either
    Skipped,
    /// This handler declines, the next candidate rule runs instead. If no
    /// candidate is left the node is treated as unmatched.
    DeferToDefault,
}

impl Outcome {
    /// Whether the traversal visits the children of the node
    pub fn descends(&self) -> bool {
        matches!(self, Self::Handled | Self::DeferToDefault)
    }
}

pub type Handler = Box<dyn Fn(&Element, &mut Session) -> Result<Outcome> + Send + Sync>;

pub struct Rule {
    pattern: Pattern,
    handler: Handler,
    priority: i32,
    seq: usize,
}

#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    seq: usize,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a pattern. A handler registered earlier under
    /// the very same pattern is replaced.
    pub fn register<F>(&mut self, pattern: &str, handler: F, priority: i32)
    where
        F: Fn(&Element, &mut Session) -> Result<Outcome> + Send + Sync + 'static,
    {
        let pattern = Pattern::new(pattern);
        self.rules.retain(|rule| rule.pattern != pattern);
        self.seq += 1;
        debug!(pattern = %pattern, priority, "registered rule");
        self.rules.push(Rule {
            pattern,
            handler: Box::new(handler),
            priority,
            seq: self.seq,
        });
    }

    /// Registers a rule that suppresses matching nodes and their subtrees
    pub fn skip(&mut self, pattern: &str, priority: i32) {
        self.register(pattern, |_, _| Ok(Outcome::Skipped), priority);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules matching the path, the one that should run first comes first
    pub fn candidates(&self, path: &NodePath) -> Vec<&Rule> {
        let mut candidates: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.test(path))
            .collect();
        candidates.sort_by(|a, b| {
            (b.priority, b.pattern.specificity(), b.seq).cmp(&(
                a.priority,
                a.pattern.specificity(),
                a.seq,
            ))
        });
        candidates
    }

    /// Runs the handlers for the element at the session's current path. Only
    /// the most specific one runs, unless it defers.
    pub fn dispatch(&self, element: &Element, session: &mut Session) -> Result<Outcome> {
        let candidates = self.candidates(session.path());
        for rule in candidates {
            let outcome = (rule.handler)(element, session)?;
            debug!(path = %session.path(), rule = %rule.pattern, ?outcome, "dispatched");
            if outcome != Outcome::DeferToDefault {
                return Ok(outcome);
            }
        }
        Ok(Outcome::DeferToDefault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::document::parse;
    use crate::record::{Fields, RecordKind};

    fn session_at(path: &str) -> Session {
        let mut session = Session::new(ConversionConfig::new());
        for tag in path.split('/').filter(|s| !s.is_empty()) {
            session.enter(tag);
        }
        session
    }

    /// handler that records which rule ran by opening a resource titled after it
    fn marker(name: &'static str, outcome: Outcome) -> impl Fn(&Element, &mut Session) -> Result<Outcome> {
        move |_, session| {
            session.begin_root(
                RecordKind::Resource,
                Fields::new().with("title", name).with("level", "collection"),
            );
            Ok(outcome)
        }
    }

    fn ran(session: &Session) -> Vec<&str> {
        session
            .store()
            .iter()
            .filter(|record| record.kind() == RecordKind::Resource)
            .filter_map(|record| record.str("title"))
            .collect()
    }

    #[test]
    fn test_same_pattern_replaces() -> Result<()> {
        let mut registry = RuleRegistry::new();
        registry.register("unittitle", marker("first", Outcome::Handled), 0);
        registry.register("unittitle", marker("second", Outcome::Handled), 0);
        assert_eq!(registry.len(), 1);
        let element = parse("<unittitle>x</unittitle>")?;
        let mut session = session_at("/ead/unittitle");
        assert_eq!(registry.dispatch(&element, &mut session)?, Outcome::Handled);
        assert_eq!(ran(&session), vec!["second"]);
        Ok(())
    }

    #[test]
    fn test_most_specific_runs() -> Result<()> {
        let mut registry = RuleRegistry::new();
        registry.register("controlaccess/persname", marker("controlaccess", Outcome::Handled), 0);
        registry.register("persname", marker("bare", Outcome::Handled), 0);
        let element = parse("<persname>x</persname>")?;
        let mut session = session_at("/ead/archdesc/controlaccess/persname");
        registry.dispatch(&element, &mut session)?;
        assert_eq!(ran(&session), vec!["controlaccess"]);

        let mut session = session_at("/ead/archdesc/origination/persname");
        registry.dispatch(&element, &mut session)?;
        assert_eq!(ran(&session), vec!["bare"]);
        Ok(())
    }

    #[test]
    fn test_priority_beats_specificity() -> Result<()> {
        let mut registry = RuleRegistry::new();
        registry.register("/ead/archdesc/container", marker("anchored", Outcome::Handled), 0);
        registry.skip("archdesc/container", 10);
        let element = parse("<container/>")?;
        let mut session = session_at("/ead/archdesc/container");
        assert_eq!(registry.dispatch(&element, &mut session)?, Outcome::Skipped);
        assert!(ran(&session).is_empty());
        Ok(())
    }

    #[test]
    fn test_defer_falls_through() -> Result<()> {
        let mut registry = RuleRegistry::new();
        registry.register("physdesc", marker("default", Outcome::Handled), 0);
        registry.register("did/physdesc", marker("declined", Outcome::DeferToDefault), 0);
        let element = parse("<physdesc/>")?;
        let mut session = session_at("/c/did/physdesc");
        assert_eq!(registry.dispatch(&element, &mut session)?, Outcome::Handled);
        assert_eq!(ran(&session), vec!["declined", "default"]);
        Ok(())
    }

    #[test]
    fn test_unmatched() -> Result<()> {
        let mut registry = RuleRegistry::new();
        registry.register("persname", marker("persname", Outcome::Handled), 0);
        let element = parse("<emph/>")?;
        let mut session = session_at("/ead/emph");
        let outcome = registry.dispatch(&element, &mut session)?;
        assert_eq!(outcome, Outcome::DeferToDefault);
        assert!(outcome.descends());
        assert!(ran(&session).is_empty());
        Ok(())
    }
}
