//! Ordered handler tables.
//!
//! A `Registry` is a list of `(Matcher, handler)` pairs. Lookup walks the
//! list in registration order and returns the first handler whose matcher
//! accepts the operator, so earlier registrations take priority.

use std::fmt;

use stageplan_graph::{Operator, OperatorKind, PlanMarker, PlanMarkers};

#[derive(Clone)]
pub enum Matcher {
    Any,
    Kind(OperatorKind),
    /// `User` operators carrying this declaration.
    User(String),
    Marker(PlanMarker),
    Predicate(fn(&Operator) -> bool),
}

impl Matcher {
    pub fn user(declaration: impl Into<String>) -> Self {
        Matcher::User(declaration.into())
    }

    pub fn matches(&self, operator: &Operator) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Kind(kind) => operator.kind() == *kind,
            Matcher::User(declaration) => {
                operator.kind() == OperatorKind::User
                    && operator.attributes().declaration.as_deref() == Some(declaration.as_str())
            }
            Matcher::Marker(marker) => PlanMarkers::get(operator) == Some(*marker),
            Matcher::Predicate(f) => f(operator),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("Any"),
            Matcher::Kind(kind) => write!(f, "Kind({kind:?})"),
            Matcher::User(declaration) => write!(f, "User({declaration})"),
            Matcher::Marker(marker) => write!(f, "Marker({marker})"),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

pub struct Registry<H: ?Sized> {
    entries: Vec<(Matcher, Box<H>)>,
}

impl<H: ?Sized> Registry<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a handler; it only sees operators no earlier entry matched.
    pub fn register(&mut self, matcher: Matcher, handler: Box<H>) -> &mut Self {
        self.entries.push((matcher, handler));
        self
    }

    pub fn with(mut self, matcher: Matcher, handler: Box<H>) -> Self {
        self.register(matcher, handler);
        self
    }

    /// First handler whose matcher accepts `operator`.
    pub fn find(&self, operator: &Operator) -> Option<&H> {
        self.entries
            .iter()
            .find(|(m, _)| m.matches(operator))
            .map(|(_, h)| h.as_ref())
    }

    pub fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.entries.iter().map(|(m, _)| m)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: ?Sized> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.matchers()).finish()
    }
}
