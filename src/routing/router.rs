//! Content-based router
//!
//! A router is an ordered rule table plus a default destination. Rules are
//! evaluated top to bottom and the first matching predicate wins. The table
//! is fixed once built.

use super::predicate::Predicate;
use crate::error::ConfigurationError;
use crate::message::{DestinationId, Message};
use tracing::debug;

/// A single `(predicate, destination)` entry of a route table
#[derive(Debug, Clone)]
pub struct Rule {
    pub predicate: Predicate,
    pub destination: DestinationId,
}

impl Rule {
    pub fn new(predicate: Predicate, destination: impl Into<DestinationId>) -> Self {
        Self {
            predicate,
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    name: String,
    rules: Vec<Rule>,
    default: DestinationId,
}

impl Router {
    /// Build a router from an explicit rule table.
    ///
    /// A missing default is rejected here so that routing itself can never fail.
    pub fn new(
        name: impl Into<String>,
        rules: Vec<Rule>,
        default: Option<DestinationId>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let default = default.ok_or_else(|| ConfigurationError::MissingDefaultRoute {
            route: name.clone(),
        })?;

        Ok(Self {
            name,
            rules,
            default,
        })
    }

    pub fn builder(name: impl Into<String>) -> RouterBuilder {
        RouterBuilder {
            name: name.into(),
            rules: Vec::new(),
            default: None,
        }
    }

    /// Select the destination for a message
    pub fn route(&self, message: &Message) -> &DestinationId {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.predicate.test(message) {
                debug!(
                    route = %self.name,
                    rule = index,
                    predicate = rule.predicate.description(),
                    destination = %rule.destination,
                    "Rule matched"
                );
                return &rule.destination;
            }
        }

        debug!(route = %self.name, destination = %self.default, "No rule matched, using default");
        &self.default
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_destination(&self) -> &DestinationId {
        &self.default
    }
}

/// Accumulates rules in order before producing a [`Router`]
#[derive(Debug)]
pub struct RouterBuilder {
    name: String,
    rules: Vec<Rule>,
    default: Option<DestinationId>,
}

impl RouterBuilder {
    pub fn rule(mut self, predicate: Predicate, destination: impl Into<DestinationId>) -> Self {
        self.rules.push(Rule::new(predicate, destination));
        self
    }

    pub fn default_destination(mut self, destination: impl Into<DestinationId>) -> Self {
        self.default = Some(destination.into());
        self
    }

    pub fn build(self) -> Result<Router, ConfigurationError> {
        Router::new(self.name, self.rules, self.default)
    }
}
