#![allow(dead_code)]
use std::collections::HashMap;

use ipnetwork::Ipv4Network;
use nix::errno::Errno;

use killswitch::{
    Chain, Link, QueryError, RouteError, RouteTransport, Rule, RulesetTransport, Table,
};

/// Everything a [`RecordingTransport`] saw, in staging order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    FlushRuleset,
    Table(Table),
    Chain(Chain),
    Rule(Rule),
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub staged: Vec<Staged>,
    pub committed: Vec<Vec<Staged>>,
}

impl RecordingTransport {
    pub fn applied_rules(&self) -> Vec<&Rule> {
        self.committed
            .iter()
            .flatten()
            .filter_map(|s| match s {
                Staged::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }
}

impl RulesetTransport for RecordingTransport {
    fn flush_ruleset(&mut self) {
        self.staged.push(Staged::FlushRuleset);
    }

    fn add_table(&mut self, table: &Table) {
        self.staged.push(Staged::Table(table.clone()));
    }

    fn add_chain(&mut self, chain: &Chain) {
        self.staged.push(Staged::Chain(chain.clone()));
    }

    fn add_rule(&mut self, rule: &Rule) {
        self.staged.push(Staged::Rule(rule.clone()));
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        let batch = std::mem::take(&mut self.staged);
        self.committed.push(batch);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeRoutes {
    pub links: HashMap<String, u32>,
    pub routes: Vec<(Link, Ipv4Network)>,
}

impl FakeRoutes {
    pub fn with_links(names: &[&str]) -> Self {
        FakeRoutes {
            links: names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u32 + 1))
                .collect(),
            ..Default::default()
        }
    }
}

impl RouteTransport for FakeRoutes {
    fn resolve_link(&mut self, name: &str) -> Result<Link, RouteError> {
        let index = *self.links.get(name).ok_or_else(|| RouteError::LinkNotFound {
            name: name.to_string(),
            source: Errno::ENODEV,
        })?;
        Ok(Link {
            name: name.to_string(),
            index,
        })
    }

    fn add_route(&mut self, link: &Link, destination: Ipv4Network) -> Result<(), RouteError> {
        if self.routes.iter().any(|(_, dst)| *dst == destination) {
            return Err(RouteError::AlreadyExists);
        }
        self.routes.push((link.clone(), destination));
        Ok(())
    }
}

/// Variables as `bring_up` reads them from the environment.
pub fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}
