//! Engine assembly and the inbound entry point
//!
//! The engine is built once from an [`EngineConfig`]. Each inbound channel is
//! bound either to a content-based route (optionally wire-tapped) or to a
//! multicast group. The hosting transport calls [`Engine::receive`] for every
//! message it pulls off a channel.

pub mod split_aggregate;

pub use split_aggregate::SplitAggregate;

use crate::aggregate::{AggregationStrategy, Aggregator, CompletionPolicy};
use crate::config::{CompletionSpec, EngineConfig};
use crate::dispatch::{MulticastGroup, Outcome, ParallelMulticastDispatcher, WorkerPool};
use crate::error::{ConfigurationError, EngineError, Result};
use crate::message::{DestinationId, Message};
use crate::routing::{Router, Rule, WireTap};
use crate::split::DelimiterSplitter;
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What the engine did with an inbound message
#[derive(Debug)]
pub enum Receipt {
    /// Sent to the destination chosen by the channel's route
    Routed { destination: DestinationId },
    /// Fanned out to every destination of the channel's multicast group
    Multicast {
        group: String,
        outcomes: Vec<Outcome>,
    },
    /// Rejected by the multicast group's filter
    Filtered { channel: String },
}

struct ChannelRoute {
    router: Router,
    tap: Option<WireTap>,
}

pub struct Engine {
    transport: Arc<dyn Transport>,
    pools: HashMap<String, Arc<WorkerPool>>,
    routes: HashMap<String, ChannelRoute>,
    multicast: HashMap<String, MulticastGroup>,
    dispatcher: ParallelMulticastDispatcher,
    config: EngineConfig,
}

impl Engine {
    /// Build every pool, route and group described by `config`
    pub fn from_config(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
    ) -> std::result::Result<Self, ConfigurationError> {
        config.validate()?;

        let mut pools = HashMap::new();
        for pool in &config.pools {
            let built = WorkerPool::new(pool.name.clone(), pool.size)?;
            pools.insert(pool.name.clone(), Arc::new(built));
        }

        let mut routes = HashMap::new();
        for route in &config.routes {
            let rules = route
                .rules
                .iter()
                .map(|rule| -> std::result::Result<Rule, ConfigurationError> {
                    Ok(Rule::new(rule.when.compile()?, rule.to.as_str()))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let router = Router::new(
                route.channel.clone(),
                rules,
                route.default.as_deref().map(DestinationId::from),
            )?;
            let tap = route.wire_tap.as_deref().map(|secondary| {
                WireTap::new(secondary, Arc::clone(&transport), route.tap_policy.clone())
            });

            routes.insert(route.channel.clone(), ChannelRoute { router, tap });
        }

        let mut multicast = HashMap::new();
        for group in &config.multicast {
            let pool = pools
                .get(&group.pool)
                .cloned()
                .ok_or_else(|| ConfigurationError::UnknownPool {
                    owner: group.channel.clone(),
                    pool: group.pool.clone(),
                })?;
            let destinations = group
                .destinations
                .iter()
                .map(|d| DestinationId::from(d.as_str()))
                .collect();

            let mut built = MulticastGroup::new(group.channel.clone(), destinations, pool)?;
            if let Some(filter) = &group.filter {
                built = built.with_filter(filter.compile()?);
            }
            multicast.insert(group.channel.clone(), built);
        }

        info!(
            pools = pools.len(),
            routes = routes.len(),
            multicast = multicast.len(),
            "Engine ready"
        );

        Ok(Self {
            dispatcher: ParallelMulticastDispatcher::new(Arc::clone(&transport)),
            transport,
            pools,
            routes,
            multicast,
            config,
        })
    }

    /// Handle a message that arrived on `channel`
    pub async fn receive(&self, channel: &str, message: Message) -> Result<Receipt> {
        if let Some(route) = self.routes.get(channel) {
            let destination = route.router.route(&message).clone();
            let transport = Arc::clone(&self.transport);
            let target = destination.clone();
            let deliver = move |m: Message| async move { transport.send(&target, m).await };

            match &route.tap {
                Some(tap) => tap.tap(message, deliver).await?,
                None => deliver(message).await?,
            }

            debug!(channel, destination = %destination, "Routed message");
            return Ok(Receipt::Routed { destination });
        }

        if let Some(group) = self.multicast.get(channel) {
            if !group.accepts(&message) {
                debug!(channel, "Message rejected by multicast filter");
                return Ok(Receipt::Filtered {
                    channel: channel.to_string(),
                });
            }

            let outcomes = self.dispatcher.dispatch(&message, group).await?;
            return Ok(Receipt::Multicast {
                group: group.name().to_string(),
                outcomes,
            });
        }

        Err(EngineError::UnknownChannel(channel.to_string()))
    }

    /// Build a split/aggregate processor from the `[aggregation]` settings
    pub fn split_aggregate(&self) -> Result<SplitAggregate> {
        let settings = &self.config.aggregation;
        let pool = match &settings.pool {
            Some(name) => self.pools.get(name).cloned(),
            None => self
                .config
                .pools
                .first()
                .and_then(|p| self.pools.get(&p.name).cloned()),
        };
        let pool = match pool {
            Some(pool) => pool,
            None => Arc::new(WorkerPool::new("split-aggregate", 1)?),
        };

        let completion = match settings.completion {
            CompletionSpec::SplitSize => CompletionPolicy::FromSplitSize,
            CompletionSpec::Fixed(n) => CompletionPolicy::FixedSize(n),
        };
        let aggregator = Aggregator::new(
            AggregationStrategy::join(settings.separator.clone()),
            completion,
            settings.timeout,
        );

        Ok(SplitAggregate::new(
            Arc::new(DelimiterSplitter::new(settings.delimiter.clone())),
            Arc::new(aggregator),
            pool,
        ))
    }

    pub fn router(&self, channel: &str) -> Option<&Router> {
        self.routes.get(channel).map(|r| &r.router)
    }

    pub fn multicast_group(&self, channel: &str) -> Option<&MulticastGroup> {
        self.multicast.get(channel)
    }

    pub fn pool(&self, name: &str) -> Option<&Arc<WorkerPool>> {
        self.pools.get(name)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Close every pool. Running branches finish; new dispatches fail.
    pub fn shutdown(&self) {
        for pool in self.pools.values() {
            pool.shutdown();
        }
    }
}
