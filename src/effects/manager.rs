/*
Effects Chain
=============

Units are registered with an order key and wired into one serial chain the
first time audio is needed. Lower order runs earlier in the signal path:

    order:     10            20            30
            [distortion] ─► [compressor] ─► [chorus] ─► destination

Wiring runs backward from the destination. The highest-order unit is built
first against the destination, its input becomes the target for the next
unit down, and so on:

    current = destination
    for unit in order (high → low):
        ports = unit.initialize(graph, current)
        connect(ports.output → current)
        current = ports.input

The final `current` is the chain's public input; voices feed it. With no
units registered the input is the destination itself.

Once built the chain is fixed: no more registrations, no reordering. A
unit that fails during wiring poisons the manager; every unit built so
far is torn down and the error names the unit.
*/

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::{
    effects::unit::{Effect, EffectPorts, EffectUnit},
    graph::{Graph, NodeId},
    synth::config::ParamValue,
    Error, Result,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    Modulation,
    Time,
    Space,
    Distortion,
    Dynamics,
    Analysis,
}

impl EffectCategory {
    pub fn name(self) -> &'static str {
        match self {
            EffectCategory::Modulation => "modulation",
            EffectCategory::Time => "time",
            EffectCategory::Space => "space",
            EffectCategory::Distortion => "distortion",
            EffectCategory::Dynamics => "dynamics",
            EffectCategory::Analysis => "analysis",
        }
    }
}

impl fmt::Display for EffectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectMetadata {
    pub id: String,
    pub name: String,
    /// Sort key; lower runs earlier in the chain.
    pub order: i32,
    pub category: EffectCategory,
}

impl EffectMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        order: i32,
        category: EffectCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            category,
        }
    }
}

pub struct EffectRegistration<U> {
    pub unit: U,
    pub metadata: EffectMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Open,
    Built { input: NodeId, output: NodeId },
    Failed,
}

pub struct EffectsManager<U: EffectUnit = Effect> {
    registrations: Vec<EffectRegistration<U>>,
    state: ChainState,
}

impl<U: EffectUnit> Default for EffectsManager<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: EffectUnit> EffectsManager<U> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            state: ChainState::Open,
        }
    }

    pub fn register(&mut self, unit: impl Into<U>, metadata: EffectMetadata) -> Result<()> {
        if self.state != ChainState::Open {
            return Err(Error::Configuration(format!(
                "cannot register `{}`: effects chain is already built",
                metadata.id
            )));
        }
        if self.registrations.iter().any(|r| r.metadata.id == metadata.id) {
            return Err(Error::Configuration(format!(
                "effect `{}` is already registered",
                metadata.id
            )));
        }
        self.registrations.push(EffectRegistration {
            unit: unit.into(),
            metadata,
        });
        Ok(())
    }

    /// Build every unit and wire the chain into `destination`. Returns the
    /// chain's input node.
    pub fn initialize(&mut self, graph: &mut Graph, destination: NodeId) -> Result<NodeId> {
        match self.state {
            ChainState::Open => {}
            ChainState::Built { .. } => {
                return Err(Error::Configuration(
                    "effects chain is already initialized".into(),
                ))
            }
            ChainState::Failed => {
                return Err(Error::Configuration(
                    "effects chain failed to build and cannot be retried".into(),
                ))
            }
        }

        let order = self.ascending_indices();
        let mut current = destination;
        let mut built = Vec::with_capacity(order.len());

        for &index in order.iter().rev() {
            built.push(index);
            let registration = &mut self.registrations[index];
            match wire(graph, registration, current) {
                Ok(ports) => {
                    debug!(
                        "effect `{}` wired: {:?} -> {:?}",
                        registration.metadata.id, ports.output, current
                    );
                    current = ports.input;
                }
                Err(err) => {
                    // Includes the failed unit, which may have built nodes.
                    for index in built {
                        let registration = &mut self.registrations[index];
                        debug!("tearing down effect `{}`", registration.metadata.id);
                        registration.unit.teardown(graph);
                    }
                    self.state = ChainState::Failed;
                    return Err(err);
                }
            }
        }

        debug!("effects chain built with {} units", self.registrations.len());
        self.state = ChainState::Built {
            input: current,
            output: destination,
        };
        Ok(current)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, ChainState::Built { .. })
    }

    pub fn input(&self) -> Option<NodeId> {
        match self.state {
            ChainState::Built { input, .. } => Some(input),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<NodeId> {
        match self.state {
            ChainState::Built { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn effect(&self, id: &str) -> Option<&U> {
        self.registration(id).map(|r| &r.unit)
    }

    pub fn effect_mut(&mut self, id: &str) -> Option<&mut U> {
        self.registrations
            .iter_mut()
            .find(|r| r.metadata.id == id)
            .map(|r| &mut r.unit)
    }

    pub fn registration(&self, id: &str) -> Option<&EffectRegistration<U>> {
        self.registrations.iter().find(|r| r.metadata.id == id)
    }

    /// Registration order.
    pub fn effects(&self) -> &[EffectRegistration<U>] {
        &self.registrations
    }

    /// Signal-flow order; ties keep registration order.
    pub fn effects_by_order(&self) -> Vec<&EffectRegistration<U>> {
        self.ascending_indices()
            .into_iter()
            .map(|i| &self.registrations[i])
            .collect()
    }

    pub fn effects_by_category(&self, category: EffectCategory) -> Vec<&EffectRegistration<U>> {
        self.registrations
            .iter()
            .filter(|r| r.metadata.category == category)
            .collect()
    }

    pub fn set_param(
        &mut self,
        graph: &mut Graph,
        id: &str,
        name: &str,
        value: &ParamValue,
    ) -> Result<()> {
        let unit = self
            .effect_mut(id)
            .ok_or_else(|| Error::Configuration(format!("no effect registered as `{id}`")))?;
        unit.set_param(graph, name, value)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn ascending_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.registrations.len()).collect();
        // sort_by_key is stable
        indices.sort_by_key(|&i| self.registrations[i].metadata.order);
        indices
    }
}

fn wire<U: EffectUnit>(
    graph: &mut Graph,
    registration: &mut EffectRegistration<U>,
    target: NodeId,
) -> Result<EffectPorts> {
    let name = &registration.metadata.id;
    let failed = |reason: String| Error::ModuleInitialization {
        name: name.clone(),
        reason,
    };

    let ports = registration
        .unit
        .initialize(graph, target)
        .map_err(|err| failed(err.to_string()))?;
    if !graph.contains(ports.input) {
        return Err(failed(format!("input {:?} is not a live node", ports.input)));
    }
    if !graph.contains(ports.output) {
        return Err(failed(format!("output {:?} is not a live node", ports.output)));
    }
    graph
        .connect(ports.output, target)
        .map_err(|err| failed(err.to_string()))?;
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsp::dynamics::CompressorSettings,
        effects::{
            compressor::Compressor,
            delay::{Delay, DelayConfig},
            unit::EffectConfig,
        },
    };

    fn meta(id: &str, order: i32, category: EffectCategory) -> EffectMetadata {
        EffectMetadata::new(id, id.to_uppercase(), order, category)
    }

    /// Builds a gain node, or hands back a freed one when `dangling`.
    struct Stub {
        dangling: bool,
        node: Option<NodeId>,
    }

    impl EffectUnit for Stub {
        fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
            let node = graph.add_gain(1.0);
            if self.dangling {
                graph.remove(node)?;
            }
            self.node = Some(node);
            Ok(EffectPorts {
                input: node,
                output: node,
            })
        }

        fn input(&self) -> Option<NodeId> {
            self.node
        }

        fn output(&self) -> Option<NodeId> {
            self.node
        }

        fn config(&self) -> EffectConfig {
            EffectConfig::Compressor(CompressorSettings::default())
        }

        fn set_param(&mut self, _graph: &mut Graph, name: &str, _value: &ParamValue) -> Result<()> {
            Err(Error::unknown_param("stub", name))
        }

        fn teardown(&mut self, graph: &mut Graph) {
            if let Some(node) = self.node.take() {
                if graph.contains(node) {
                    graph.remove(node).unwrap();
                }
            }
        }
    }

    fn stub(dangling: bool) -> Stub {
        Stub {
            dangling,
            node: None,
        }
    }

    #[test]
    fn wires_from_destination_backward() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut chain: EffectsManager = EffectsManager::new();
        chain.register(Compressor::default(), meta("c", 3, EffectCategory::Dynamics)).unwrap();
        chain.register(Compressor::default(), meta("a", 1, EffectCategory::Dynamics)).unwrap();
        chain.register(Compressor::default(), meta("b", 2, EffectCategory::Dynamics)).unwrap();

        let input = chain.initialize(&mut graph, dest).unwrap();
        let a = chain.effect("a").unwrap().input().unwrap();
        let b = chain.effect("b").unwrap().input().unwrap();
        let c = chain.effect("c").unwrap().input().unwrap();

        assert_eq!(input, a);
        assert!(graph.is_connected(a, b));
        assert!(graph.is_connected(b, c));
        assert!(graph.is_connected(c, dest));
        assert_eq!(chain.input(), Some(a));
        assert_eq!(chain.output(), Some(dest));
    }

    #[test]
    fn empty_chain_feeds_destination_directly() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut chain: EffectsManager = EffectsManager::new();
        assert_eq!(chain.input(), None);
        assert_eq!(chain.initialize(&mut graph, dest).unwrap(), dest);
        assert!(chain.is_finalized());
    }

    #[test]
    fn orders_and_categories() {
        let mut chain: EffectsManager = EffectsManager::new();
        chain.register(Delay::default(), meta("late", 50, EffectCategory::Time)).unwrap();
        chain.register(Compressor::default(), meta("early", -5, EffectCategory::Dynamics)).unwrap();
        chain.register(Delay::new(DelayConfig::default()), meta("tie", 50, EffectCategory::Time)).unwrap();

        let ids: Vec<&str> = chain
            .effects_by_order()
            .iter()
            .map(|r| r.metadata.id.as_str())
            .collect();
        assert_eq!(ids, ["early", "late", "tie"]);

        let time: Vec<&str> = chain
            .effects_by_category(EffectCategory::Time)
            .iter()
            .map(|r| r.metadata.id.as_str())
            .collect();
        assert_eq!(time, ["late", "tie"]);
        assert!(chain.effects_by_category(EffectCategory::Space).is_empty());
        assert_eq!(chain.effects()[0].metadata.id, "late");
    }

    #[test]
    fn ties_follow_registration_order_in_the_signal_path() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut chain: EffectsManager = EffectsManager::new();
        chain.register(Compressor::default(), meta("first", 0, EffectCategory::Dynamics)).unwrap();
        chain.register(Compressor::default(), meta("second", 0, EffectCategory::Dynamics)).unwrap();
        chain.initialize(&mut graph, dest).unwrap();

        let first = chain.effect("first").unwrap().output().unwrap();
        let second = chain.effect("second").unwrap().input().unwrap();
        assert!(graph.is_connected(first, second));
    }

    #[test]
    fn registration_rules() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut chain: EffectsManager = EffectsManager::new();
        chain.register(Delay::default(), meta("delay", 1, EffectCategory::Time)).unwrap();

        let duplicate = chain.register(Delay::default(), meta("delay", 2, EffectCategory::Time));
        assert!(matches!(duplicate, Err(Error::Configuration(_))));

        chain.initialize(&mut graph, dest).unwrap();
        let late = chain.register(Delay::default(), meta("echo", 3, EffectCategory::Time));
        assert!(matches!(late, Err(Error::Configuration(_))));
        assert!(matches!(
            chain.initialize(&mut graph, dest),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn dangling_port_aborts_and_names_the_unit() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let baseline = graph.node_count();
        let mut chain: EffectsManager<Stub> = EffectsManager::new();
        chain.register(stub(false), meta("good", 2, EffectCategory::Analysis)).unwrap();
        chain.register(stub(true), meta("broken", 1, EffectCategory::Analysis)).unwrap();

        match chain.initialize(&mut graph, dest) {
            Err(Error::ModuleInitialization { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("expected module failure, got {other:?}"),
        }
        assert!(!chain.is_finalized());
        assert_eq!(chain.input(), None);

        // The unit that did wire is torn down again.
        assert_eq!(chain.effect("good").unwrap().output(), None);
        assert_eq!(graph.node_count(), baseline);
        assert!(graph.inputs(dest).unwrap().is_empty());
        assert!(chain.initialize(&mut graph, dest).is_err());
    }

    #[test]
    fn set_param_routes_by_id() {
        let mut graph = Graph::new(48_000.0);
        let mut chain: EffectsManager = EffectsManager::new();
        chain.register(Delay::default(), meta("delay", 1, EffectCategory::Time)).unwrap();

        chain
            .set_param(&mut graph, "delay", "mix", &ParamValue::from(0.5))
            .unwrap();
        match chain.effect("delay").unwrap().config() {
            EffectConfig::Delay(config) => assert_eq!(config.mix, 0.5),
            other => panic!("unexpected config {other:?}"),
        }
        assert!(matches!(
            chain.set_param(&mut graph, "nope", "mix", &ParamValue::from(0.5)),
            Err(Error::Configuration(_))
        ));
    }
}
