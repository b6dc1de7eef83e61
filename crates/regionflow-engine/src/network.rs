// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Network - the public facade over graph, scheduler and feedback buffers.

Lifecycle:

1. build incrementally with `add_region` / `link`
2. `initialize()` resolves deferred widths, validates links, rejects feed-forward cycles
   and allocates one feedback buffer per feedback link
3. `tick()` repeatedly

A failed tick halts the network: region state may be half-updated, so further ticks are
refused until the network is rebuilt.
*/

use serde_json::Value;
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::feedback::FeedbackBuffer;
use crate::graph::{Graph, RegionHandle};
use crate::link::LinkClass;
use crate::region::{
    ConfigError, PortDirection, Region, RegionFactory, RegionKind, RegionModes, Signal,
};
use crate::region_config::RegionConfig;
use crate::scheduler::Scheduler;

/// Mode flag parameter understood for every region
pub const LEARNING_MODE: &str = "learningMode";
/// Mode flag parameter understood for every region
pub const INFERENCE_MODE: &str = "inferenceMode";

/// Region graph plus its compiled schedule
pub struct Network {
    graph: Graph,
    scheduler: Option<Scheduler>,
    halted_at: Option<u64>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Network without a region factory; regions must be added as instances
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            scheduler: None,
            halted_at: None,
        }
    }

    /// Network that builds regions from kind tags through `factory`
    pub fn with_factory(factory: impl RegionFactory + 'static) -> Self {
        Self {
            graph: Graph::with_factory(Box::new(factory)),
            scheduler: None,
            halted_at: None,
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════

    pub fn add_region(
        &mut self,
        name: &str,
        kind: RegionKind,
        config: &RegionConfig,
    ) -> EngineResult<RegionHandle> {
        self.graph.add_region(name, kind, config)
    }

    pub fn add_region_instance(
        &mut self,
        name: &str,
        region: Box<dyn Region>,
    ) -> EngineResult<RegionHandle> {
        self.graph.add_region_instance(name, region)
    }

    pub fn link(
        &mut self,
        src_region: &str,
        src_port: &str,
        dst_region: &str,
        dst_port: &str,
        class: LinkClass,
    ) -> EngineResult<()> {
        self.graph
            .link(src_region, src_port, dst_region, dst_port, class)
            .map(|_| ())
    }

    /// Freeze topology and compile the schedule
    ///
    /// No region steps here.
    ///
    /// # Errors
    ///
    /// - `UnresolvedWidth` / `WidthMismatch` from width resolution
    /// - `IllegalCycle` if feed-forward links form a cycle
    /// - `AlreadyInitialized` on a second call
    pub fn initialize(&mut self) -> EngineResult<()> {
        if self.scheduler.is_some() {
            return Err(EngineError::AlreadyInitialized("initialize again"));
        }

        self.graph.resolve_widths()?;
        let scheduler = Scheduler::build(&self.graph)?;
        self.graph.freeze();

        let order: Vec<&str> = scheduler
            .order()
            .iter()
            .map(|&i| self.graph.nodes()[i].name.as_str())
            .collect();
        info!(
            "[NETWORK] Initialized {} regions, {} links ({} feedback), order: {}",
            self.graph.len(),
            self.graph.links().len(),
            scheduler.buffers().len(),
            order.join(" -> ")
        );

        self.scheduler = Some(scheduler);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.scheduler.is_some()
    }

    // ═══════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════

    /// Run one tick
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before `initialize()`
    /// - `TickExecution` when a region fails; the network halts
    /// - `Halted` after an earlier failure
    pub fn tick(&mut self) -> EngineResult<()> {
        if let Some(tick) = self.halted_at {
            return Err(EngineError::Halted { tick });
        }
        let scheduler = self
            .scheduler
            .as_mut()
            .ok_or(EngineError::NotInitialized("tick"))?;

        let tick = scheduler.ticks();
        scheduler.tick(&mut self.graph).map_err(|err| {
            error!("[NETWORK] Tick {} failed: {}", tick, err);
            self.halted_at = Some(tick);
            err
        })
    }

    /// Run `count` ticks, stopping at the first failure
    pub fn run(&mut self, count: u64) -> EngineResult<()> {
        for _ in 0..count {
            self.tick()?;
        }
        Ok(())
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, Scheduler::ticks)
    }

    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }

    // ═══════════════════════════════════════════════════════════
    // Modes and parameters
    // ═══════════════════════════════════════════════════════════

    pub fn set_learning(&mut self, region: &str, enabled: bool) -> EngineResult<()> {
        self.graph.node_mut(region)?.modes.learning = enabled;
        Ok(())
    }

    pub fn set_inference(&mut self, region: &str, enabled: bool) -> EngineResult<()> {
        self.graph.node_mut(region)?.modes.inference = enabled;
        Ok(())
    }

    pub fn modes(&self, region: &str) -> EngineResult<RegionModes> {
        let index = self.graph.lookup(region)?;
        Ok(self.graph.nodes()[index].modes)
    }

    /// Set a parameter between ticks
    ///
    /// `learningMode` and `inferenceMode` are handled for every region; anything else is
    /// forwarded to the region, which decides whether it stays mutable.
    pub fn set_parameter(&mut self, region: &str, key: &str, value: &Value) -> EngineResult<()> {
        let node = self.graph.node_mut(region)?;
        let result = match key {
            LEARNING_MODE => parse_flag(key, value).map(|on| node.modes.learning = on),
            INFERENCE_MODE => parse_flag(key, value).map(|on| node.modes.inference = on),
            _ => node.region.set_parameter(key, value),
        };
        result.map_err(|source| EngineError::Config {
            region: region.to_string(),
            source,
        })
    }

    // ═══════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn region(&self, name: &str) -> Option<&dyn Region> {
        self.graph.region(name)
    }

    pub fn regions_by_kind(&self, kind: &RegionKind) -> Vec<RegionHandle> {
        self.graph.regions_by_kind(kind)
    }

    pub fn input_names(&self, region: &str) -> EngineResult<&[String]> {
        self.graph.input_names(region)
    }

    pub fn output_names(&self, region: &str) -> EngineResult<&[String]> {
        self.graph.output_names(region)
    }

    /// Width of an input port (after `initialize()` every linked input is resolved)
    pub fn input_width(&self, region: &str, port: &str) -> EngineResult<Option<usize>> {
        let index = self.graph.lookup(region)?;
        let node = &self.graph.nodes()[index];
        if !node.layout.has(PortDirection::Input, port) {
            return Err(unknown_port(region, port, PortDirection::Input));
        }
        Ok(node.region.input_width(port))
    }

    pub fn output_width(&self, region: &str, port: &str) -> EngineResult<Option<usize>> {
        let index = self.graph.lookup(region)?;
        let node = &self.graph.nodes()[index];
        if !node.layout.has(PortDirection::Output, port) {
            return Err(unknown_port(region, port, PortDirection::Output));
        }
        Ok(node.region.output_width(port))
    }

    /// Latest value produced on an output port
    ///
    /// # Errors
    ///
    /// `OutputUnavailable` before the region has stepped.
    pub fn output(&self, region: &str, port: &str) -> EngineResult<&Signal> {
        let index = self.graph.lookup(region)?;
        let node = &self.graph.nodes()[index];
        if !node.layout.has(PortDirection::Output, port) {
            return Err(unknown_port(region, port, PortDirection::Output));
        }
        node.outputs
            .get(port)
            .ok_or_else(|| EngineError::OutputUnavailable {
                region: region.to_string(),
                port: port.to_string(),
            })
    }

    /// Region names in execution order
    pub fn execution_order(&self) -> EngineResult<Vec<&str>> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or(EngineError::NotInitialized("reading the execution order"))?;
        Ok(scheduler
            .order()
            .iter()
            .map(|&i| self.graph.nodes()[i].name.as_str())
            .collect())
    }

    /// All feedback buffers, in link declaration order
    pub fn feedback_buffers(&self) -> &[FeedbackBuffer] {
        match &self.scheduler {
            Some(scheduler) => scheduler.buffers(),
            None => &[],
        }
    }

    /// Buffer feeding the given input port, if that port is fed by a feedback link
    pub fn feedback_buffer(&self, region: &str, port: &str) -> Option<&FeedbackBuffer> {
        self.feedback_buffers().iter().find(|b| {
            let destination = &b.link().destination;
            destination.region == region && destination.port == port
        })
    }
}

fn unknown_port(region: &str, port: &str, direction: PortDirection) -> EngineError {
    EngineError::UnknownPort {
        region: region.to_string(),
        port: port.to_string(),
        direction,
    }
}

fn parse_flag(key: &str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(on) => Ok(*on),
        other => match other.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ConfigError::InvalidType {
                key: key.to_string(),
                expected: "a boolean",
                found: other.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{PortLayout, PortValues, StepError};
    use serde_json::json;

    /// Emits a constant and counts its steps
    struct Constant {
        value: f64,
        steps: u64,
        fail_at: Option<u64>,
    }

    impl Region for Constant {
        fn kind(&self) -> RegionKind {
            RegionKind::from_static("Constant")
        }

        fn ports(&self) -> PortLayout {
            PortLayout::new().output("out")
        }

        fn configure(&mut self, _: &RegionConfig) -> Result<(), ConfigError> {
            Ok(())
        }

        fn input_width(&self, _: &str) -> Option<usize> {
            None
        }

        fn output_width(&self, _: &str) -> Option<usize> {
            Some(1)
        }

        fn resolve_input_width(&mut self, port: &str, _: usize) -> Result<(), ConfigError> {
            Err(ConfigError::UnknownParameter(port.to_string()))
        }

        fn step(&mut self, _: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
            if self.fail_at == Some(self.steps) {
                return Err(StepError::Failed("boom".into()));
            }
            self.steps += 1;
            let mut out = PortValues::new();
            out.insert("out".into(), Signal::from_elem(1, self.value));
            Ok(out)
        }
    }

    fn constant(fail_at: Option<u64>) -> Box<dyn Region> {
        Box::new(Constant {
            value: 3.0,
            steps: 0,
            fail_at,
        })
    }

    #[test]
    fn test_tick_requires_initialize() {
        let mut network = Network::new();
        network.add_region_instance("c", constant(None)).unwrap();
        assert!(matches!(
            network.tick(),
            Err(EngineError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_output_available_after_tick() {
        let mut network = Network::new();
        network.add_region_instance("c", constant(None)).unwrap();
        network.initialize().unwrap();
        assert!(matches!(
            network.output("c", "out"),
            Err(EngineError::OutputUnavailable { .. })
        ));

        network.tick().unwrap();
        assert_eq!(network.output("c", "out").unwrap()[0], 3.0);
        assert_eq!(network.tick_count(), 1);
    }

    #[test]
    fn test_failed_tick_halts_network() {
        let mut network = Network::new();
        network.add_region_instance("c", constant(Some(1))).unwrap();
        network.initialize().unwrap();

        network.tick().unwrap();
        let err = network.tick().unwrap_err();
        assert!(matches!(
            err,
            EngineError::TickExecution { tick: 1, ref region, .. } if region == "c"
        ));
        assert!(network.is_halted());
        assert!(matches!(network.tick(), Err(EngineError::Halted { tick: 1 })));
    }

    #[test]
    fn test_mode_parameters() {
        let mut network = Network::new();
        network.add_region_instance("c", constant(None)).unwrap();
        network.set_parameter("c", LEARNING_MODE, &json!(0)).unwrap();
        network.set_parameter("c", INFERENCE_MODE, &json!(true)).unwrap();
        assert_eq!(
            network.modes("c").unwrap(),
            RegionModes {
                learning: false,
                inference: true
            }
        );

        let err = network
            .set_parameter("c", "columnCount", &json!(10))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config {
                source: ConfigError::UnknownParameter(_),
                ..
            }
        ));
    }

    #[test]
    fn test_topology_frozen_after_initialize() {
        let mut network = Network::new();
        network.add_region_instance("c", constant(None)).unwrap();
        network.initialize().unwrap();
        assert!(matches!(
            network.add_region_instance("d", constant(None)),
            Err(EngineError::AlreadyInitialized(_))
        ));
        assert!(matches!(
            network.initialize(),
            Err(EngineError::AlreadyInitialized(_))
        ));
        // Mode flags stay mutable
        network.set_learning("c", false).unwrap();
    }

    /// Output width taken from config; only `gain` may change after construction
    struct Gauge {
        width: usize,
        gain: f64,
    }

    impl Region for Gauge {
        fn kind(&self) -> RegionKind {
            RegionKind::from_static("Gauge")
        }

        fn ports(&self) -> PortLayout {
            PortLayout::new().output("out")
        }

        fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
            self.width = config.usize_or("width", self.width)?;
            Ok(())
        }

        fn input_width(&self, _: &str) -> Option<usize> {
            None
        }

        fn output_width(&self, _: &str) -> Option<usize> {
            Some(self.width)
        }

        fn resolve_input_width(&mut self, port: &str, _: usize) -> Result<(), ConfigError> {
            Err(ConfigError::UnknownParameter(port.to_string()))
        }

        fn set_parameter(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
            match (key, value.as_f64()) {
                ("gain", Some(gain)) => {
                    self.gain = gain;
                    Ok(())
                }
                ("width", _) => Err(ConfigError::Immutable(key.to_string())),
                _ => Err(ConfigError::UnknownParameter(key.to_string())),
            }
        }

        fn step(&mut self, _: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
            let mut out = PortValues::new();
            out.insert("out".into(), Signal::from_elem(self.width, self.gain));
            Ok(out)
        }
    }

    #[test]
    fn test_width_cannot_change_after_initialize() {
        let mut network = Network::new();
        network
            .add_region_instance("g", Box::new(Gauge { width: 4, gain: 1.0 }))
            .unwrap();
        network.initialize().unwrap();
        network.tick().unwrap();

        let err = network
            .set_parameter("g", "width", &json!(9))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config {
                source: ConfigError::Immutable(ref key),
                ..
            } if key == "width"
        ));
        assert_eq!(network.output_width("g", "out").unwrap(), Some(4));

        network.set_parameter("g", "gain", &json!(2.5)).unwrap();
        network.tick().unwrap();
        let out = network.output("g", "out").unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 2.5);
    }
}
