// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for graph construction, scheduling and feedback delay
//!
//! Tests the complete flow: add regions → link → initialize → tick → read outputs

use std::cell::RefCell;
use std::rc::Rc;

use regionflow_engine::{
    ConfigError, EngineError, LinkClass, Network, PortLayout, PortValues, Region, RegionConfig,
    RegionKind, RegionModes, Signal, StepError,
};

// ═══════════════════════════════════════════════════════════
// Test regions
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
struct Log {
    /// (region, tick, port, first value)
    inputs: Vec<(String, u64, String, f64)>,
    steps: Vec<String>,
}

type SharedLog = Rc<RefCell<Log>>;

/// Emits `steps + offset` on `out`, records what it reads
struct Probe {
    name: String,
    offset: f64,
    inputs: Vec<&'static str>,
    width: Option<usize>,
    steps: u64,
    log: SharedLog,
}

impl Probe {
    fn boxed(name: &str, offset: f64, inputs: &[&'static str], log: &SharedLog) -> Box<dyn Region> {
        Box::new(Probe {
            name: name.to_string(),
            offset,
            inputs: inputs.to_vec(),
            width: Some(1),
            steps: 0,
            log: Rc::clone(log),
        })
    }
}

impl Region for Probe {
    fn kind(&self) -> RegionKind {
        RegionKind::from_static("Probe")
    }

    fn ports(&self) -> PortLayout {
        self.inputs
            .iter()
            .fold(PortLayout::new(), |layout, port| layout.input(*port))
            .output("out")
    }

    fn configure(&mut self, _: &RegionConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    fn input_width(&self, _: &str) -> Option<usize> {
        Some(1)
    }

    fn output_width(&self, _: &str) -> Option<usize> {
        self.width
    }

    fn resolve_input_width(&mut self, _: &str, _: usize) -> Result<(), ConfigError> {
        Ok(())
    }

    fn step(&mut self, inputs: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
        let mut log = self.log.borrow_mut();
        log.steps.push(self.name.clone());
        let mut ports: Vec<_> = inputs.iter().collect();
        ports.sort_by(|a, b| a.0.cmp(b.0));
        for (port, value) in ports {
            log.inputs
                .push((self.name.clone(), self.steps, port.clone(), value[0]));
        }

        let mut out = PortValues::new();
        out.insert(
            "out".into(),
            Signal::from_elem(1, self.steps as f64 + self.offset),
        );
        self.steps += 1;
        Ok(out)
    }
}

fn reads(log: &SharedLog, region: &str, port: &str) -> Vec<f64> {
    log.borrow()
        .inputs
        .iter()
        .filter(|(r, _, p, _)| r == region && p == port)
        .map(|(_, _, _, v)| *v)
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Feedback delay
// ═══════════════════════════════════════════════════════════

/// Test: a feedback consumer sees the neutral value first, then the previous tick's value
#[test]
fn test_feedback_value_is_one_tick_late() {
    let log = SharedLog::default();
    let mut network = Network::new();
    network
        .add_region_instance("consumer", Probe::boxed("consumer", 0.0, &["fb"], &log))
        .unwrap();
    network
        .add_region_instance("producer", Probe::boxed("producer", 100.0, &[], &log))
        .unwrap();
    network
        .link("producer", "out", "consumer", "fb", LinkClass::Feedback)
        .unwrap();
    network.initialize().unwrap();

    network.run(4).unwrap();

    // producer writes 100, 101, 102, 103
    assert_eq!(reads(&log, "consumer", "fb"), vec![0.0, 100.0, 101.0, 102.0]);
    assert_eq!(
        network.feedback_buffer("consumer", "fb").unwrap().current()[0],
        103.0
    );
}

/// Test: feed-forward values are consumed in the same tick
#[test]
fn test_feed_forward_value_same_tick() {
    let log = SharedLog::default();
    let mut network = Network::new();
    network
        .add_region_instance("sink", Probe::boxed("sink", 0.0, &["in"], &log))
        .unwrap();
    network
        .add_region_instance("source", Probe::boxed("source", 10.0, &[], &log))
        .unwrap();
    network
        .link("source", "out", "sink", "in", LinkClass::FeedForward)
        .unwrap();
    network.initialize().unwrap();

    assert_eq!(network.execution_order().unwrap(), vec!["source", "sink"]);
    network.run(3).unwrap();
    assert_eq!(reads(&log, "sink", "in"), vec![10.0, 11.0, 12.0]);
}

/// Test: the demo topology with two feedback loops schedules sensor → sp → tm → classifier
#[test]
fn test_demo_shaped_topology_order() {
    let log = SharedLog::default();
    let mut network = Network::new();
    network
        .add_region_instance("sensor", Probe::boxed("sensor", 0.0, &["spatialTopDownIn"], &log))
        .unwrap();
    network
        .add_region_instance("sp", Probe::boxed("sp", 0.0, &["bottomUpIn", "topDownIn"], &log))
        .unwrap();
    network
        .add_region_instance("tm", Probe::boxed("tm", 0.0, &["bottomUpIn"], &log))
        .unwrap();
    network
        .add_region_instance("classifier", Probe::boxed("classifier", 0.0, &["bottomUpIn"], &log))
        .unwrap();

    network
        .link("sensor", "out", "sp", "bottomUpIn", LinkClass::FeedForward)
        .unwrap();
    network
        .link("sp", "out", "sensor", "spatialTopDownIn", LinkClass::Feedback)
        .unwrap();
    network
        .link("sp", "out", "tm", "bottomUpIn", LinkClass::FeedForward)
        .unwrap();
    network
        .link("tm", "out", "sp", "topDownIn", LinkClass::Feedback)
        .unwrap();
    network
        .link("tm", "out", "classifier", "bottomUpIn", LinkClass::FeedForward)
        .unwrap();
    network.initialize().unwrap();

    assert_eq!(
        network.execution_order().unwrap(),
        vec!["sensor", "sp", "tm", "classifier"]
    );
    assert_eq!(network.feedback_buffers().len(), 2);

    network.run(3).unwrap();
    assert_eq!(
        log.borrow().steps[..4].to_vec(),
        vec!["sensor", "sp", "tm", "classifier"]
    );
    assert_eq!(reads(&log, "sp", "topDownIn"), vec![0.0, 0.0, 1.0]);
}

// ═══════════════════════════════════════════════════════════
// Construction errors
// ═══════════════════════════════════════════════════════════

/// Test: a pure feed-forward cycle is rejected, the same topology with one feedback edge runs
#[test]
fn test_cycle_needs_a_feedback_edge() {
    let build = |closing: LinkClass| {
        let log = SharedLog::default();
        let mut network = Network::new();
        for name in ["a", "b", "c"] {
            network
                .add_region_instance(name, Probe::boxed(name, 0.0, &["in"], &log))
                .unwrap();
        }
        network.link("a", "out", "b", "in", LinkClass::FeedForward).unwrap();
        network.link("b", "out", "c", "in", LinkClass::FeedForward).unwrap();
        network.link("c", "out", "a", "in", closing).unwrap();
        network
    };

    let mut cyclic = build(LinkClass::FeedForward);
    match cyclic.initialize() {
        Err(EngineError::IllegalCycle { regions }) => {
            assert_eq!(regions, vec!["a", "b", "c", "a"]);
        }
        other => panic!("expected IllegalCycle, got {other:?}"),
    }
    assert!(!cyclic.is_initialized());

    let mut looped = build(LinkClass::Feedback);
    looped.initialize().unwrap();
    looped.run(5).unwrap();
    assert_eq!(looped.tick_count(), 5);
}

/// Test: linking width 50 into width 2048 fails before any tick
#[test]
fn test_width_mismatch_before_any_tick() {
    let log = SharedLog::default();
    let mut network = Network::new();
    let narrow = Probe {
        name: "sensor".into(),
        offset: 0.0,
        inputs: vec![],
        width: Some(50),
        steps: 0,
        log: Rc::clone(&log),
    };
    network.add_region_instance("sensor", Box::new(narrow)).unwrap();

    struct Wide;
    impl Region for Wide {
        fn kind(&self) -> RegionKind {
            RegionKind::SPATIAL_POOLER
        }
        fn ports(&self) -> PortLayout {
            PortLayout::new().input("bottomUpIn")
        }
        fn configure(&mut self, _: &RegionConfig) -> Result<(), ConfigError> {
            Ok(())
        }
        fn input_width(&self, _: &str) -> Option<usize> {
            Some(2048)
        }
        fn output_width(&self, _: &str) -> Option<usize> {
            None
        }
        fn resolve_input_width(&mut self, _: &str, _: usize) -> Result<(), ConfigError> {
            Ok(())
        }
        fn step(&mut self, _: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
            Ok(PortValues::new())
        }
    }
    network.add_region_instance("sp", Box::new(Wide)).unwrap();

    let err = network
        .link("sensor", "out", "sp", "bottomUpIn", LinkClass::FeedForward)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::WidthMismatch {
            source_width: 50,
            destination_width: 2048,
            ..
        }
    ));
    assert!(err.is_construction_error());
    assert!(log.borrow().steps.is_empty());
}

/// Test: a width resolved at initialize() that disagrees with a fixed input fails there
#[test]
fn test_width_mismatch_found_at_initialize() {
    /// Takes its width from whatever feeds it
    struct Follower {
        width: Option<usize>,
    }
    impl Region for Follower {
        fn kind(&self) -> RegionKind {
            RegionKind::from_static("Follower")
        }
        fn ports(&self) -> PortLayout {
            PortLayout::new().input("in").output("out")
        }
        fn configure(&mut self, _: &RegionConfig) -> Result<(), ConfigError> {
            Ok(())
        }
        fn input_width(&self, _: &str) -> Option<usize> {
            self.width
        }
        fn output_width(&self, _: &str) -> Option<usize> {
            self.width
        }
        fn resolve_input_width(&mut self, _: &str, width: usize) -> Result<(), ConfigError> {
            self.width = Some(width);
            Ok(())
        }
        fn step(&mut self, inputs: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
            let mut out = PortValues::new();
            if let Some(value) = inputs.get("in") {
                out.insert("out".into(), value.clone());
            }
            Ok(out)
        }
    }

    let mut network = Network::new();
    network
        .add_region_instance("a", Box::new(Follower { width: Some(7) }))
        .unwrap();
    network
        .add_region_instance("b", Box::new(Follower { width: None }))
        .unwrap();
    network
        .add_region_instance("c", Box::new(Follower { width: Some(5) }))
        .unwrap();
    network.link("b", "out", "c", "in", LinkClass::FeedForward).unwrap();
    network.link("a", "out", "b", "in", LinkClass::FeedForward).unwrap();

    assert!(matches!(
        network.initialize(),
        Err(EngineError::WidthMismatch {
            source_width: 7,
            destination_width: 5,
            ..
        })
    ));
    assert!(!network.is_initialized());
}

/// Test: a region that omits a declared output fails the tick with context
#[test]
fn test_missing_output_fails_tick() {
    struct Silent;
    impl Region for Silent {
        fn kind(&self) -> RegionKind {
            RegionKind::from_static("Silent")
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
            Some(3)
        }
        fn resolve_input_width(&mut self, _: &str, _: usize) -> Result<(), ConfigError> {
            Ok(())
        }
        fn step(&mut self, _: &PortValues, _: RegionModes) -> Result<PortValues, StepError> {
            Ok(PortValues::new())
        }
    }

    let mut network = Network::new();
    network.add_region_instance("quiet", Box::new(Silent)).unwrap();
    network.initialize().unwrap();

    match network.tick() {
        Err(EngineError::TickExecution {
            tick: 0,
            region,
            source: StepError::MissingOutput { port },
        }) => {
            assert_eq!(region, "quiet");
            assert_eq!(port, "out");
        }
        other => panic!("expected TickExecution, got {other:?}"),
    }
}
