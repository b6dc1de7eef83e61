// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Per-tick execution order and signal routing
//!
//! The order is a topological sort of the feed-forward subgraph; feedback links impose no
//! ordering constraint and are read through their [`FeedbackBuffer`]. Ready regions are
//! emitted smallest insertion index first, so the order only depends on how the graph was
//! built.
//!
//! One tick:
//! 1. gather inputs for the next region (feed-forward: value produced earlier this tick,
//!    feedback: the buffer's current value)
//! 2. `step()` and check every declared output is present with its declared width
//! 3. write outputs that feed feedback links into the buffers' pending slot
//! 4. once every region has stepped, swap all buffers

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, debug_span, trace};

use crate::error::{EngineError, EngineResult};
use crate::feedback::FeedbackBuffer;
use crate::graph::Graph;
use crate::region::{PortDirection, PortValues, StepError};

#[derive(Debug, Clone)]
enum InputRoute {
    /// Output of a region that already stepped this tick
    Direct { region: usize, port: String },
    /// Current value of a feedback buffer
    Delayed { buffer: usize },
}

/// Compiled schedule for one initialized graph
#[derive(Debug)]
pub struct Scheduler {
    order: Vec<usize>,
    /// Per region: input port -> route
    routes: Vec<Vec<(String, InputRoute)>>,
    /// Per region: output port -> feedback buffer
    feedback_writes: Vec<Vec<(String, usize)>>,
    /// Per region: declared output port -> width
    output_widths: Vec<Vec<(String, usize)>>,
    buffers: Vec<FeedbackBuffer>,
    ticks: u64,
}

impl Scheduler {
    /// Compile the schedule; widths must already be resolved
    pub(crate) fn build(graph: &Graph) -> EngineResult<Self> {
        let order = execution_order(graph)?;
        let count = graph.len();

        let mut routes = vec![Vec::new(); count];
        let mut feedback_writes = vec![Vec::new(); count];
        let mut buffers = Vec::new();

        for link in graph.links() {
            let route = if link.is_feedback() {
                let width = graph.link_source_width(link)?;
                buffers.push(FeedbackBuffer::new(link.clone(), width));
                let buffer = buffers.len() - 1;
                feedback_writes[link.source_index()].push((link.source.port.clone(), buffer));
                InputRoute::Delayed { buffer }
            } else {
                InputRoute::Direct {
                    region: link.source_index(),
                    port: link.source.port.clone(),
                }
            };
            routes[link.destination_index()].push((link.destination.port.clone(), route));
        }

        let mut output_widths = Vec::with_capacity(count);
        for node in graph.nodes() {
            let mut widths = Vec::with_capacity(node.layout.outputs().len());
            for port in node.layout.outputs() {
                let width = node.region.output_width(port).ok_or_else(|| {
                    EngineError::UnresolvedWidth {
                        region: node.name.clone(),
                        port: port.clone(),
                        direction: PortDirection::Output,
                    }
                })?;
                widths.push((port.clone(), width));
            }
            output_widths.push(widths);
        }

        Ok(Self {
            order,
            routes,
            feedback_writes,
            output_widths,
            buffers,
            ticks: 0,
        })
    }

    /// Region indices in execution order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn buffers(&self) -> &[FeedbackBuffer] {
        &self.buffers
    }

    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Execute one tick over `graph`
    pub(crate) fn tick(&mut self, graph: &mut Graph) -> EngineResult<()> {
        let tick = self.ticks;
        let _span = debug_span!("tick", tick).entered();

        for position in 0..self.order.len() {
            let index = self.order[position];
            let inputs = self.gather_inputs(graph, tick, index)?;

            let node = &mut graph.nodes_mut()[index];
            trace!(
                "[SCHEDULER] tick {} stepping '{}' with {} inputs",
                tick,
                node.name,
                inputs.len()
            );
            let outputs = node
                .region
                .step(&inputs, node.modes)
                .and_then(|outputs| check_outputs(&self.output_widths[index], outputs))
                .map_err(|source| EngineError::TickExecution {
                    tick,
                    region: node.name.clone(),
                    source,
                })?;
            node.outputs = outputs;

            for (port, buffer) in &self.feedback_writes[index] {
                if let Some(value) = node.outputs.get(port) {
                    self.buffers[*buffer].write(value);
                }
            }
        }

        for buffer in &mut self.buffers {
            buffer.swap();
        }
        self.ticks += 1;
        debug!("[SCHEDULER] tick {} complete", tick);
        Ok(())
    }

    fn gather_inputs(&self, graph: &Graph, tick: u64, index: usize) -> EngineResult<PortValues> {
        let nodes = graph.nodes();
        let mut inputs = PortValues::with_capacity(self.routes[index].len());
        for (port, route) in &self.routes[index] {
            let value = match route {
                InputRoute::Direct { region, port: source_port } => {
                    nodes[*region].outputs.get(source_port).cloned()
                }
                InputRoute::Delayed { buffer } => Some(self.buffers[*buffer].current().clone()),
            };
            let value = value.ok_or_else(|| EngineError::TickExecution {
                tick,
                region: nodes[index].name.clone(),
                source: StepError::MissingInput { port: port.clone() },
            })?;
            inputs.insert(port.clone(), value);
        }
        Ok(inputs)
    }
}

/// Every declared output present with its width, nothing undeclared
fn check_outputs(
    declared: &[(String, usize)],
    outputs: PortValues,
) -> Result<PortValues, StepError> {
    for (port, width) in declared {
        let value = outputs
            .get(port)
            .ok_or_else(|| StepError::MissingOutput { port: port.clone() })?;
        if value.len() != *width {
            return Err(StepError::WidthMismatch {
                port: port.clone(),
                expected: *width,
                actual: value.len(),
            });
        }
    }
    if outputs.len() != declared.len() {
        let undeclared = outputs
            .keys()
            .filter(|k| !declared.iter().any(|(port, _)| port == *k))
            .min()
            .cloned()
            .unwrap_or_default();
        return Err(StepError::UndeclaredOutput { port: undeclared });
    }
    Ok(outputs)
}

/// Topological order of the feed-forward subgraph, ties by insertion index
///
/// # Errors
///
/// `IllegalCycle` naming the regions of one feed-forward cycle, first region repeated
/// at the end.
pub(crate) fn execution_order(graph: &Graph) -> EngineResult<Vec<usize>> {
    let count = graph.len();
    let mut indegree = vec![0usize; count];
    let mut successors = vec![Vec::new(); count];
    let mut predecessors = vec![Vec::new(); count];

    for link in graph.links().iter().filter(|l| !l.is_feedback()) {
        successors[link.source_index()].push(link.destination_index());
        predecessors[link.destination_index()].push(link.source_index());
        indegree[link.destination_index()] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &successor in &successors[next] {
            indegree[successor] -= 1;
            if indegree[successor] == 0 {
                ready.insert(successor);
            }
        }
    }

    if order.len() == count {
        return Ok(order);
    }

    let cycle = find_cycle(&indegree, &predecessors);
    let names = graph.nodes();
    Err(EngineError::IllegalCycle {
        regions: cycle.into_iter().map(|i| names[i].name.clone()).collect(),
    })
}

/// Walk smallest-index predecessors among the regions Kahn's pass could not emit.
/// Each of them still has such a predecessor, so the walk must revisit a region.
fn find_cycle(indegree: &[usize], predecessors: &[Vec<usize>]) -> Vec<usize> {
    let remaining = |i: usize| indegree[i] > 0;
    let Some(start) = (0..indegree.len()).find(|&i| remaining(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;
    loop {
        let Some(previous) = predecessors[current]
            .iter()
            .copied()
            .filter(|&p| remaining(p))
            .min()
        else {
            return path;
        };
        if let Some(&at) = seen.get(&previous) {
            // path runs against edge direction; flip it and rotate the smallest index first
            let mut cycle: Vec<usize> = path[at..].iter().rev().copied().collect();
            let first = cycle
                .iter()
                .enumerate()
                .min_by_key(|&(_, region)| *region)
                .map(|(pos, _)| pos)
                .unwrap_or(0);
            cycle.rotate_left(first);
            if let Some(&head) = cycle.first() {
                cycle.push(head);
            }
            return cycle;
        }
        seen.insert(previous, path.len());
        path.push(previous);
        current = previous;
    }
}
