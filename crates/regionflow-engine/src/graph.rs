// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Graph - regions, links and port-width bookkeeping.

The graph owns every region exclusively. It validates link endpoints when a link is
added and resolves deferred port widths during initialization. Scheduling lives in
[`crate::scheduler`].
*/

use ahash::AHashMap;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::link::{Endpoint, Link, LinkClass};
use crate::region::{
    PortDirection, PortLayout, PortValues, Region, RegionFactory, RegionKind, RegionModes,
};
use crate::region_config::RegionConfig;

/// Stable reference to a region inside one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionHandle {
    index: usize,
    name: String,
}

impl RegionHandle {
    /// Insertion index (also the scheduler's tie-break rank)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A region plus the bookkeeping the engine keeps around it
pub(crate) struct RegionNode {
    pub(crate) name: String,
    pub(crate) kind: RegionKind,
    pub(crate) layout: PortLayout,
    pub(crate) region: Box<dyn Region>,
    pub(crate) modes: RegionModes,
    /// Latest values produced by `step()`
    pub(crate) outputs: PortValues,
}

/// Owns all regions and links of a network
///
/// # Design Notes
///
/// - Regions are stored in insertion order; the index doubles as the tie-break rank
/// - Name lookups go through a hash index
/// - Each destination input port accepts at most one link
/// - Topology is frozen once [`Graph::freeze`] has been called
pub struct Graph {
    nodes: Vec<RegionNode>,
    index: AHashMap<String, usize>,
    links: Vec<Link>,
    factory: Option<Box<dyn RegionFactory>>,
    frozen: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph without a region factory
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: AHashMap::new(),
            links: Vec::new(),
            factory: None,
            frozen: false,
        }
    }

    /// Create an empty graph that builds regions through `factory`
    pub fn with_factory(factory: Box<dyn RegionFactory>) -> Self {
        let mut graph = Self::new();
        graph.factory = Some(factory);
        graph
    }

    /// Add a region built by the factory from its kind tag
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if `name` is taken
    /// - `UnknownRegionKind` if no factory accepts `kind`
    /// - `Config` if the factory rejects `config`
    pub fn add_region(
        &mut self,
        name: &str,
        kind: RegionKind,
        config: &RegionConfig,
    ) -> EngineResult<RegionHandle> {
        self.ensure_mutable("add a region")?;
        self.ensure_unique(name)?;

        let factory = match self.factory.as_mut() {
            Some(factory) if factory.supports(&kind) => factory,
            _ => return Err(EngineError::UnknownRegionKind(kind.to_string())),
        };
        let region = factory
            .create(&kind, config)
            .map_err(|source| EngineError::Config {
                region: name.to_string(),
                source,
            })?;

        Ok(self.insert(name, region))
    }

    /// Add a region the caller has already built and configured
    pub fn add_region_instance(
        &mut self,
        name: &str,
        region: Box<dyn Region>,
    ) -> EngineResult<RegionHandle> {
        self.ensure_mutable("add a region")?;
        self.ensure_unique(name)?;
        Ok(self.insert(name, region))
    }

    fn insert(&mut self, name: &str, region: Box<dyn Region>) -> RegionHandle {
        let index = self.nodes.len();
        let kind = region.kind();
        let layout = region.ports();
        debug!(
            "[GRAPH] Added region '{}' (kind {}, {} inputs, {} outputs)",
            name,
            kind,
            layout.inputs().len(),
            layout.outputs().len()
        );
        self.nodes.push(RegionNode {
            name: name.to_string(),
            kind,
            layout,
            region,
            modes: RegionModes::default(),
            outputs: PortValues::new(),
        });
        self.index.insert(name.to_string(), index);
        RegionHandle {
            index,
            name: name.to_string(),
        }
    }

    /// Connect `src_region.src_port` to `dst_region.dst_port`
    ///
    /// # Errors
    ///
    /// - `UnknownRegion` / `UnknownPort` for a missing endpoint
    /// - `PortAlreadyLinked` if the destination input already has a link
    /// - `WidthMismatch` if both widths are known and differ
    pub fn link(
        &mut self,
        src_region: &str,
        src_port: &str,
        dst_region: &str,
        dst_port: &str,
        class: LinkClass,
    ) -> EngineResult<&Link> {
        self.ensure_mutable("add a link")?;

        let source_index = self.lookup(src_region)?;
        let destination_index = self.lookup(dst_region)?;
        self.ensure_port(source_index, PortDirection::Output, src_port)?;
        self.ensure_port(destination_index, PortDirection::Input, dst_port)?;

        let destination = Endpoint::new(dst_region, dst_port);
        if let Some(existing) = self.links.iter().find(|l| l.destination == destination) {
            return Err(EngineError::PortAlreadyLinked {
                region: dst_region.to_string(),
                port: dst_port.to_string(),
                existing: existing.source.to_string(),
            });
        }

        let link = Link {
            source: Endpoint::new(src_region, src_port),
            destination,
            class,
            source_index,
            destination_index,
        };

        let source_width = self.nodes[source_index].region.output_width(src_port);
        let destination_width = self.nodes[destination_index].region.input_width(dst_port);
        if let (Some(source_width), Some(destination_width)) = (source_width, destination_width) {
            if source_width != destination_width {
                return Err(EngineError::WidthMismatch {
                    link: link.to_string(),
                    source_width,
                    destination_width,
                });
            }
        }

        debug!("[GRAPH] Linked {}", link);
        self.links.push(link);
        Ok(&self.links[self.links.len() - 1])
    }

    /// Propagate known source widths into unresolved destination inputs until nothing
    /// changes, then check every output and every linked input is resolved and matching
    pub(crate) fn resolve_widths(&mut self) -> EngineResult<()> {
        loop {
            let mut progressed = false;
            for link in &self.links {
                let source = &self.nodes[link.source_index];
                let Some(width) = source.region.output_width(&link.source.port) else {
                    continue;
                };
                let destination = &mut self.nodes[link.destination_index];
                if destination.region.input_width(&link.destination.port).is_some() {
                    continue;
                }

                destination
                    .region
                    .resolve_input_width(&link.destination.port, width)
                    .map_err(|source| EngineError::Config {
                        region: link.destination.region.clone(),
                        source,
                    })?;
                if destination.region.input_width(&link.destination.port).is_none() {
                    return Err(EngineError::UnresolvedWidth {
                        region: link.destination.region.clone(),
                        port: link.destination.port.clone(),
                        direction: PortDirection::Input,
                    });
                }
                debug!("[GRAPH] Resolved {} to width {}", link.destination, width);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        self.validate_widths()
    }

    fn validate_widths(&self) -> EngineResult<()> {
        for node in &self.nodes {
            for port in node.layout.outputs() {
                if node.region.output_width(port).is_none() {
                    return Err(EngineError::UnresolvedWidth {
                        region: node.name.clone(),
                        port: port.clone(),
                        direction: PortDirection::Output,
                    });
                }
            }
        }

        for link in &self.links {
            let source_width = self.link_source_width(link)?;
            let destination_width = self.nodes[link.destination_index]
                .region
                .input_width(&link.destination.port)
                .ok_or_else(|| EngineError::UnresolvedWidth {
                    region: link.destination.region.clone(),
                    port: link.destination.port.clone(),
                    direction: PortDirection::Input,
                })?;
            if source_width != destination_width {
                return Err(EngineError::WidthMismatch {
                    link: link.to_string(),
                    source_width,
                    destination_width,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn link_source_width(&self, link: &Link) -> EngineResult<usize> {
        self.nodes[link.source_index]
            .region
            .output_width(&link.source.port)
            .ok_or_else(|| EngineError::UnresolvedWidth {
                region: link.source.region.clone(),
                port: link.source.port.clone(),
                direction: PortDirection::Output,
            })
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_mutable(&self, action: &'static str) -> EngineResult<()> {
        if self.frozen {
            return Err(EngineError::AlreadyInitialized(action));
        }
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> EngineResult<()> {
        if self.index.contains_key(name) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn ensure_port(&self, index: usize, direction: PortDirection, port: &str) -> EngineResult<()> {
        let node = &self.nodes[index];
        if !node.layout.has(direction, port) {
            return Err(EngineError::UnknownPort {
                region: node.name.clone(),
                port: port.to_string(),
                direction,
            });
        }
        Ok(())
    }

    pub(crate) fn lookup(&self, name: &str) -> EngineResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownRegion(name.to_string()))
    }

    pub(crate) fn nodes(&self) -> &[RegionNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [RegionNode] {
        &mut self.nodes
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> EngineResult<&mut RegionNode> {
        let index = self.lookup(name)?;
        Ok(&mut self.nodes[index])
    }

    // ═══════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════

    /// Region by name
    pub fn region(&self, name: &str) -> Option<&dyn Region> {
        let index = *self.index.get(name)?;
        Some(self.nodes[index].region.as_ref())
    }

    pub fn handle(&self, name: &str) -> Option<RegionHandle> {
        self.index.get(name).map(|&index| RegionHandle {
            index,
            name: name.to_string(),
        })
    }

    pub fn kind_of(&self, name: &str) -> Option<&RegionKind> {
        self.index.get(name).map(|&i| &self.nodes[i].kind)
    }

    /// Regions with the given capability tag, in insertion order
    pub fn regions_by_kind(&self, kind: &RegionKind) -> Vec<RegionHandle> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| &node.kind == kind)
            .map(|(index, node)| RegionHandle {
                index,
                name: node.name.clone(),
            })
            .collect()
    }

    /// Region names in insertion order
    pub fn region_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn input_names(&self, name: &str) -> EngineResult<&[String]> {
        let index = self.lookup(name)?;
        Ok(self.nodes[index].layout.inputs())
    }

    pub fn output_names(&self, name: &str) -> EngineResult<&[String]> {
        let index = self.lookup(name)?;
        Ok(self.nodes[index].layout.outputs())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Link feeding the given input port, if any
    pub fn link_into(&self, region: &str, port: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.destination.region == region && l.destination.port == port)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{ConfigError, StepError};
    use crate::region_config::RegionConfig;

    /// Pass-through region with a deferred input width
    struct Relay {
        width: Option<usize>,
    }

    impl Region for Relay {
        fn kind(&self) -> RegionKind {
            RegionKind::from_static("Relay")
        }

        fn ports(&self) -> PortLayout {
            PortLayout::new().input("in").output("out")
        }

        fn configure(&mut self, config: &RegionConfig) -> Result<(), ConfigError> {
            self.width = config.get_usize("width")?;
            Ok(())
        }

        fn input_width(&self, _port: &str) -> Option<usize> {
            self.width
        }

        fn output_width(&self, _port: &str) -> Option<usize> {
            self.width
        }

        fn resolve_input_width(&mut self, _port: &str, width: usize) -> Result<(), ConfigError> {
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

    fn relay(width: Option<usize>) -> Box<dyn Region> {
        Box::new(Relay { width })
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(4))).unwrap();
        let err = graph.add_region_instance("a", relay(Some(4))).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName(ref n) if n == "a"));
    }

    #[test]
    fn test_unknown_kind_without_factory() {
        let mut graph = Graph::new();
        let err = graph
            .add_region("sensor", RegionKind::SENSOR, &RegionConfig::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRegionKind(ref k) if k == "Sensor"));
    }

    #[test]
    fn test_link_validates_endpoints() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(4))).unwrap();
        graph.add_region_instance("b", relay(Some(4))).unwrap();

        assert!(matches!(
            graph.link("a", "out", "missing", "in", LinkClass::FeedForward),
            Err(EngineError::UnknownRegion(_))
        ));
        assert!(matches!(
            graph.link("a", "in", "b", "in", LinkClass::FeedForward),
            Err(EngineError::UnknownPort {
                direction: PortDirection::Output,
                ..
            })
        ));

        graph.link("a", "out", "b", "in", LinkClass::FeedForward).unwrap();
        assert!(matches!(
            graph.link("b", "out", "b", "in", LinkClass::Feedback),
            Err(EngineError::PortAlreadyLinked { .. })
        ));
    }

    #[test]
    fn test_width_mismatch_at_link_time() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(50))).unwrap();
        graph.add_region_instance("b", relay(Some(2048))).unwrap();
        let err = graph
            .link("a", "out", "b", "in", LinkClass::FeedForward)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::WidthMismatch {
                source_width: 50,
                destination_width: 2048,
                ..
            }
        ));
    }

    #[test]
    fn test_deferred_widths_propagate_along_chain() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(7))).unwrap();
        graph.add_region_instance("b", relay(None)).unwrap();
        graph.add_region_instance("c", relay(None)).unwrap();
        // Declared out of order so a single pass is not enough
        graph.link("b", "out", "c", "in", LinkClass::FeedForward).unwrap();
        graph.link("a", "out", "b", "in", LinkClass::FeedForward).unwrap();

        graph.resolve_widths().unwrap();
        assert_eq!(graph.region("c").unwrap().output_width("out"), Some(7));
    }

    #[test]
    fn test_resolved_widths_are_checked_again() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(7))).unwrap();
        graph.add_region_instance("b", relay(None)).unwrap();
        graph.add_region_instance("c", relay(Some(5))).unwrap();
        // b.out has no width yet, so this link passes the link-time check
        graph.link("b", "out", "c", "in", LinkClass::FeedForward).unwrap();
        graph.link("a", "out", "b", "in", LinkClass::FeedForward).unwrap();

        match graph.resolve_widths() {
            Err(EngineError::WidthMismatch {
                link,
                source_width: 7,
                destination_width: 5,
            }) => assert!(link.contains("b") && link.contains("c")),
            other => panic!("expected WidthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_output_reported() {
        let mut graph = Graph::new();
        graph.add_region_instance("orphan", relay(None)).unwrap();
        let err = graph.resolve_widths().unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnresolvedWidth {
                direction: PortDirection::Output,
                ..
            }
        ));
    }

    #[test]
    fn test_regions_by_kind_in_insertion_order() {
        let mut graph = Graph::new();
        graph.add_region_instance("z", relay(Some(1))).unwrap();
        graph.add_region_instance("a", relay(Some(1))).unwrap();
        let names: Vec<_> = graph
            .regions_by_kind(&RegionKind::from_static("Relay"))
            .into_iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_frozen_graph_rejects_topology_changes() {
        let mut graph = Graph::new();
        graph.add_region_instance("a", relay(Some(1))).unwrap();
        graph.freeze();
        assert!(matches!(
            graph.add_region_instance("b", relay(Some(1))),
            Err(EngineError::AlreadyInitialized(_))
        ));
        assert!(matches!(
            graph.link("a", "out", "a", "in", LinkClass::Feedback),
            Err(EngineError::AlreadyInitialized(_))
        ));
    }
}
