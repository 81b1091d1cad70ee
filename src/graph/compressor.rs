//! The `Compressor`: registered components plus the arena of graphs built from them.
//!
//! Construction pre-registers the built-in codecs and selectors and the
//! standard graphs. Callers then register their own components, build graphs
//! bottom-up and pick a starting graph. Once built, a compressor is only read:
//! `compress` takes `&self` and every call runs in its own session, so one
//! compressor can serve many threads.

use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::codecs::builtin::ids;
use crate::codecs::{Codec, CodecRegistry};
use crate::config::GlobalParams;
use crate::engine::{FunctionGraph, Session};
use crate::error::ZstrongError;
use crate::graph::{standard, GraphId, LocalParams, Node, NodeKind};
use crate::selector::builtin::{self as builtin_selectors, BruteForceSelector, CompressSelector, FixedChoiceSelector};
use crate::selector::Selector;
use crate::stream::Stream;
use crate::types::{CodecId, TypeMask};

/// A selector node whose choice a trainer may fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPoint {
    pub graph: GraphId,
    pub selector: String,
    pub num_successors: usize,
}

#[derive(Clone)]
pub struct Compressor {
    pub(super) codecs: CodecRegistry,
    pub(super) selectors: HashMap<String, Arc<dyn Selector>>,
    pub(super) function_graphs: HashMap<String, Arc<dyn FunctionGraph>>,
    pub(super) nodes: Vec<Node>,
    pub(super) names: HashMap<String, GraphId>,
    pub(super) global: GlobalParams,
    pub(super) start: GraphId,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("nodes", &self.nodes)
            .field("starting_graph", &self.start)
            .field("global", &self.global)
            .finish_non_exhaustive()
    }
}

impl Compressor {
    pub fn new() -> Self {
        let builtin: [Arc<dyn Selector>; 3] = [
            Arc::new(CompressSelector),
            Arc::new(FixedChoiceSelector),
            Arc::new(BruteForceSelector),
        ];
        let selectors: HashMap<String, Arc<dyn Selector>> = builtin
            .into_iter()
            .map(|selector| (selector.description().name, selector))
            .collect();

        Self {
            codecs: CodecRegistry::with_builtins(),
            selectors,
            function_graphs: HashMap::new(),
            nodes: standard_nodes(),
            names: HashMap::new(),
            global: GlobalParams::default(),
            start: standard::COMPRESS,
        }
    }

    //==================================================================================
    // 1. Registration
    //==================================================================================

    pub fn register_custom_codec(&mut self, codec: Arc<dyn Codec>) -> Result<CodecId, ZstrongError> {
        self.codecs.register_custom(codec)
    }

    pub fn register_selector(&mut self, selector: Arc<dyn Selector>) -> Result<(), ZstrongError> {
        let name = selector.description().name;
        if self.selectors.contains_key(&name) {
            return Err(ZstrongError::IdConflict(format!("selector '{}' is already registered", name)));
        }
        log::debug!("Registered selector '{}'", name);
        self.selectors.insert(name, selector);
        Ok(())
    }

    pub fn register_function_graph(&mut self, graph: Arc<dyn FunctionGraph>) -> Result<(), ZstrongError> {
        let name = graph.description().name;
        if self.function_graphs.contains_key(&name) {
            return Err(ZstrongError::IdConflict(format!(
                "function graph '{}' is already registered",
                name
            )));
        }
        log::debug!("Registered function graph '{}'", name);
        self.function_graphs.insert(name, graph);
        Ok(())
    }

    //==================================================================================
    // 2. Graph Construction
    //==================================================================================

    /// Builds a node running `codec`, with one successor per fixed output plus
    /// one for all variable outputs.
    pub fn build_static_graph(
        &mut self,
        codec: CodecId,
        successors: &[GraphId],
        params: LocalParams,
    ) -> Result<GraphId, ZstrongError> {
        let desc = self.codecs.require(codec)?.descriptor().clone();
        if successors.len() != desc.num_successors() {
            return Err(ZstrongError::InvalidGraph(format!(
                "codec '{}' needs {} successor(s), got {}",
                desc.name,
                desc.num_successors(),
                successors.len()
            )));
        }
        for (slot, &successor) in successors.iter().enumerate() {
            let produced = desc.successor_mask(slot).unwrap_or(TypeMask::NONE);
            self.check_successor(successor, produced, &format!("successor {} of codec '{}'", slot, desc.name))?;
        }
        Ok(self.push_node(Node {
            kind: NodeKind::Transform { codec },
            params,
            successors: successors.to_vec(),
        }))
    }

    /// Builds a node running the registered selector `name` over `successors`.
    pub fn build_selector_graph(
        &mut self,
        name: &str,
        successors: &[GraphId],
        params: LocalParams,
    ) -> Result<GraphId, ZstrongError> {
        let selector = self
            .selectors
            .get(name)
            .cloned()
            .ok_or_else(|| ZstrongError::InvalidGraph(format!("no selector named '{}' is registered", name)))?;
        if successors.is_empty() {
            return Err(ZstrongError::InvalidGraph(format!("selector '{}' needs at least one successor", name)));
        }
        let mask = selector.description().input_mask;
        for (i, &successor) in successors.iter().enumerate() {
            self.check_successor(successor, mask, &format!("successor {} of selector '{}'", i, name))?;
        }
        Ok(self.push_node(Node {
            kind: NodeKind::Selector {
                name: name.to_string(),
                selector,
            },
            params,
            successors: successors.to_vec(),
        }))
    }

    /// Builds a node running the registered function graph `name`. The body may
    /// route streams to any graph; `custom_graphs` are handed to it in order.
    pub fn build_function_graph(
        &mut self,
        name: &str,
        custom_graphs: &[GraphId],
        params: LocalParams,
    ) -> Result<GraphId, ZstrongError> {
        let graph = self
            .function_graphs
            .get(name)
            .cloned()
            .ok_or_else(|| ZstrongError::InvalidGraph(format!("no function graph named '{}' is registered", name)))?;
        for &custom in custom_graphs {
            self.node(custom)?;
        }
        Ok(self.push_node(Node {
            kind: NodeKind::Function {
                name: name.to_string(),
                graph,
            },
            params,
            successors: custom_graphs.to_vec(),
        }))
    }

    fn push_node(&mut self, node: Node) -> GraphId {
        let id = GraphId::from_raw(self.nodes.len() as u32);
        log::trace!("Built {} node {} ({:?})", node.kind.label(), id, node.kind);
        self.nodes.push(node);
        id
    }

    /// A successor must take exactly one input, and accept at least one of the
    /// kinds it can receive.
    fn check_successor(&self, successor: GraphId, produced: TypeMask, context: &str) -> Result<(), ZstrongError> {
        let masks = self.node(successor)?.input_masks(&self.codecs)?;
        let accepted = match masks.as_slice() {
            [mask] => *mask,
            _ => {
                return Err(ZstrongError::InvalidGraph(format!(
                    "{}: graph {} takes {} inputs, successors must take one",
                    context,
                    successor,
                    masks.len()
                )))
            }
        };
        if !accepted.intersects(produced) {
            return Err(ZstrongError::type_mismatch(
                format!("{} (graph {})", context, successor),
                accepted,
                produced,
            ));
        }
        Ok(())
    }

    /// Gives `graph` a name usable from graph documents and descriptors.
    pub fn name_graph(&mut self, name: &str, graph: GraphId) -> Result<(), ZstrongError> {
        self.node(graph)?;
        if self.graph_by_name(name).is_some() {
            return Err(ZstrongError::IdConflict(format!("graph name '{}' is already taken", name)));
        }
        self.names.insert(name.to_string(), graph);
        Ok(())
    }

    /// Looks up a standard or caller-named graph.
    pub fn graph_by_name(&self, name: &str) -> Option<GraphId> {
        standard::NAMES
            .iter()
            .find(|(standard_name, _)| *standard_name == name)
            .map(|(_, id)| *id)
            .or_else(|| self.names.get(name).copied())
    }

    pub fn select_starting_graph(&mut self, graph: GraphId) -> Result<(), ZstrongError> {
        self.node(graph)?;
        self.start = graph;
        Ok(())
    }

    pub fn starting_graph(&self) -> GraphId {
        self.start
    }

    pub fn node(&self, graph: GraphId) -> Result<&Node, ZstrongError> {
        self.nodes
            .get(graph.index())
            .ok_or_else(|| ZstrongError::InvalidGraph(format!("graph {} does not exist", graph)))
    }

    pub fn num_graphs(&self) -> usize {
        self.nodes.len()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    //==================================================================================
    // 3. Global Parameters
    //==================================================================================

    pub fn params(&self) -> &GlobalParams {
        &self.global
    }

    pub fn set_params(&mut self, params: GlobalParams) -> Result<(), ZstrongError> {
        params.validate()?;
        self.global = params;
        Ok(())
    }

    pub fn set_format_version(&mut self, version: u32) -> Result<(), ZstrongError> {
        let params = GlobalParams {
            format_version: version,
            ..self.global.clone()
        };
        self.set_params(params)
    }

    pub fn set_compression_level(&mut self, level: i32) {
        self.global.compression_level = Some(level);
    }

    //==================================================================================
    // 4. Compression
    //==================================================================================

    /// Compresses `inputs` through the starting graph into a self-describing container.
    ///
    /// # Errors
    /// Any failure aborts the whole call; no partial container is returned.
    pub fn compress(&self, inputs: Vec<Stream>) -> Result<Vec<u8>, ZstrongError> {
        self.global.validate()?;
        let start = Instant::now();
        let original: usize = inputs.iter().map(Stream::byte_len).sum();
        let bytes = self.compress_from(self.start, inputs, 0, false)?;
        log::debug!(
            "Compressed {} bytes into {} bytes in {:?}",
            original,
            bytes.len(),
            start.elapsed()
        );
        Ok(bytes)
    }

    pub fn compress_serial(&self, data: &[u8]) -> Result<Vec<u8>, ZstrongError> {
        self.compress(vec![Stream::serial(data.to_vec())])
    }

    /// Runs a full session rooted at `graph`. Selector trials come through here
    /// too, with `trial` set so that selectors nested inside can tell.
    ///
    /// Inputs go to `graph` together when its arity matches (a store takes any
    /// number). A single-input graph receives each input separately.
    pub(crate) fn compress_from(
        &self,
        graph: GraphId,
        inputs: Vec<Stream>,
        depth: usize,
        trial: bool,
    ) -> Result<Vec<u8>, ZstrongError> {
        let node = self.node(graph)?;
        let mut session = Session::new(self, trial);
        let slots = session.add_inputs(inputs);
        if !slots.is_empty() {
            let arity = node.input_masks(&self.codecs)?.len();
            if matches!(node.kind, NodeKind::Store) || arity == slots.len() {
                session.dispatch(graph, slots, depth)?;
            } else if arity == 1 {
                for slot in slots {
                    session.dispatch(graph, vec![slot], depth)?;
                }
            } else {
                return Err(ZstrongError::InvalidGraph(format!(
                    "graph {} takes {} inputs but {} were given",
                    graph,
                    arity,
                    slots.len()
                )));
            }
        }
        session.finish()?.to_bytes()
    }

    //==================================================================================
    // 5. Training Support
    //==================================================================================

    /// Selector nodes built by the caller, excluding already fixed ones.
    pub fn decision_points(&self) -> Vec<DecisionPoint> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let graph = GraphId::from_raw(index as u32);
                match &node.kind {
                    NodeKind::Selector { name, .. }
                        if !standard::is_standard(graph) && name.as_str() != builtin_selectors::FIXED_CHOICE =>
                    {
                        Some(DecisionPoint {
                            graph,
                            selector: name.clone(),
                            num_successors: node.successors.len(),
                        })
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Replaces the selector at `graph` by a `fixed_choice` selector returning `choice`.
    pub fn fix_selector_choice(&mut self, graph: GraphId, choice: usize) -> Result<(), ZstrongError> {
        if standard::is_standard(graph) {
            return Err(ZstrongError::InvalidGraph(format!("standard graph {} cannot be modified", graph)));
        }
        let fixed = self
            .selectors
            .get(builtin_selectors::FIXED_CHOICE)
            .cloned()
            .ok_or_else(|| ZstrongError::InternalError("fixed_choice selector is not registered".to_string()))?;
        let node = self
            .nodes
            .get_mut(graph.index())
            .ok_or_else(|| ZstrongError::InvalidGraph(format!("graph {} does not exist", graph)))?;
        if !matches!(node.kind, NodeKind::Selector { .. }) {
            return Err(ZstrongError::InvalidGraph(format!(
                "graph {} is a {} node, not a selector",
                graph,
                node.kind.label()
            )));
        }
        if choice >= node.successors.len() {
            return Err(ZstrongError::InvalidChoice {
                node: graph,
                choice,
                available: node.successors.len(),
            });
        }
        node.kind = NodeKind::Selector {
            name: builtin_selectors::FIXED_CHOICE.to_string(),
            selector: fixed,
        };
        node.params = LocalParams::new().with_int(0, choice as i64);
        Ok(())
    }
}

/// The standard graphs, in the order of the ids in [`standard`].
fn standard_nodes() -> Vec<Node> {
    let transform = |codec: CodecId, successors: Vec<GraphId>| Node {
        kind: NodeKind::Transform { codec },
        params: LocalParams::new(),
        successors,
    };
    vec![
        Node {
            kind: NodeKind::Store,
            params: LocalParams::new(),
            successors: Vec::new(),
        },
        transform(ids::ZSTD, vec![standard::STORE]),
        transform(ids::ENTROPY, vec![standard::STORE]),
        transform(ids::BITPACK_INT, vec![standard::STORE]),
        transform(ids::CONSTANT, Vec::new()),
        transform(ids::SEPARATE_STRING_COMPONENTS, vec![standard::ZSTD, standard::ZSTD]),
        Node {
            kind: NodeKind::Selector {
                name: builtin_selectors::COMPRESS.to_string(),
                selector: Arc::new(CompressSelector),
            },
            params: LocalParams::new(),
            successors: vec![standard::CONSTANT, standard::ZSTD, standard::BITPACK, standard::STRING],
        },
    ]
}
