//! Function graphs: caller logic that decides, per compression, which codecs
//! to run and where each resulting stream goes.
//!
//! A function graph receives one `Edge` per input. Through the `GraphCtx` it
//! may inspect the stream behind an edge, run codecs over edges (consuming
//! them and producing new ones) and assign each remaining edge a destination
//! graph. When `run` returns, every edge it still holds must have a
//! destination; the streams are then dispatched to those graphs.

use std::fmt;

use crate::config::GlobalParams;
use crate::engine::encoder::Session;
use crate::error::ZstrongError;
use crate::graph::{GraphId, LocalParams, Node};
use crate::stream::Stream;
use crate::types::{CodecId, TypeMask};

/// Name and per-input accepted kinds of a function graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionGraphDescription {
    pub name: String,
    pub input_masks: Vec<TypeMask>,
}

impl FunctionGraphDescription {
    pub fn new(name: impl Into<String>, input_masks: impl IntoIterator<Item = TypeMask>) -> Self {
        Self {
            name: name.into(),
            input_masks: input_masks.into_iter().collect(),
        }
    }
}

pub trait FunctionGraph: Send + Sync {
    fn description(&self) -> FunctionGraphDescription;

    fn run(&self, ctx: &mut GraphCtx<'_, '_>, inputs: Vec<Edge>) -> Result<(), ZstrongError>;
}

/// A handle on a stream held by a running function graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge(usize);

impl Edge {
    pub(crate) fn new(slot: usize) -> Self {
        Edge(slot)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge {}", self.0)
    }
}

pub struct GraphCtx<'s, 'c> {
    session: &'s mut Session<'c>,
    node: GraphId,
    name: &'c str,
    params: &'c LocalParams,
    custom_graphs: &'c [GraphId],
    open: Vec<usize>,
    routes: Vec<(usize, GraphId)>,
}

impl<'s, 'c> GraphCtx<'s, 'c> {
    pub(crate) fn new(
        session: &'s mut Session<'c>,
        node: GraphId,
        name: &'c str,
        definition: &'c Node,
        inputs: Vec<usize>,
    ) -> Self {
        Self {
            session,
            node,
            name,
            params: &definition.params,
            custom_graphs: &definition.successors,
            open: inputs,
            routes: Vec::new(),
        }
    }

    pub fn node(&self) -> GraphId {
        self.node
    }

    pub fn local_params(&self) -> &LocalParams {
        self.params
    }

    pub fn global_params(&self) -> &GlobalParams {
        self.session.compressor().params()
    }

    /// The graphs this node was built with, in order.
    pub fn custom_graphs(&self) -> &[GraphId] {
        self.custom_graphs
    }

    fn claim(&mut self, edge: Edge) -> Result<usize, ZstrongError> {
        let position = self.open.iter().position(|&slot| slot == edge.0).ok_or_else(|| {
            ZstrongError::InvalidGraph(format!(
                "function graph '{}' used {} which it does not hold",
                self.name, edge
            ))
        })?;
        Ok(self.open.swap_remove(position))
    }

    pub fn stream(&self, edge: Edge) -> Result<&Stream, ZstrongError> {
        if !self.open.contains(&edge.0) {
            return Err(ZstrongError::InvalidGraph(format!(
                "function graph '{}' inspected {} which it does not hold",
                self.name, edge
            )));
        }
        self.session.peek(edge.0)
    }

    /// Runs a codec over `inputs`, which are consumed. Returns the edges of the
    /// fixed outputs followed by those of the variable outputs.
    pub fn run_codec(&mut self, codec: CodecId, inputs: &[Edge], params: LocalParams) -> Result<Vec<Edge>, ZstrongError> {
        let slots = inputs
            .iter()
            .map(|&edge| self.claim(edge))
            .collect::<Result<Vec<_>, _>>()?;
        let (fixed, variable) = self.session.apply_codec(self.node, codec, &slots, &params)?;
        let outputs: Vec<usize> = fixed.into_iter().chain(variable).collect();
        self.open.extend_from_slice(&outputs);
        Ok(outputs.into_iter().map(Edge).collect())
    }

    /// Sends the stream behind `edge` to `graph` once the function returns.
    pub fn set_destination(&mut self, edge: Edge, graph: GraphId) -> Result<(), ZstrongError> {
        self.session.compressor().node(graph)?;
        let slot = self.claim(edge)?;
        self.routes.push((slot, graph));
        Ok(())
    }

    /// Returns the routes, failing if any held edge was left without a destination.
    pub(crate) fn finish(self) -> Result<Vec<(usize, GraphId)>, ZstrongError> {
        if !self.open.is_empty() {
            return Err(ZstrongError::InvalidGraph(format!(
                "function graph '{}' at node {} left {} stream(s) without a destination",
                self.name,
                self.node,
                self.open.len()
            )));
        }
        Ok(self.routes)
    }
}
