//! The graph arena: nodes, their ids and the standard graphs every compressor starts with.
//!
//! A graph is identified by the `GraphId` of its root node. Nodes live in an
//! arena owned by the `Compressor`; edges are plain ids into that arena.
//! Static graphs are built bottom-up (successors must exist before the node
//! that points at them), so they always form a DAG. Function graphs may route
//! to any existing graph at encode time; the encoder bounds dispatch depth.

mod compressor;
mod document;
pub mod params;
mod serialization;

pub use compressor::{Compressor, DecisionPoint};
pub use document::GraphDocument;
pub use params::LocalParams;
pub use serialization::UnmetDependencies;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::codecs::CodecRegistry;
use crate::engine::FunctionGraph;
use crate::error::ZstrongError;
use crate::selector::Selector;
use crate::types::{CodecId, TypeMask};

//==================================================================================
// 1. Ids
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(u32);

impl GraphId {
    pub const fn from_raw(raw: u32) -> Self {
        GraphId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Graphs pre-registered in every `Compressor`, in arena order.
pub mod standard {
    use super::GraphId;

    /// Appends the stream to the container payload as is.
    pub const STORE: GraphId = GraphId::from_raw(0);
    /// `zstd` then store.
    pub const ZSTD: GraphId = GraphId::from_raw(1);
    /// `entropy` then store. Needs format version 2.
    pub const ENTROPY: GraphId = GraphId::from_raw(2);
    /// `bitpack_int` then store.
    pub const BITPACK: GraphId = GraphId::from_raw(3);
    /// `constant`: nothing is stored.
    pub const CONSTANT: GraphId = GraphId::from_raw(4);
    /// `separate_string_components`, both parts through zstd.
    pub const STRING: GraphId = GraphId::from_raw(5);
    /// The generic `compress` selector over the graphs above.
    pub const COMPRESS: GraphId = GraphId::from_raw(6);

    pub(crate) const COUNT: usize = 7;

    pub(crate) const NAMES: [(&str, GraphId); COUNT] = [
        ("store", STORE),
        ("zstd", ZSTD),
        ("entropy", ENTROPY),
        ("bitpack", BITPACK),
        ("constant", CONSTANT),
        ("string", STRING),
        ("compress", COMPRESS),
    ];

    pub fn is_standard(id: GraphId) -> bool {
        id.index() < COUNT
    }
}

//==================================================================================
// 2. Nodes
//==================================================================================

#[derive(Clone)]
pub enum NodeKind {
    Store,
    Transform { codec: CodecId },
    Selector { name: String, selector: Arc<dyn Selector> },
    Function { name: String, graph: Arc<dyn FunctionGraph> },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Store => "store",
            NodeKind::Transform { .. } => "transform",
            NodeKind::Selector { .. } => "selector",
            NodeKind::Function { .. } => "function",
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Store => write!(f, "Store"),
            NodeKind::Transform { codec } => write!(f, "Transform({})", codec),
            NodeKind::Selector { name, .. } => write!(f, "Selector({})", name),
            NodeKind::Function { name, .. } => write!(f, "Function({})", name),
        }
    }
}

/// One vertex of the arena. Params are fixed at creation.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub params: LocalParams,
    /// For transforms: one per fixed output, then one for all variable outputs.
    /// For selectors: the candidates. For function graphs: the custom graphs
    /// the body may route to.
    pub successors: Vec<GraphId>,
}

impl Node {
    /// Accepted kinds for each input of this node.
    pub(crate) fn input_masks(&self, codecs: &CodecRegistry) -> Result<Vec<TypeMask>, ZstrongError> {
        Ok(match &self.kind {
            NodeKind::Store => vec![TypeMask::ANY],
            NodeKind::Transform { codec } => codecs.require(*codec)?.descriptor().input_types.clone(),
            NodeKind::Selector { selector, .. } => vec![selector.description().input_mask],
            NodeKind::Function { graph, .. } => graph.description().input_masks,
        })
    }
}
