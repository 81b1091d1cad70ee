//! Compressor descriptors: a JSON snapshot of the graphs a compressor was built with.
//!
//! Nodes are written by component name, never by pointer, so a descriptor can
//! be loaded into any compressor that has the same custom components
//! registered. The standard graphs are implied and not written. Loading
//! rebuilds every node through the regular builders, so a descriptor gets the
//! same validation as code that builds graphs by hand.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::GlobalParams;
use crate::error::ZstrongError;
use crate::graph::{standard, Compressor, GraphId, LocalParams, NodeKind};

/// Bumped whenever the descriptor layout changes incompatibly.
const DESCRIPTOR_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct CompressorDescriptor {
    descriptor_version: u32,
    global_params: GlobalParams,
    /// Non-standard nodes in arena order. Node `i` has id `standard::COUNT + i`.
    nodes: Vec<NodeDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    names: BTreeMap<String, GraphId>,
    starting_graph: GraphId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
// Externally tagged: internally tagged enums cannot read the integer keys of `LocalParams`.
#[serde(rename_all = "snake_case")]
enum NodeDescriptor {
    Codec {
        name: String,
        #[serde(default)]
        params: LocalParams,
        successors: Vec<GraphId>,
    },
    Selector {
        name: String,
        #[serde(default)]
        params: LocalParams,
        successors: Vec<GraphId>,
    },
    Function {
        name: String,
        #[serde(default)]
        params: LocalParams,
        custom_graphs: Vec<GraphId>,
    },
}

/// Custom components a descriptor needs that the target compressor lacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmetDependencies {
    pub codecs: Vec<String>,
    pub selectors: Vec<String>,
    pub function_graphs: Vec<String>,
}

impl UnmetDependencies {
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty() && self.selectors.is_empty() && self.function_graphs.is_empty()
    }
}

impl fmt::Display for UnmetDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "codecs [{}], selectors [{}], function graphs [{}]",
            self.codecs.join(", "),
            self.selectors.join(", "),
            self.function_graphs.join(", ")
        )
    }
}

impl Compressor {
    /// Snapshots the built graphs, named graphs, global params and starting graph.
    pub fn serialize(&self) -> Result<Vec<u8>, ZstrongError> {
        let mut nodes = Vec::with_capacity(self.nodes.len().saturating_sub(standard::COUNT));
        for (index, node) in self.nodes.iter().enumerate().skip(standard::COUNT) {
            let params = node.params.clone();
            nodes.push(match &node.kind {
                NodeKind::Transform { codec } => NodeDescriptor::Codec {
                    name: self.codecs.require(*codec)?.descriptor().name.clone(),
                    params,
                    successors: node.successors.clone(),
                },
                NodeKind::Selector { name, .. } => NodeDescriptor::Selector {
                    name: name.clone(),
                    params,
                    successors: node.successors.clone(),
                },
                NodeKind::Function { name, .. } => NodeDescriptor::Function {
                    name: name.clone(),
                    params,
                    custom_graphs: node.successors.clone(),
                },
                NodeKind::Store => {
                    return Err(ZstrongError::InternalError(format!(
                        "node {} is a store node outside the standard graphs",
                        index
                    )))
                }
            });
        }

        let descriptor = CompressorDescriptor {
            descriptor_version: DESCRIPTOR_VERSION,
            global_params: self.global.clone(),
            nodes,
            names: self.names.iter().map(|(name, id)| (name.clone(), *id)).collect(),
            starting_graph: self.start,
        };
        Ok(serde_json::to_vec_pretty(&descriptor)?)
    }

    /// Loads a descriptor into this compressor.
    ///
    /// The compressor must not have built any graph yet; custom components the
    /// descriptor references must already be registered under the same names.
    /// On error the compressor is left untouched.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), ZstrongError> {
        let descriptor = parse(bytes)?;
        if self.nodes.len() != standard::COUNT || !self.names.is_empty() {
            return Err(ZstrongError::InvalidGraph(
                "a descriptor can only be loaded into a compressor with no graphs built yet".to_string(),
            ));
        }
        let unmet = self.unmet_dependencies(&descriptor);
        if !unmet.is_empty() {
            return Err(ZstrongError::UnmetDependencies(unmet.to_string()));
        }

        let mut staged = self.clone();
        let nb_nodes = descriptor.nodes.len();
        for (offset, node) in descriptor.nodes.into_iter().enumerate() {
            let expected = GraphId::from_raw((standard::COUNT + offset) as u32);
            let built = match node {
                NodeDescriptor::Codec {
                    name,
                    params,
                    successors,
                } => {
                    let codec = staged
                        .codecs
                        .by_name(&name)
                        .map(|codec| codec.descriptor().id)
                        .ok_or_else(|| ZstrongError::UnmetDependencies(format!("codec '{}'", name)))?;
                    staged.build_static_graph(codec, &successors, params)?
                }
                NodeDescriptor::Selector {
                    name,
                    params,
                    successors,
                } => staged.build_selector_graph(&name, &successors, params)?,
                NodeDescriptor::Function {
                    name,
                    params,
                    custom_graphs,
                } => staged.build_function_graph(&name, &custom_graphs, params)?,
            };
            if built != expected {
                return Err(ZstrongError::InternalError(format!(
                    "descriptor node rebuilt as {} instead of {}",
                    built, expected
                )));
            }
        }
        for (name, graph) in &descriptor.names {
            staged.name_graph(name, *graph)?;
        }
        staged.set_params(descriptor.global_params)?;
        staged.select_starting_graph(descriptor.starting_graph)?;

        log::info!(
            "Loaded compressor descriptor: {} graph(s), starting graph {}",
            nb_nodes,
            descriptor.starting_graph
        );
        *self = staged;
        Ok(())
    }

    /// Lists the custom components `bytes` needs that this compressor lacks.
    pub fn get_unmet_dependencies(&self, bytes: &[u8]) -> Result<UnmetDependencies, ZstrongError> {
        Ok(self.unmet_dependencies(&parse(bytes)?))
    }

    fn unmet_dependencies(&self, descriptor: &CompressorDescriptor) -> UnmetDependencies {
        let mut unmet = UnmetDependencies::default();
        for node in &descriptor.nodes {
            let (missing, list) = match node {
                NodeDescriptor::Codec { name, .. } => (self.codecs.by_name(name).is_none(), &mut unmet.codecs),
                NodeDescriptor::Selector { name, .. } => {
                    (!self.selectors.contains_key(name), &mut unmet.selectors)
                }
                NodeDescriptor::Function { name, .. } => {
                    (!self.function_graphs.contains_key(name), &mut unmet.function_graphs)
                }
            };
            let name = match node {
                NodeDescriptor::Codec { name, .. }
                | NodeDescriptor::Selector { name, .. }
                | NodeDescriptor::Function { name, .. } => name,
            };
            if missing && !list.contains(name) {
                list.push(name.clone());
            }
        }
        unmet
    }
}

fn parse(bytes: &[u8]) -> Result<CompressorDescriptor, ZstrongError> {
    let descriptor: CompressorDescriptor = serde_json::from_slice(bytes)?;
    if descriptor.descriptor_version != DESCRIPTOR_VERSION {
        return Err(ZstrongError::InvalidParameter(format!(
            "unsupported compressor descriptor version {} (expected {})",
            descriptor.descriptor_version, DESCRIPTOR_VERSION
        )));
    }
    Ok(descriptor)
}
