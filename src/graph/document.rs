//! Declarative graph documents.
//!
//! A document is a tree of `{ name, successors, int_params, string_params }`
//! nodes. Leaves are usually existing graphs (`"store"`, `"zstd"`, or any
//! graph named with `Compressor::name_graph`); inner nodes name a codec, a
//! selector or a function graph. The tree is built bottom-up through the
//! regular builders.
//!
//! ```json
//! {
//!   "name": "convert_serial_to_num_le",
//!   "int_params": { "0": 4 },
//!   "successors": [
//!     { "name": "delta_int", "successors": [{ "name": "bitpack" }] }
//!   ],
//!   "global_params": { "compression_level": 9 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GlobalParams;
use crate::error::ZstrongError;
use crate::graph::{Compressor, GraphId, LocalParams};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GraphDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<GraphDocument>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub int_params: BTreeMap<i32, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_params: BTreeMap<i32, String>,
    /// Only read on the root node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_params: Option<GlobalParams>,
}

impl GraphDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_successors(mut self, successors: impl IntoIterator<Item = GraphDocument>) -> Self {
        self.successors = successors.into_iter().collect();
        self
    }

    pub fn with_int(mut self, key: i32, value: i64) -> Self {
        self.int_params.insert(key, value);
        self
    }

    pub fn with_string(mut self, key: i32, value: impl Into<String>) -> Self {
        self.string_params.insert(key, value.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ZstrongError> {
        Ok(serde_json::from_str(json)?)
    }

    fn local_params(&self) -> LocalParams {
        LocalParams {
            int_params: self.int_params.clone(),
            string_params: self.string_params.clone(),
        }
    }
}

impl Compressor {
    /// Builds the graph a document describes and returns its root. Global
    /// params on the root replace the compressor's. The starting graph is not
    /// changed.
    ///
    /// The build runs on a staged copy that replaces `self` only once every
    /// node and the global params are accepted; on error the compressor is
    /// left exactly as it was.
    pub fn build_from_document(&mut self, document: &GraphDocument) -> Result<GraphId, ZstrongError> {
        let mut staged = self.clone();
        let root = staged.build_document_node(document)?;
        if let Some(global) = &document.global_params {
            staged.set_params(global.clone())?;
        }
        *self = staged;
        log::debug!("Built graph {} from document '{}'", root, document.name);
        Ok(root)
    }

    pub fn build_from_json(&mut self, json: &str) -> Result<GraphId, ZstrongError> {
        self.build_from_document(&GraphDocument::from_json(json)?)
    }

    /// Name resolution order: existing graph (only for a bare leaf), codec,
    /// selector, function graph.
    fn build_document_node(&mut self, document: &GraphDocument) -> Result<GraphId, ZstrongError> {
        let params = document.local_params();
        if document.successors.is_empty() && params.is_empty() {
            if let Some(graph) = self.graph_by_name(&document.name) {
                return Ok(graph);
            }
        }

        let successors = document
            .successors
            .iter()
            .map(|successor| self.build_document_node(successor))
            .collect::<Result<Vec<_>, _>>()?;

        let name = document.name.as_str();
        if let Some(codec) = self.codecs.by_name(name).map(|codec| codec.descriptor().id) {
            return self.build_static_graph(codec, &successors, params);
        }
        if self.selectors.contains_key(name) {
            return self.build_selector_graph(name, &successors, params);
        }
        if self.function_graphs.contains_key(name) {
            return self.build_function_graph(name, &successors, params);
        }
        Err(ZstrongError::InvalidGraph(format!(
            "'{}' is not a graph, codec, selector or function graph",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Decompressor;
    use crate::graph::standard;
    use crate::stream::Stream;

    #[test]
    fn test_bare_names_resolve_to_existing_graphs() {
        let mut compressor = Compressor::new();
        assert_eq!(
            compressor.build_from_json(r#"{"name": "zstd"}"#).unwrap(),
            standard::ZSTD
        );
        assert_eq!(compressor.num_graphs(), standard::COUNT);
    }

    #[test]
    fn test_nested_document_compresses_and_round_trips() {
        let json = r#"{
            "name": "convert_serial_to_num_le",
            "int_params": { "0": 4 },
            "successors": [
                { "name": "delta_int", "successors": [{ "name": "bitpack" }] }
            ],
            "global_params": { "compression_level": 9 }
        }"#;
        let mut compressor = Compressor::new();
        let root = compressor.build_from_json(json).unwrap();
        compressor.select_starting_graph(root).unwrap();
        assert_eq!(compressor.params().compression_level, Some(9));

        let data: Vec<u8> = (0u32..512).flat_map(|i| (i * 5).to_le_bytes()).collect();
        let compressed = compressor.compress_serial(&data).unwrap();
        assert!(compressed.len() < data.len() / 4);
        assert_eq!(Decompressor::new().decompress_serial(&compressed).unwrap(), data);
    }

    #[test]
    fn test_codec_name_with_successors_overrides_standard_graph() {
        let document = GraphDocument::new("zstd")
            .with_int(0, 19)
            .with_successors([GraphDocument::new("entropy")]);
        let mut compressor = Compressor::new();
        let root = compressor.build_from_document(&document).unwrap();
        assert_eq!(root, GraphId::from_raw(standard::COUNT as u32));
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let mut compressor = Compressor::new();
        let result = compressor.build_from_document(&GraphDocument::new("no_such_thing"));
        assert!(matches!(result, Err(ZstrongError::InvalidGraph(_))));
    }

    #[test]
    fn test_failed_document_leaves_compressor_untouched() {
        // The first successor builds fine; the second does not exist.
        let document = GraphDocument {
            global_params: Some(GlobalParams {
                compression_level: Some(19),
                ..GlobalParams::default()
            }),
            ..GraphDocument::new("brute_force").with_successors([
                GraphDocument::new("zstd").with_int(0, 3).with_successors([GraphDocument::new("store")]),
                GraphDocument::new("no_such_thing"),
            ])
        };
        let mut compressor = Compressor::new();
        let before = compressor.params().clone();
        let result = compressor.build_from_document(&document);
        assert!(matches!(result, Err(ZstrongError::InvalidGraph(_))));
        assert_eq!(compressor.num_graphs(), standard::COUNT);
        assert_eq!(compressor.params(), &before);
        assert!(compressor.decision_points().is_empty());
    }

    #[test]
    fn test_selector_document() {
        let document = GraphDocument::new("brute_force")
            .with_successors([GraphDocument::new("zstd"), GraphDocument::new("store")]);
        let mut compressor = Compressor::new();
        let root = compressor.build_from_document(&document).unwrap();
        assert_eq!(compressor.decision_points()[0].graph, root);
        compressor.select_starting_graph(root).unwrap();
        let input = Stream::serial(vec![b'a'; 4096]);
        let compressed = compressor.compress(vec![input.clone()]).unwrap();
        assert_eq!(Decompressor::new().decompress(&compressed).unwrap(), vec![input]);
    }
}
