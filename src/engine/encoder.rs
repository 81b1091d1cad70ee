//! The encode session: depth-first execution of a graph over a set of streams.
//!
//! A session owns every stream produced while compressing. Streams live in a
//! slot table indexed by their trace index: top-level inputs first, then the
//! outputs of each codec invocation in the order the invocations happen. A
//! stream leaves its slot exactly once, either as a codec input or when it
//! reaches a store node. The trace of codec invocations plus the stored
//! streams is everything the decoder needs.

use crate::codecs::CodecParams;
use crate::engine::container::{CompressedContainer, StoredStream, StreamInfo, TransformRecord, GLOBAL_PARAM_COMPRESSION_LEVEL};
use crate::engine::function::{Edge, FunctionGraph, GraphCtx};
use crate::error::ZstrongError;
use crate::graph::{Compressor, GraphId, LocalParams, Node, NodeKind};
use crate::selector::{Selector, SelectorState};
use crate::stream::Stream;
use crate::types::{CodecId, TypeMask};

/// Function graphs may route back into any graph, so dispatch depth is bounded.
pub(crate) const MAX_DISPATCH_DEPTH: usize = 256;

pub(crate) struct Session<'c> {
    compressor: &'c Compressor,
    slots: Vec<Option<Stream>>,
    inputs: Vec<StreamInfo>,
    records: Vec<TransformRecord>,
    stored: Vec<StoredStream>,
    /// Set for the throwaway sessions selectors run through `try_successor`.
    trial: bool,
}

impl<'c> Session<'c> {
    pub(crate) fn new(compressor: &'c Compressor, trial: bool) -> Self {
        Self {
            compressor,
            slots: Vec::new(),
            inputs: Vec::new(),
            records: Vec::new(),
            stored: Vec::new(),
            trial,
        }
    }

    pub(crate) fn compressor(&self) -> &'c Compressor {
        self.compressor
    }

    /// Registers the top-level inputs and returns their slots.
    pub(crate) fn add_inputs(&mut self, inputs: Vec<Stream>) -> Vec<usize> {
        inputs
            .into_iter()
            .map(|stream| {
                self.inputs.push(StreamInfo::of(&stream));
                self.push(stream)
            })
            .collect()
    }

    fn push(&mut self, stream: Stream) -> usize {
        self.slots.push(Some(stream));
        self.slots.len() - 1
    }

    pub(crate) fn peek(&self, slot: usize) -> Result<&Stream, ZstrongError> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| ZstrongError::InternalError(format!("stream {} is not available", slot)))
    }

    fn take(&mut self, slot: usize) -> Result<Stream, ZstrongError> {
        self.slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or_else(|| ZstrongError::InternalError(format!("stream {} was already consumed", slot)))
    }

    fn check_inputs(&self, node: GraphId, masks: &[TypeMask], slots: &[usize]) -> Result<(), ZstrongError> {
        if masks.len() != slots.len() {
            return Err(ZstrongError::InvalidGraph(format!(
                "node {} takes {} inputs but received {}",
                node,
                masks.len(),
                slots.len()
            )));
        }
        for (i, (mask, &slot)) in masks.iter().zip(slots).enumerate() {
            let kind = self.peek(slot)?.kind();
            if !mask.contains(kind) {
                return Err(ZstrongError::type_mismatch(
                    format!("input {} of node {}", i, node),
                    mask,
                    kind,
                ));
            }
        }
        Ok(())
    }

    //==================================================================================
    // 1. Dispatch
    //==================================================================================

    /// Sends the streams in `slots` through `graph`.
    pub(crate) fn dispatch(&mut self, graph: GraphId, slots: Vec<usize>, depth: usize) -> Result<(), ZstrongError> {
        if depth > MAX_DISPATCH_DEPTH {
            return Err(ZstrongError::InvalidGraph(format!(
                "dispatch depth exceeded {} at node {}; the graph likely loops",
                MAX_DISPATCH_DEPTH, graph
            )));
        }
        let compressor = self.compressor;
        let node = compressor.node(graph)?;
        match &node.kind {
            NodeKind::Store => {
                for slot in slots {
                    let stream = self.take(slot)?;
                    log::trace!("Storing stream {} ({}, {} bytes)", slot, stream.kind(), stream.byte_len());
                    self.stored.push(StoredStream { index: slot, stream });
                }
                Ok(())
            }
            NodeKind::Transform { codec } => self.run_transform(graph, node, *codec, slots, depth),
            NodeKind::Selector { selector, .. } => self.run_selector(graph, node, selector.as_ref(), slots, depth),
            NodeKind::Function { name, graph: body } => {
                self.run_function(graph, node, name, body.as_ref(), slots, depth)
            }
        }
    }

    fn run_transform(
        &mut self,
        graph: GraphId,
        node: &'c Node,
        codec: CodecId,
        slots: Vec<usize>,
        depth: usize,
    ) -> Result<(), ZstrongError> {
        let (fixed, variable) = self.apply_codec(graph, codec, &slots, &node.params)?;

        let successor = |i: usize| {
            node.successors.get(i).copied().ok_or_else(|| {
                ZstrongError::InvalidGraph(format!("node {} has no successor for output {}", graph, i))
            })
        };
        let nb_fixed = fixed.len();
        for (i, slot) in fixed.into_iter().enumerate() {
            self.dispatch(successor(i)?, vec![slot], depth + 1)?;
        }
        if !variable.is_empty() {
            let target = successor(nb_fixed)?;
            for slot in variable {
                self.dispatch(target, vec![slot], depth + 1)?;
            }
        }
        Ok(())
    }

    fn run_selector(
        &mut self,
        graph: GraphId,
        node: &'c Node,
        selector: &dyn Selector,
        slots: Vec<usize>,
        depth: usize,
    ) -> Result<(), ZstrongError> {
        let description = selector.description();
        self.check_inputs(graph, &[description.input_mask], &slots)?;

        let choice = {
            let input = self.peek(slots[0])?;
            let state = SelectorState::new(self.compressor, graph, &node.params, &node.successors, depth)
                .with_trial(self.trial);
            selector.select(&state, input, &node.successors)?
        };
        let next = *node.successors.get(choice).ok_or(ZstrongError::InvalidChoice {
            node: graph,
            choice,
            available: node.successors.len(),
        })?;
        log_metric!("event" = "select", "selector" = description.name, "node" = graph, "choice" = choice);
        self.dispatch(next, slots, depth + 1)
    }

    fn run_function(
        &mut self,
        graph: GraphId,
        node: &'c Node,
        name: &'c str,
        body: &dyn FunctionGraph,
        slots: Vec<usize>,
        depth: usize,
    ) -> Result<(), ZstrongError> {
        let description = body.description();
        self.check_inputs(graph, &description.input_masks, &slots)?;

        let edges: Vec<Edge> = slots.iter().map(|&slot| Edge::new(slot)).collect();
        let mut ctx = GraphCtx::new(self, graph, name, node, slots);
        body.run(&mut ctx, edges)?;
        let routes = ctx.finish()?;

        for (slot, destination) in routes {
            self.dispatch(destination, vec![slot], depth + 1)?;
        }
        Ok(())
    }

    //==================================================================================
    // 2. Codec invocation
    //==================================================================================

    /// Runs `codec` over the streams in `inputs`, records the invocation and
    /// returns the slots of its fixed and variable outputs.
    pub(crate) fn apply_codec(
        &mut self,
        node: GraphId,
        codec: CodecId,
        inputs: &[usize],
        params: &LocalParams,
    ) -> Result<(Vec<usize>, Vec<usize>), ZstrongError> {
        let compressor = self.compressor;
        let implementation = compressor.codecs().require(codec)?;
        let desc = implementation.descriptor();
        let global = compressor.params();
        if desc.min_format_version > global.format_version {
            return Err(ZstrongError::InvalidParameter(format!(
                "codec '{}' requires format version {} but the target version is {}",
                desc.name, desc.min_format_version, global.format_version
            )));
        }
        self.check_inputs(node, &desc.input_types, inputs)?;

        let streams = inputs
            .iter()
            .map(|&slot| self.take(slot))
            .collect::<Result<Vec<_>, _>>()?;
        let encoded = implementation
            .encode(streams, &CodecParams::new(params, global))
            .map_err(|source| ZstrongError::CodecEncodeFailure {
                node,
                codec: codec.0,
                source: Box::new(source),
            })?;

        // --- Check the outputs against the declared signature ---
        let nb_fixed = desc.fixed_output_types.len();
        let nb_outputs = encoded.outputs.len();
        if nb_outputs < nb_fixed || (desc.variable_outputs.is_none() && nb_outputs != nb_fixed) {
            return Err(ZstrongError::ConservationViolation {
                codec: codec.0,
                expected: nb_fixed,
                found: nb_outputs,
            });
        }
        for (i, output) in encoded.outputs.iter().enumerate() {
            let accepted = match desc.fixed_output_types.get(i) {
                Some(kind) => kind.mask(),
                None => desc.variable_outputs.unwrap_or(TypeMask::NONE),
            };
            if !accepted.contains(output.kind()) {
                return Err(ZstrongError::type_mismatch(
                    format!("output {} of codec '{}'", i, desc.name),
                    accepted,
                    output.kind(),
                ));
            }
        }

        let (outputs, header) = encoded.seal().map_err(|e| match e {
            ZstrongError::IncompleteOutput(msg) => {
                ZstrongError::IncompleteOutput(format!("codec '{}' at node {}: {}", desc.name, node, msg))
            }
            other => other,
        })?;

        let first = self.slots.len();
        self.records.push(TransformRecord {
            codec,
            inputs: inputs.to_vec(),
            nb_fixed_outputs: nb_fixed,
            nb_variable_outputs: nb_outputs - nb_fixed,
            header,
        });
        for output in outputs {
            self.push(output);
        }
        log_metric!("event" = "transform", "node" = node, "codec" = desc.name, "outputs" = nb_outputs);

        Ok(((first..first + nb_fixed).collect(), (first + nb_fixed..first + nb_outputs).collect()))
    }

    //==================================================================================
    // 3. Finish
    //==================================================================================

    /// Closes the session. Every stream must have been consumed or stored.
    pub(crate) fn finish(self) -> Result<CompressedContainer, ZstrongError> {
        if let Some(slot) = self.slots.iter().position(Option::is_some) {
            return Err(ZstrongError::InternalError(format!(
                "stream {} was neither consumed nor stored",
                slot
            )));
        }
        let global = self.compressor.params();
        let global_params = global
            .compression_level
            .map(|level| vec![(GLOBAL_PARAM_COMPRESSION_LEVEL, level as i64)])
            .unwrap_or_default();

        Ok(CompressedContainer {
            format_version: global.format_version,
            global_params,
            inputs: self.inputs,
            transforms: self.records,
            stored: self.stored,
        })
    }
}
