//! End-to-end tests of the engine: compressors, custom components, containers
//! and the decompressor, exercised together.

use std::sync::Arc;

use crate::codecs::builtin::ids;
use crate::codecs::{Codec, CodecDescriptor, CodecParams, Encoded};
use crate::engine::{
    peek_info, read_version, CompressedContainer, Decompressor, Edge, FunctionGraph, FunctionGraphDescription,
    GraphCtx,
};
use crate::error::ZstrongError;
use crate::graph::{standard, Compressor, GraphId, LocalParams};
use crate::selector::{
    GbtModel, MlSelector, Selector, SelectorDescription, SelectorState, StatsFeatureGenerator, TrainingSelector,
};
use crate::stream::{Stream, StreamWriter};
use crate::types::{StreamKind, TypeMask};
use crate::MAX_FORMAT_VERSION;

// ================================================================================
// Test Helpers
// ================================================================================

/// Serial in, serial out, every byte incremented.
struct PlusOne(CodecDescriptor);

impl PlusOne {
    fn new() -> Self {
        PlusOne(
            CodecDescriptor::new(64, "plus_one")
                .inputs([TypeMask::SERIAL])
                .outputs([StreamKind::Serial]),
        )
    }
}

impl Codec for PlusOne {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.0
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let bytes: Vec<u8> = inputs[0].as_serial()?.iter().map(|b| b.wrapping_add(1)).collect();
        Ok(Encoded::new(vec![Stream::serial(bytes)]))
    }

    fn decode(&self, fixed: Vec<Stream>, _: Vec<Stream>, _: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        let bytes: Vec<u8> = fixed[0].as_serial()?.iter().map(|b| b.wrapping_sub(1)).collect();
        Ok(vec![Stream::serial(bytes)])
    }
}

/// Cuts a serial stream into 3-byte variable outputs.
struct Chunks3(CodecDescriptor);

impl Chunks3 {
    fn new() -> Self {
        Chunks3(
            CodecDescriptor::new(65, "chunks3")
                .inputs([TypeMask::SERIAL])
                .variable_outputs(TypeMask::SERIAL),
        )
    }
}

impl Codec for Chunks3 {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.0
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let chunks = inputs[0]
            .as_serial()?
            .chunks(3)
            .map(|chunk| Stream::serial(chunk.to_vec()))
            .collect();
        Ok(Encoded::new(chunks))
    }

    fn decode(&self, _: Vec<Stream>, variable: Vec<Stream>, _: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        let mut bytes = Vec::new();
        for chunk in &variable {
            bytes.extend_from_slice(chunk.as_serial()?);
        }
        Ok(vec![Stream::serial(bytes)])
    }
}

/// Two serial inputs concatenated; the header remembers where the first ends.
struct Concat2(CodecDescriptor);

impl Concat2 {
    fn new() -> Self {
        Concat2(
            CodecDescriptor::new(66, "concat2")
                .inputs([TypeMask::SERIAL, TypeMask::SERIAL])
                .outputs([StreamKind::Serial]),
        )
    }
}

impl Codec for Concat2 {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.0
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let first = inputs[0].as_serial()?;
        let mut bytes = first.to_vec();
        bytes.extend_from_slice(inputs[1].as_serial()?);
        let header = (first.len() as u32).to_le_bytes().to_vec();
        Ok(Encoded::with_header(vec![Stream::serial(bytes)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        let split: [u8; 4] = header
            .try_into()
            .map_err(|_| ZstrongError::Custom("bad concat2 header".to_string()))?;
        let bytes = fixed[0].as_serial()?;
        let (first, second) = bytes.split_at(u32::from_le_bytes(split) as usize);
        Ok(vec![Stream::serial(first.to_vec()), Stream::serial(second.to_vec())])
    }
}

/// A codec that misbehaves in the way its name says.
struct Broken {
    desc: CodecDescriptor,
    behavior: Behavior,
}

#[derive(Clone, Copy)]
enum Behavior {
    /// Emits one output more than declared.
    ExtraOutput,
    /// Decodes into nothing.
    LosesInputs,
    /// Fails to encode.
    Fails,
}

impl Broken {
    fn new(id: u32, behavior: Behavior) -> Self {
        Self {
            desc: CodecDescriptor::new(id, format!("broken_{}", id))
                .inputs([TypeMask::SERIAL])
                .outputs([StreamKind::Serial]),
            behavior,
        }
    }
}

impl Codec for Broken {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        match self.behavior {
            Behavior::ExtraOutput => Ok(Encoded::new(vec![inputs[0].clone(), inputs[0].clone()])),
            Behavior::LosesInputs => Ok(Encoded::new(inputs)),
            Behavior::Fails => Err(ZstrongError::Custom("boom".to_string())),
        }
    }

    fn decode(&self, fixed: Vec<Stream>, _: Vec<Stream>, _: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        match self.behavior {
            Behavior::LosesInputs => Ok(Vec::new()),
            _ => Ok(fixed),
        }
    }
}

/// Numeric u32 in, numeric u32 out, every value incremented.
struct PlusOneU32(CodecDescriptor);

impl PlusOneU32 {
    fn new() -> Self {
        PlusOneU32(
            CodecDescriptor::new(72, "plus_one_u32")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric]),
        )
    }
}

impl Codec for PlusOneU32 {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.0
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let values: Vec<u32> = inputs[0].as_numeric::<u32>()?.iter().map(|v| v.wrapping_add(1)).collect();
        Ok(Encoded::new(vec![Stream::numeric(&values)]))
    }

    fn decode(&self, fixed: Vec<Stream>, _: Vec<Stream>, _: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        let values: Vec<u32> = fixed[0].as_numeric::<u32>()?.iter().map(|v| v.wrapping_sub(1)).collect();
        Ok(vec![Stream::numeric(&values)])
    }
}

/// Writes its output through a writer but commits one element more than it wrote.
struct OverCommitting(CodecDescriptor);

impl OverCommitting {
    fn new() -> Self {
        OverCommitting(
            CodecDescriptor::new(71, "over_committing")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric]),
        )
    }
}

impl Codec for OverCommitting {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.0
    }

    fn encode(&self, inputs: Vec<Stream>, _: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let values = inputs[0].as_numeric::<u32>()?;
        let mut writer = StreamWriter::new(StreamKind::Numeric, 4)?;
        writer.reserve(values.len());
        for v in values.iter() {
            writer.write(&v.to_le_bytes());
        }
        writer.commit(values.len() + 1);
        Ok(Encoded::from_writers(vec![writer], Vec::new()))
    }

    fn decode(&self, fixed: Vec<Stream>, _: Vec<Stream>, _: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        Ok(fixed)
    }
}

/// Registers `codec` and builds `codec -> store` as the starting graph.
fn compressor_with(codec: Arc<dyn Codec>) -> (Compressor, GraphId) {
    let mut compressor = Compressor::new();
    let id = compressor.register_custom_codec(Arc::clone(&codec)).unwrap();
    let successors = vec![standard::STORE; codec.descriptor().num_successors()];
    let graph = compressor
        .build_static_graph(id, &successors, LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();
    (compressor, graph)
}

fn decompressor_with(codecs: Vec<Arc<dyn Codec>>) -> Decompressor {
    let mut decompressor = Decompressor::new();
    for codec in codecs {
        decompressor.register_custom_codec(codec).unwrap();
    }
    decompressor
}

fn mixed_inputs() -> Vec<Stream> {
    vec![
        Stream::serial(b"hello graph world, hello graph world".to_vec()),
        Stream::numeric(&[1u16, 2, 3, 65535, 2, 3]),
        Stream::fixed_field(b"abcdefghi".to_vec(), 3).unwrap(),
        Stream::from_fields(["alpha", "", "gamma", "alpha"]).unwrap(),
    ]
}

/// Picks successor `first byte % n`; empty streams go to 0.
struct FirstByteSelector;

impl Selector for FirstByteSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new("first_byte", TypeMask::SERIAL)
    }

    fn select(&self, _: &SelectorState<'_>, input: &Stream, successors: &[GraphId]) -> Result<usize, ZstrongError> {
        let first = input.content().first().copied().unwrap_or(0) as usize;
        Ok(first % successors.len())
    }
}

/// Always answers one past the last successor.
struct OutOfRangeSelector;

impl Selector for OutOfRangeSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new("out_of_range", TypeMask::ANY)
    }

    fn select(&self, _: &SelectorState<'_>, _: &Stream, successors: &[GraphId]) -> Result<usize, ZstrongError> {
        Ok(successors.len())
    }
}

// ================================================================================
// Scenarios
// ================================================================================

#[test]
fn test_store_round_trip_of_every_kind() {
    let mut compressor = Compressor::new();
    compressor.select_starting_graph(standard::STORE).unwrap();
    let compressed = compressor.compress(mixed_inputs()).unwrap();

    let info = peek_info(&compressed).unwrap();
    assert_eq!(info.nb_inputs, 4);
    assert_eq!(info.nb_transforms, 0);
    assert_eq!(info.nb_stored, 4);
    assert_eq!(Decompressor::new().decompress(&compressed).unwrap(), mixed_inputs());
}

#[test]
fn test_generic_compress_round_trip_of_every_kind() {
    let compressed = Compressor::new().compress(mixed_inputs()).unwrap();
    assert_eq!(Decompressor::new().decompress(&compressed).unwrap(), mixed_inputs());
}

#[test]
fn test_constant_numeric_size_does_not_grow_with_count() {
    let compressor = Compressor::new();
    let small = compressor.compress(vec![Stream::numeric(&vec![7u32; 10])]).unwrap();
    let large = compressor.compress(vec![Stream::numeric(&vec![7u32; 100_000])]).unwrap();

    // Only the element count varint grows.
    assert!(large.len() <= small.len() + 4);
    assert_eq!(peek_info(&large).unwrap().nb_stored, 0);
    assert_eq!(
        Decompressor::new().decompress(&large).unwrap(),
        vec![Stream::numeric(&vec![7u32; 100_000])]
    );
}

#[test]
fn test_custom_codec_needs_registration_to_decode() {
    let (compressor, _) = compressor_with(Arc::new(PlusOne::new()));
    let data = b"abcabcabc".repeat(20);
    let compressed = compressor.compress_serial(&data).unwrap();

    let err = Decompressor::new().decompress(&compressed).unwrap_err();
    assert!(matches!(err, ZstrongError::UnknownCodec { id: 64 }));

    let decompressor = decompressor_with(vec![Arc::new(PlusOne::new())]);
    assert_eq!(decompressor.decompress_serial(&compressed).unwrap(), data);
}

#[test]
fn test_store_reports_one_output_of_the_original_size() {
    let mut compressor = Compressor::new();
    compressor.select_starting_graph(standard::STORE).unwrap();
    let data = b"hello world hello world";
    let compressed = compressor.compress_serial(data).unwrap();

    let info = peek_info(&compressed).unwrap();
    assert_eq!((info.nb_inputs, info.nb_transforms, info.nb_stored), (1, 0, 1));
    assert_eq!(info.payload_size, data.len());
    let container = CompressedContainer::from_bytes(&compressed, MAX_FORMAT_VERSION).unwrap();
    assert_eq!(container.stored[0].stream.byte_len(), data.len());
    assert_eq!(Decompressor::new().decompress_serial(&compressed).unwrap(), data);
}

#[test]
fn test_custom_numeric_codec_round_trip_and_registration() {
    let mut values = vec![0u32; 1000];
    values.extend([1, 2, 3]);
    let (compressor, _) = compressor_with(Arc::new(PlusOneU32::new()));
    let compressed = compressor.compress(vec![Stream::numeric(&values)]).unwrap();
    assert_eq!(peek_info(&compressed).unwrap().nb_transforms, 1);

    let decompressor = decompressor_with(vec![Arc::new(PlusOneU32::new())]);
    let restored = decompressor.decompress(&compressed).unwrap();
    assert_eq!(restored, vec![Stream::numeric(&values)]);
    assert_eq!(restored[0].as_numeric::<u32>().unwrap().last(), Some(&3));

    assert!(matches!(
        Decompressor::new().decompress(&compressed),
        Err(ZstrongError::UnknownCodec { id: 72 })
    ));

    let reserved = || {
        Arc::new(PlusOneU32(
            CodecDescriptor::new(10, "plus_one_reserved")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric]),
        ))
    };
    match Compressor::new().register_custom_codec(reserved()) {
        Err(ZstrongError::IdConflict(msg)) => assert!(msg.contains("reserved")),
        other => panic!("expected a reserved id conflict, got {:?}", other),
    }
    assert!(matches!(
        Decompressor::new().register_custom_codec(reserved()),
        Err(ZstrongError::IdConflict(_))
    ));
}

#[test]
fn test_descriptor_reproduces_custom_graphs_byte_for_byte() {
    let mut original = Compressor::new();
    let plus_one = original.register_custom_codec(Arc::new(PlusOne::new())).unwrap();
    let shifted = original
        .build_static_graph(plus_one, &[standard::ZSTD], LocalParams::new())
        .unwrap();
    let start = original
        .build_selector_graph("brute_force", &[standard::STORE, shifted], LocalParams::new())
        .unwrap();
    original.select_starting_graph(start).unwrap();
    let descriptor = original.serialize().unwrap();

    let load = || {
        let mut compressor = Compressor::new();
        compressor.register_custom_codec(Arc::new(PlusOne::new())).unwrap();
        compressor.deserialize(&descriptor).unwrap();
        compressor
    };
    let (first, second) = (load(), load());
    let data = b"0123456789".repeat(50);
    let expected = original.compress_serial(&data).unwrap();
    assert_eq!(first.compress_serial(&data).unwrap(), expected);
    assert_eq!(second.compress_serial(&data).unwrap(), expected);

    let unmet = Compressor::new().get_unmet_dependencies(&descriptor).unwrap();
    assert_eq!(unmet.codecs, vec!["plus_one".to_string()]);
}

// ================================================================================
// Trace, conservation and failures
// ================================================================================

#[test]
fn test_variable_outputs_round_trip() {
    let (compressor, _) = compressor_with(Arc::new(Chunks3::new()));
    let decompressor = decompressor_with(vec![Arc::new(Chunks3::new())]);

    let compressed = compressor.compress_serial(b"0123456789").unwrap();
    let container = CompressedContainer::from_bytes(&compressed, MAX_FORMAT_VERSION).unwrap();
    assert_eq!(container.transforms[0].nb_fixed_outputs, 0);
    assert_eq!(container.transforms[0].nb_variable_outputs, 4);
    assert_eq!(container.stored.len(), 4);
    assert_eq!(decompressor.decompress_serial(&compressed).unwrap(), b"0123456789");

    let empty = compressor.compress_serial(b"").unwrap();
    assert_eq!(decompressor.decompress_serial(&empty).unwrap(), b"");
}

#[test]
fn test_trace_with_a_missing_stream_is_rejected() {
    let (compressor, _) = compressor_with(Arc::new(Chunks3::new()));
    let decompressor = decompressor_with(vec![Arc::new(Chunks3::new())]);
    let compressed = compressor.compress_serial(b"0123456789").unwrap();

    let mut container = CompressedContainer::from_bytes(&compressed, MAX_FORMAT_VERSION).unwrap();
    container.stored.pop();
    assert!(matches!(
        decompressor.replay(container),
        Err(ZstrongError::FrameFormatError(_))
    ));
}

#[test]
fn test_multi_input_codec() {
    let mut compressor = Compressor::new();
    let concat = compressor.register_custom_codec(Arc::new(Concat2::new())).unwrap();
    let graph = compressor
        .build_static_graph(concat, &[standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();
    let decompressor = decompressor_with(vec![Arc::new(Concat2::new())]);

    let inputs = vec![Stream::serial(b"left side".to_vec()), Stream::serial(b"right".to_vec())];
    let compressed = compressor.compress(inputs.clone()).unwrap();
    assert_eq!(decompressor.decompress(&compressed).unwrap(), inputs);
    assert!(matches!(
        decompressor.decompress_serial(&compressed),
        Err(ZstrongError::InvalidParameter(_))
    ));

    let one = compressor.compress(vec![Stream::serial(b"alone".to_vec())]);
    assert!(matches!(one, Err(ZstrongError::InvalidGraph(_))));
}

#[test]
fn test_extra_output_violates_conservation() {
    let (compressor, _) = compressor_with(Arc::new(Broken::new(67, Behavior::ExtraOutput)));
    let err = compressor.compress_serial(b"data").unwrap_err();
    assert!(matches!(
        err,
        ZstrongError::ConservationViolation {
            codec: 67,
            expected: 1,
            found: 2
        }
    ));
}

#[test]
fn test_lost_inputs_violate_conservation_on_decode() {
    let codec = || Arc::new(Broken::new(68, Behavior::LosesInputs));
    let (compressor, _) = compressor_with(codec());
    let compressed = compressor.compress_serial(b"data").unwrap();
    let err = decompressor_with(vec![codec()]).decompress(&compressed).unwrap_err();
    assert!(matches!(err, ZstrongError::ConservationViolation { codec: 68, .. }));
}

#[test]
fn test_codec_failure_names_node_and_codec() {
    let (compressor, graph) = compressor_with(Arc::new(Broken::new(69, Behavior::Fails)));
    match compressor.compress_serial(b"data") {
        Err(ZstrongError::CodecEncodeFailure { node, codec, source }) => {
            assert_eq!(node, graph);
            assert_eq!(codec, 69);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("expected an encode failure, got {:?}", other),
    }
}

#[test]
fn test_writer_output_short_of_its_commit_is_incomplete() {
    let (compressor, graph) = compressor_with(Arc::new(OverCommitting::new()));
    match compressor.compress(vec![Stream::numeric(&[4u32, 5])]) {
        Err(ZstrongError::IncompleteOutput(msg)) => {
            assert!(msg.contains("over_committing"));
            assert!(msg.contains(&format!("node {}", graph)));
        }
        other => panic!("expected an incomplete output, got {:?}", other),
    }
}

#[test]
fn test_kind_mismatch_at_graph_entry() {
    let mut compressor = Compressor::new();
    let delta = compressor
        .build_static_graph(ids::DELTA_INT, &[standard::BITPACK], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(delta).unwrap();
    assert!(matches!(
        compressor.compress_serial(b"not numbers"),
        Err(ZstrongError::TypeMismatch { .. })
    ));
}

// ================================================================================
// Registration and versions
// ================================================================================

#[test]
fn test_duplicate_codec_registration_conflicts() {
    let mut decompressor = decompressor_with(vec![Arc::new(PlusOne::new())]);
    assert!(matches!(
        decompressor.register_custom_codec(Arc::new(PlusOne::new())),
        Err(ZstrongError::IdConflict(_))
    ));
    let mut compressor = Compressor::new();
    compressor.register_selector(Arc::new(FirstByteSelector)).unwrap();
    assert!(matches!(
        compressor.register_selector(Arc::new(FirstByteSelector)),
        Err(ZstrongError::IdConflict(_))
    ));
}

#[test]
fn test_format_version_gating() {
    let mut compressor = Compressor::new();
    compressor.select_starting_graph(standard::ENTROPY).unwrap();
    compressor.set_format_version(1).unwrap();
    assert!(matches!(
        compressor.compress_serial(b"entropy needs version two"),
        Err(ZstrongError::InvalidParameter(_))
    ));

    compressor.select_starting_graph(standard::ZSTD).unwrap();
    let old = compressor.compress_serial(b"old format").unwrap();
    assert_eq!(read_version(&old).unwrap(), 1);
    assert_eq!(Decompressor::new().decompress_serial(&old).unwrap(), b"old format");

    assert!(matches!(
        compressor.set_format_version(MAX_FORMAT_VERSION + 1),
        Err(ZstrongError::UnsupportedVersion { .. })
    ));

    let newest = Compressor::new().compress_serial(b"newest").unwrap();
    let pinned = Decompressor::new().with_max_format_version(2).unwrap();
    assert!(matches!(
        pinned.decompress(&newest),
        Err(ZstrongError::UnsupportedVersion { version: 3, .. })
    ));
    assert!(Decompressor::new().with_max_format_version(0).is_err());
}

// ================================================================================
// Selectors
// ================================================================================

#[test]
fn test_selector_is_deterministic_and_only_takes_one_branch() {
    let mut compressor = Compressor::new();
    compressor.register_selector(Arc::new(FirstByteSelector)).unwrap();
    let graph = compressor
        .build_selector_graph("first_byte", &[standard::STORE, standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();

    let even = b"b is 98".repeat(10);
    let odd = b"a is 97".repeat(10);
    let first = compressor.compress_serial(&even).unwrap();
    assert_eq!(compressor.compress_serial(&even).unwrap(), first);
    assert_eq!(compressor.clone().compress_serial(&even).unwrap(), first);

    assert_eq!(peek_info(&first).unwrap().nb_transforms, 0);
    assert_eq!(peek_info(&compressor.compress_serial(&odd).unwrap()).unwrap().nb_transforms, 1);
}

#[test]
fn test_out_of_range_choice() {
    let mut compressor = Compressor::new();
    compressor.register_selector(Arc::new(OutOfRangeSelector)).unwrap();
    let graph = compressor
        .build_selector_graph("out_of_range", &[standard::STORE, standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();
    assert!(matches!(
        compressor.compress_serial(b"x"),
        Err(ZstrongError::InvalidChoice {
            choice: 2,
            available: 2,
            ..
        })
    ));
}

#[test]
fn test_compress_selector_needs_its_four_successors() {
    let mut compressor = Compressor::new();
    let graph = compressor
        .build_selector_graph("compress", &[standard::CONSTANT, standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();
    // A variable-field stream would index successor 3, numeric ones successor 2.
    for input in [Stream::from_fields(["a", "bc"]).unwrap(), Stream::numeric(&[1u32, 9, 4])] {
        match compressor.compress(vec![input]) {
            Err(ZstrongError::InvalidParameter(msg)) => assert!(msg.contains("needs 4 successors")),
            other => panic!("expected an invalid parameter, got {:?}", other),
        }
    }
}

#[test]
fn test_training_selector_ignores_trial_sessions() {
    let training = Arc::new(TrainingSelector::new(Arc::new(FirstByteSelector), Arc::new(StatsFeatureGenerator)));
    let mut compressor = Compressor::new();
    compressor.register_selector(training.clone()).unwrap();
    let inner = compressor
        .build_selector_graph("first_byte", &[standard::STORE, standard::ZSTD], LocalParams::new())
        .unwrap();
    // brute_force tries both successors, so the inner selector runs in one trial
    // session and then again on the real path, where its zstd branch wins.
    let outer = compressor
        .build_selector_graph("brute_force", &[inner, standard::STORE], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(outer).unwrap();

    let data = b"a".repeat(500);
    let compressed = compressor.compress_serial(&data).unwrap();
    assert_eq!(Decompressor::new().decompress_serial(&compressed).unwrap(), data);

    let samples = training.samples().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].features["nbElts"], 500.0);
    assert_eq!(samples[0].targets.len(), 2);
}

#[test]
fn test_training_selector_records_every_successor() {
    let training = Arc::new(TrainingSelector::new(Arc::new(FirstByteSelector), Arc::new(StatsFeatureGenerator)));
    let mut compressor = Compressor::new();
    compressor.register_selector(training.clone()).unwrap();
    let graph = compressor
        .build_selector_graph("first_byte", &[standard::STORE, standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();

    let data = b"b".repeat(500);
    let compressed = compressor.compress_serial(&data).unwrap();
    compressor.compress_serial(b"another sample").unwrap();
    assert_eq!(Decompressor::new().decompress_serial(&compressed).unwrap(), data);

    let samples = training.samples().unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].targets.len(), 2);
    assert_eq!(samples[0].features["nbElts"], 500.0);
    // 500 identical bytes compress far better through zstd than stored.
    assert_eq!(samples[0].best_label(), Some("1"));
    assert!(training.export_json().unwrap().contains("targets"));
    assert_eq!(training.take_samples().unwrap().len(), 2);
    assert!(training.samples().unwrap().is_empty());
}

#[test]
fn test_ml_selector_routes_by_size() {
    let model = GbtModel::from_json(
        r#"{
            "classLabels": ["store", "zstd"],
            "featureLabels": ["nbElts"],
            "predictor": [[{
                "featureIdx": [0, -1, -1],
                "value": [100.0, 0.1, 0.9],
                "leftChildIdx": [1, -1, -1],
                "rightChildIdx": [2, -1, -1],
                "defaultLeft": [1, 0, 0]
            }]]
        }"#,
    )
    .unwrap();
    let selector = MlSelector::new("by_size", TypeMask::ANY, Arc::new(StatsFeatureGenerator), Arc::new(model));
    let mut compressor = Compressor::new();
    compressor.register_selector(Arc::new(selector)).unwrap();
    let graph = compressor
        .build_selector_graph("by_size", &[standard::STORE, standard::ZSTD], LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(graph).unwrap();

    let small = compressor.compress_serial(&[1u8; 10]).unwrap();
    let large = compressor.compress_serial(&[1u8; 1000]).unwrap();
    assert_eq!(peek_info(&small).unwrap().nb_transforms, 0);
    assert_eq!(peek_info(&large).unwrap().nb_transforms, 1);
}

// ================================================================================
// Function graphs
// ================================================================================

/// Splits the input into 4-byte segments: the first is stored, the rest go
/// to custom graph 0.
struct HeadAndTail;

impl FunctionGraph for HeadAndTail {
    fn description(&self) -> FunctionGraphDescription {
        FunctionGraphDescription::new("head_and_tail", [TypeMask::SERIAL])
    }

    fn run(&self, ctx: &mut GraphCtx<'_, '_>, inputs: Vec<Edge>) -> Result<(), ZstrongError> {
        let tail_graph = ctx.custom_graphs()[0];
        let segments = ctx.run_codec(ids::SPLIT_N, &inputs, LocalParams::new().with_int(0, 4))?;
        for (i, segment) in segments.into_iter().enumerate() {
            let destination = if i == 0 { standard::STORE } else { tail_graph };
            ctx.set_destination(segment, destination)?;
        }
        Ok(())
    }
}

/// Misuses the context in one of several ways.
struct Misbehaving(&'static str);

impl FunctionGraph for Misbehaving {
    fn description(&self) -> FunctionGraphDescription {
        FunctionGraphDescription::new(self.0, [TypeMask::ANY])
    }

    fn run(&self, ctx: &mut GraphCtx<'_, '_>, inputs: Vec<Edge>) -> Result<(), ZstrongError> {
        match self.0 {
            "forgets" => Ok(()),
            "routes_twice" => {
                ctx.set_destination(inputs[0], standard::STORE)?;
                ctx.set_destination(inputs[0], standard::STORE)
            }
            "loops" => {
                let node = ctx.node();
                ctx.set_destination(inputs[0], node)
            }
            _ => Ok(()),
        }
    }
}

fn function_compressor(graph: Arc<dyn FunctionGraph>, custom_graphs: &[GraphId]) -> Compressor {
    let mut compressor = Compressor::new();
    let name = graph.description().name;
    compressor.register_function_graph(graph).unwrap();
    let node = compressor
        .build_function_graph(&name, custom_graphs, LocalParams::new())
        .unwrap();
    compressor.select_starting_graph(node).unwrap();
    compressor
}

#[test]
fn test_function_graph_routes_streams() {
    let compressor = function_compressor(Arc::new(HeadAndTail), &[standard::ZSTD]);
    let data: Vec<u8> = (0..100u8).collect();
    let compressed = compressor.compress_serial(&data).unwrap();

    // One split, then one zstd per segment after the first.
    let info = peek_info(&compressed).unwrap();
    assert_eq!(info.nb_transforms, 25);
    assert_eq!(info.nb_stored, 25);
    assert_eq!(Decompressor::new().decompress_serial(&compressed).unwrap(), data);
}

#[test]
fn test_function_graph_must_route_every_stream() {
    for name in ["forgets", "routes_twice"] {
        let compressor = function_compressor(Arc::new(Misbehaving(name)), &[]);
        assert!(
            matches!(compressor.compress_serial(b"x"), Err(ZstrongError::InvalidGraph(_))),
            "{}",
            name
        );
    }
}

#[test]
fn test_function_graph_loop_is_bounded() {
    let compressor = function_compressor(Arc::new(Misbehaving("loops")), &[]);
    assert!(matches!(
        compressor.compress_serial(b"x"),
        Err(ZstrongError::InvalidGraph(_))
    ));
}

// ================================================================================
// Concurrency
// ================================================================================

#[test]
fn test_shared_compressor_across_threads() {
    let compressor = Arc::new(Compressor::new());
    let expected = compressor.compress(mixed_inputs()).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let compressor = Arc::clone(&compressor);
                scope.spawn(move || compressor.compress(mixed_inputs()).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
