//! The codec registry: the mapping from codec ids and names to implementations.
//!
//! Every `Compressor` and every `Decompressor` owns one. Built-ins are present
//! from construction; custom codecs must be registered identically on both
//! sides for a container to decode.

use hashbrown::HashMap;
use std::sync::Arc;

use crate::codecs::builtin;
use crate::codecs::Codec;
use crate::error::ZstrongError;
use crate::types::CodecId;

#[derive(Clone)]
pub struct CodecRegistry {
    by_id: HashMap<u32, Arc<dyn Codec>>,
    by_name: HashMap<String, u32>,
}

impl CodecRegistry {
    /// An empty registry with no codecs, not even the built-ins.
    pub fn empty() -> Self {
        Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// A registry holding every built-in codec.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for codec in builtin::all() {
            let desc = codec.descriptor();
            registry.by_name.insert(desc.name.clone(), desc.id.0);
            registry.by_id.insert(desc.id.0, codec);
        }
        registry
    }

    /// Registers a caller-supplied codec.
    ///
    /// # Errors
    /// `IdConflict` if the id is in the reserved range, or if the id or name is
    /// already registered.
    pub fn register_custom(&mut self, codec: Arc<dyn Codec>) -> Result<CodecId, ZstrongError> {
        let desc = codec.descriptor();
        if desc.id.is_reserved() {
            return Err(ZstrongError::IdConflict(format!(
                "codec id {} is reserved for built-in codecs (custom ids start at {})",
                desc.id,
                CodecId::FIRST_CUSTOM
            )));
        }
        if self.by_id.contains_key(&desc.id.0) {
            return Err(ZstrongError::IdConflict(format!(
                "codec id {} is already registered",
                desc.id
            )));
        }
        if self.by_name.contains_key(&desc.name) {
            return Err(ZstrongError::IdConflict(format!(
                "codec name '{}' is already registered",
                desc.name
            )));
        }
        if desc.input_types.is_empty() {
            return Err(ZstrongError::InvalidParameter(format!(
                "codec '{}' declares no inputs",
                desc.name
            )));
        }
        let id = desc.id;
        log::debug!("Registered custom codec '{}' with id {}", desc.name, id);
        self.by_name.insert(desc.name.clone(), id.0);
        self.by_id.insert(id.0, codec);
        Ok(id)
    }

    pub fn get(&self, id: CodecId) -> Option<&Arc<dyn Codec>> {
        self.by_id.get(&id.0)
    }

    /// Looks up a codec, failing with `UnknownCodec` if it is not registered.
    pub fn require(&self, id: CodecId) -> Result<&Arc<dyn Codec>, ZstrongError> {
        self.get(id).ok_or(ZstrongError::UnknownCodec { id: id.0 })
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn Codec>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains(&self, id: CodecId) -> bool {
        self.by_id.contains_key(&id.0)
    }

    /// Ids of all registered custom codecs, sorted.
    pub fn custom_ids(&self) -> Vec<CodecId> {
        let mut ids: Vec<CodecId> = self
            .by_id
            .keys()
            .map(|&id| CodecId(id))
            .filter(|id| !id.is_reserved())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<(&u32, &String)> = self.by_name.iter().map(|(n, id)| (id, n)).collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}
