use crate::error::ZstrongError;
use crate::stream::Stream;
use crate::types::StreamKind;

/// Builds a stream incrementally: reserve, write, commit an element count, seal.
///
/// Sealing fails with `IncompleteOutput` if no element count was committed or
/// if the written content does not match the committed count.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    kind: StreamKind,
    element_width: usize,
    data: Vec<u8>,
    committed: Option<usize>,
    field_lengths: Option<Vec<u32>>,
}

impl StreamWriter {
    pub fn new(kind: StreamKind, element_width: usize) -> Result<Self, ZstrongError> {
        kind.validate_width(element_width)?;
        Ok(Self {
            kind,
            element_width,
            data: Vec::new(),
            committed: None,
            field_lengths: None,
        })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Reserves capacity for `num_elements` more elements.
    pub fn reserve(&mut self, num_elements: usize) {
        self.data.reserve(num_elements * self.element_width);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Direct access to the content buffer for kernels that write in place.
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Records the field lengths of a variable-field stream.
    pub fn set_field_lengths(&mut self, lengths: Vec<u32>) -> Result<(), ZstrongError> {
        if self.kind != StreamKind::VariableField {
            return Err(ZstrongError::type_mismatch(
                "stream writer field lengths",
                StreamKind::VariableField,
                self.kind,
            ));
        }
        self.field_lengths = Some(lengths);
        Ok(())
    }

    /// Declares how many elements the stream holds. Must happen before sealing.
    pub fn commit(&mut self, num_elements: usize) {
        self.committed = Some(num_elements);
    }

    pub fn seal(self) -> Result<Stream, ZstrongError> {
        let committed = self.committed.ok_or_else(|| {
            ZstrongError::IncompleteOutput(format!(
                "{} stream sealed without committing an element count",
                self.kind
            ))
        })?;

        let stream = match self.kind {
            StreamKind::VariableField => {
                let lengths = self.field_lengths.ok_or_else(|| {
                    ZstrongError::IncompleteOutput(
                        "variable_field stream sealed without field lengths".to_string(),
                    )
                })?;
                if lengths.len() != committed {
                    return Err(ZstrongError::IncompleteOutput(format!(
                        "committed {} fields but {} lengths were written",
                        committed,
                        lengths.len()
                    )));
                }
                let declared: u64 = lengths.iter().map(|&l| l as u64).sum();
                if declared != self.data.len() as u64 {
                    return Err(ZstrongError::IncompleteOutput(format!(
                        "field lengths cover {} bytes but {} bytes were written",
                        declared,
                        self.data.len()
                    )));
                }
                Stream::variable_field(self.data, lengths)?
            }
            kind => {
                let expected = committed * self.element_width;
                if self.data.len() != expected {
                    return Err(ZstrongError::IncompleteOutput(format!(
                        "committed {} elements ({} bytes) but {} bytes were written",
                        committed,
                        expected,
                        self.data.len()
                    )));
                }
                Stream::fixed_width(kind, self.data, self.element_width)?
            }
        };
        Ok(stream)
    }
}

/// A finished stream is a writer whose element count is already committed.
impl From<Stream> for StreamWriter {
    fn from(stream: Stream) -> Self {
        let (kind, element_width, committed) = (stream.kind(), stream.element_width(), stream.len());
        let (data, field_lengths) = stream.into_parts();
        Self {
            kind,
            element_width,
            data,
            committed: Some(committed),
            field_lengths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_without_commit_is_incomplete() {
        let mut writer = StreamWriter::new(StreamKind::Serial, 1).unwrap();
        writer.write(b"hello");
        assert!(matches!(writer.seal(), Err(ZstrongError::IncompleteOutput(_))));
    }

    #[test]
    fn test_seal_with_mismatched_count_is_incomplete() {
        let mut writer = StreamWriter::new(StreamKind::Numeric, 4).unwrap();
        writer.write(&[0u8; 6]);
        writer.commit(2);
        assert!(matches!(writer.seal(), Err(ZstrongError::IncompleteOutput(_))));
    }

    #[test]
    fn test_committed_numeric_stream() {
        let mut writer = StreamWriter::new(StreamKind::Numeric, 2).unwrap();
        writer.reserve(2);
        writer.write(&1u16.to_le_bytes());
        writer.write(&2u16.to_le_bytes());
        writer.commit(2);
        let stream = writer.seal().unwrap();
        assert_eq!(stream.numeric_values().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_finished_stream_reseals_unchanged() {
        let fields = Stream::from_fields(["ab", "", "cde"]).unwrap();
        let numeric = Stream::numeric(&[5u32, 6, 7]);
        assert_eq!(StreamWriter::from(fields.clone()).seal().unwrap(), fields);
        assert_eq!(StreamWriter::from(numeric.clone()).seal().unwrap(), numeric);
    }

    #[test]
    fn test_variable_field_writer() {
        let mut writer = StreamWriter::new(StreamKind::VariableField, 0).unwrap();
        writer.write(b"abcde");
        writer.set_field_lengths(vec![2, 3]).unwrap();
        writer.commit(2);
        let stream = writer.seal().unwrap();
        assert_eq!(stream.variable_fields().unwrap(), vec![&b"ab"[..], &b"cde"[..]]);
    }
}
