//! This module contains the kernel for tokenization (dictionary encoding) of
//! integer streams.
//!
//! The input is split into an alphabet of distinct values and a stream of
//! indices into that alphabet. It is highly effective for low-cardinality data.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::error::ZstrongError;

/// Splits `input_slice` into `(alphabet, indices)`.
///
/// With `sort` the alphabet is in ascending order, which makes it a good
/// candidate for delta coding; otherwise it is in order of first appearance.
pub fn encode<T>(input_slice: &[T], sort: bool) -> (Vec<T>, Vec<u64>)
where
    T: Copy + Eq + Hash + Ord,
{
    let mut alphabet: Vec<T> = Vec::new();
    let mut positions = HashMap::<T, u64>::new();
    for &value in input_slice {
        positions.entry(value).or_insert_with(|| {
            alphabet.push(value);
            (alphabet.len() - 1) as u64
        });
    }

    if sort {
        alphabet.sort_unstable();
        for (idx, value) in alphabet.iter().enumerate() {
            positions.insert(*value, idx as u64);
        }
    }

    // Every value was inserted above, so the lookup cannot miss.
    let indices = input_slice
        .iter()
        .map(|v| positions.get(v).copied().unwrap_or_default())
        .collect();
    (alphabet, indices)
}

/// Rebuilds the original values from an alphabet and its indices.
pub fn decode<T: Copy>(alphabet: &[T], indices: &[u64]) -> Result<Vec<T>, ZstrongError> {
    indices
        .iter()
        .map(|&idx| {
            usize::try_from(idx)
                .ok()
                .and_then(|i| alphabet.get(i).copied())
                .ok_or_else(|| {
                    ZstrongError::InvalidParameter(format!(
                        "token index {} out of range for alphabet of {}",
                        idx,
                        alphabet.len()
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_alphabet() {
        let values: Vec<u32> = vec![30, 10, 30, 20, 10];
        let (alphabet, indices) = encode(&values, true);
        assert_eq!(alphabet, vec![10, 20, 30]);
        assert_eq!(indices, vec![2, 0, 2, 1, 0]);
        assert_eq!(decode(&alphabet, &indices).unwrap(), values);
    }

    #[test]
    fn test_first_appearance_alphabet() {
        let values: Vec<u16> = vec![7, 7, 3, 9, 3];
        let (alphabet, indices) = encode(&values, false);
        assert_eq!(alphabet, vec![7, 3, 9]);
        assert_eq!(indices, vec![0, 0, 1, 2, 1]);
    }

    #[test]
    fn test_out_of_range_index() {
        assert!(decode(&[1u8, 2], &[0, 2]).is_err());
    }
}
