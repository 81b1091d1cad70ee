//! This module contains the kernel for order-0 range Asymmetric Numeral Systems
//! (rANS) entropy coding of byte streams.
//!
//! rANS operates as a last-in, first-out state machine: symbols are encoded in
//! reverse so the decoder can emit them in order. The output is
//! self-describing:
//!
//! ```text
//! varint  original length
//! varint  number of distinct symbols
//! (u8 symbol, varint normalized frequency) * n   -- frequencies sum to 4096
//! u32 LE  final encoder state
//! [u8]    renormalization bytes, in decoder read order
//! ```

use std::io::Cursor;

use crate::error::ZstrongError;
use crate::kernels::leb128;

// --- rANS Constants ---
const SCALE_BITS: u32 = 12;
const SCALE: u32 = 1 << SCALE_BITS; // 4096
const STATE_LOWER_BOUND: u32 = 1 << 23;

/// Encoding information for a single byte symbol.
#[derive(Debug, Clone, Copy, Default)]
struct AnsSymbol {
    freq: u32,
    cum_freq: u32,
}

//==================================================================================
// 1. Frequency Model
//==================================================================================

/// Counts symbols and scales their frequencies to sum exactly to `SCALE`,
/// keeping every present symbol at a frequency of at least one.
fn normalize_frequencies(input_bytes: &[u8]) -> [u32; 256] {
    let mut counts = [0u64; 256];
    for &byte in input_bytes {
        counts[byte as usize] += 1;
    }
    let total = input_bytes.len() as u64;

    let mut freqs = [0u32; 256];
    for (sym, &count) in counts.iter().enumerate() {
        if count > 0 {
            freqs[sym] = ((count * SCALE as u64) / total).max(1) as u32;
        }
    }

    let sum: i64 = freqs.iter().map(|&f| f as i64).sum();
    let mut diff = SCALE as i64 - sum;
    if diff > 0 {
        if let Some(top) = (0..256).max_by_key(|&s| (freqs[s], std::cmp::Reverse(s))) {
            freqs[top] += diff as u32;
        }
    }
    while diff < 0 {
        // Take from the largest symbol that can give something up.
        let Some(top) = (0..256)
            .filter(|&s| freqs[s] > 1)
            .max_by_key(|&s| (freqs[s], std::cmp::Reverse(s)))
        else {
            break;
        };
        let take = ((freqs[top] - 1) as i64).min(-diff);
        freqs[top] -= take as u32;
        diff += take;
    }
    freqs
}

fn build_symbols(freqs: &[u32; 256]) -> [AnsSymbol; 256] {
    let mut table = [AnsSymbol::default(); 256];
    let mut cum_freq = 0;
    for (sym, &freq) in freqs.iter().enumerate() {
        table[sym] = AnsSymbol { freq, cum_freq };
        cum_freq += freq;
    }
    table
}

//==================================================================================
// 2. Public API
//==================================================================================

pub fn encode(input_bytes: &[u8], output_buf: &mut Vec<u8>) -> Result<(), ZstrongError> {
    output_buf.clear();
    leb128::encode_one(input_bytes.len() as u64, output_buf)?;
    if input_bytes.is_empty() {
        return Ok(());
    }

    let freqs = normalize_frequencies(input_bytes);
    let symbols = build_symbols(&freqs);

    let present: Vec<usize> = (0..256).filter(|&s| freqs[s] > 0).collect();
    leb128::encode_one(present.len() as u64, output_buf)?;
    for &sym in &present {
        output_buf.push(sym as u8);
        leb128::encode_one(freqs[sym], output_buf)?;
    }

    let mut state = STATE_LOWER_BOUND;
    let mut emitted = Vec::with_capacity(input_bytes.len() / 2);
    for &byte in input_bytes.iter().rev() {
        let symbol = symbols[byte as usize];
        let state_max = ((STATE_LOWER_BOUND >> SCALE_BITS) << 8) * symbol.freq;
        while state >= state_max {
            emitted.push((state & 0xFF) as u8);
            state >>= 8;
        }
        state = ((state / symbol.freq) << SCALE_BITS) + (state % symbol.freq) + symbol.cum_freq;
    }

    output_buf.extend_from_slice(&state.to_le_bytes());
    output_buf.extend(emitted.iter().rev());
    Ok(())
}

pub fn decode(input_bytes: &[u8]) -> Result<Vec<u8>, ZstrongError> {
    let mut cursor = Cursor::new(input_bytes);
    let original_len: u64 = leb128::decode_one(&mut cursor)?;
    if original_len == 0 {
        return Ok(Vec::new());
    }

    let num_symbols: u64 = leb128::decode_one(&mut cursor)?;
    if num_symbols == 0 || num_symbols > 256 {
        return Err(ZstrongError::EntropyError(format!(
            "invalid symbol count {}",
            num_symbols
        )));
    }
    let mut freqs = [0u32; 256];
    for _ in 0..num_symbols {
        let pos = cursor.position() as usize;
        let sym = *input_bytes
            .get(pos)
            .ok_or_else(|| ZstrongError::EntropyError("truncated frequency table".to_string()))?;
        cursor.set_position(pos as u64 + 1);
        let freq: u32 = leb128::decode_one(&mut cursor)?;
        if freq == 0 || freqs[sym as usize] != 0 {
            return Err(ZstrongError::EntropyError(format!(
                "invalid frequency entry for symbol {}",
                sym
            )));
        }
        freqs[sym as usize] = freq;
    }
    let total: u64 = freqs.iter().map(|&f| f as u64).sum();
    if total != SCALE as u64 {
        return Err(ZstrongError::EntropyError(format!(
            "frequencies sum to {}, expected {}",
            total, SCALE
        )));
    }
    let symbols = build_symbols(&freqs);

    let mut slot_to_symbol = vec![0u8; SCALE as usize];
    for (sym, entry) in symbols.iter().enumerate() {
        let start = entry.cum_freq as usize;
        let end = start + entry.freq as usize;
        slot_to_symbol[start..end].fill(sym as u8);
    }

    let pos = cursor.position() as usize;
    let state_bytes: [u8; 4] = input_bytes
        .get(pos..pos + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ZstrongError::EntropyError("missing final state".to_string()))?;
    let mut state = u32::from_le_bytes(state_bytes);
    if state < STATE_LOWER_BOUND {
        return Err(ZstrongError::EntropyError("corrupt initial state".to_string()));
    }
    let payload = &input_bytes[pos + 4..];
    let mut next = 0usize;

    let capacity = usize::try_from(original_len)
        .map_err(|_| ZstrongError::EntropyError("length overflows usize".to_string()))?;
    let mut output = Vec::with_capacity(capacity.min(1 << 24));
    for _ in 0..capacity {
        let slot = state & (SCALE - 1);
        let sym = slot_to_symbol[slot as usize];
        let entry = symbols[sym as usize];
        state = entry.freq * (state >> SCALE_BITS) + slot - entry.cum_freq;
        while state < STATE_LOWER_BOUND {
            let byte = *payload
                .get(next)
                .ok_or_else(|| ZstrongError::EntropyError("truncated payload".to_string()))?;
            next += 1;
            state = (state << 8) | byte as u32;
        }
        output.push(sym);
    }

    if next != payload.len() || state != STATE_LOWER_BOUND {
        return Err(ZstrongError::EntropyError(
            "payload did not decode to the initial state".to_string(),
        ));
    }
    Ok(output)
}
