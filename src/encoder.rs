use base64::{engine::general_purpose::STANDARD, Engine as _};

// Chunk length must be a multiple of 3 so each chunk encodes without padding
// and the per-chunk outputs concatenate into one valid base64 string.
const ENCODE_CHUNK_BYTES: usize = 8190;

/// Standard base64 over the full byte sequence, produced chunk by chunk so no
/// intermediate buffer grows beyond a few KiB ahead of the output string.
pub fn encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        STANDARD.encode_string(chunk, &mut encoded);
    }
    encoded
}

/// Wraps the encoded bytes as a self-contained `data:` URI.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", encode(bytes))
}
