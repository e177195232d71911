use crate::grid::GridLevel;

/// Cloudflare KV rejects keys longer than this many bytes.
pub const MAX_KV_KEY_BYTES: usize = 512;

/// Page-cache key: `{level}_{url}`.
///
/// The level is part of the key because one URL renders differently per
/// level. Oversized keys keep the level prefix and hash the URL.
pub fn page_key(level: GridLevel, url: &str) -> String {
    let key = format!("{}_{}", level, url);
    if key.len() <= MAX_KV_KEY_BYTES {
        key
    } else {
        format!("{}_{:016x}", level, seahash::hash(url.as_bytes()))
    }
}
