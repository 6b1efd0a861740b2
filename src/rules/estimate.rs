//! Allocator and object size model used by the byte estimators.
//!
//! Numbers follow a 64-bit server built with jemalloc. They are estimates;
//! the real footprint also depends on fragmentation and server version.

/// `robj` header.
pub const ROBJ: u64 = 16;

/// Main dictionary entry (key, value, next pointers).
pub const DICT_ENTRY: u64 = 24;

/// Embedded strings up to this length share one allocation with the `robj`.
pub const EMBSTR_MAX: u64 = 44;

/// Round a request up to its jemalloc size class.
///
/// 8, then 16-byte steps up to 128, then four classes per power of two.
pub fn jemalloc_size(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    if n <= 8 {
        return 8;
    }
    if n <= 128 {
        return round_up(n, 16);
    }

    let lg = 64 - (n - 1).leading_zeros() as u64;
    round_up(n, 1 << (lg - 3))
}

fn round_up(n: u64, step: u64) -> u64 {
    n.div_ceil(step) * step
}

/// Header bytes of an SDS string of length `len`.
pub fn sds_header(len: u64) -> u64 {
    match len {
        0..=31 => 1,
        32..=255 => 3,
        256..=65_535 => 5,
        65_536..=4_294_967_295 => 9,
        _ => 17,
    }
}

/// Allocated bytes of an SDS string holding `len` bytes.
pub fn sds_alloc(len: u64) -> u64 {
    jemalloc_size(sds_header(len) + len + 1)
}

/// Allocated bytes for a string value with the given encoding.
pub fn string_value_size(len: u64, encoding: &str) -> u64 {
    match encoding {
        "int" => jemalloc_size(ROBJ),
        "embstr" => jemalloc_size(ROBJ + 3 + len + 1),
        _ => jemalloc_size(ROBJ) + sds_alloc(len),
    }
}

/// Approximate bytes per element of a container in a given encoding.
pub fn element_overhead(encoding: &str, hash_pairs: bool) -> u64 {
    let per_entry = match encoding {
        "ziplist" | "listpack" => 11,
        "intset" => 8,
        "quicklist" => 12,
        "linkedlist" => jemalloc_size(24) + jemalloc_size(ROBJ),
        // dict entry plus small sds for member (and value)
        "hashtable" => jemalloc_size(DICT_ENTRY) + 16,
        _ => 16,
    };

    if hash_pairs && encoding != "hashtable" {
        per_entry * 2
    } else if hash_pairs {
        per_entry + 16
    } else {
        per_entry
    }
}

/// `useful / real` style ratio with two decimals; 0 when `denominator` is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    ((numerator as f64 / denominator as f64) * 100.0).round() / 100.0
}

/// Min, max and mean of a sample; zeros for an empty sample.
pub fn min_max_avg(values: &[u64]) -> (u64, u64, f64) {
    if values.is_empty() {
        return (0, 0, 0.0);
    }

    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    let sum: u64 = values.iter().sum();
    let avg = (sum as f64 / values.len() as f64 * 100.0).round() / 100.0;
    (min, max, avg)
}
