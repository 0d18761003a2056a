/// Smallest byte string strictly greater than every key carrying `key` as a
/// prefix, i.e. the exclusive upper bound of the prefix range
/// `[key, prefix_range_end(key))`.
///
/// Computed by incrementing the last byte that is not `0xFF` and truncating
/// everything after it: `b"a"` maps to `b"b"`, `b"ab"` to `b"ac"`,
/// `b"a\xff"` to `b"b"`.
///
/// # Panics
/// Panics if `key` is empty or consists entirely of `0xFF` bytes: no byte
/// string bounds those prefixes from above.
pub fn prefix_range_end(key: &[u8]) -> Vec<u8> {
    let last_incrementable = key
        .iter()
        .rposition(|&b| b != 0xFF)
        .expect("prefix has no upper bound: key is empty or all 0xFF");

    let mut end = key[..=last_incrementable].to_vec();
    end[last_incrementable] += 1;
    end
}

/// Accept an endpoint either bare like 127.0.0.1:2379 or as a full URL.
pub(crate) fn endpoint_str(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
