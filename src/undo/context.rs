use std::collections::{BTreeMap, HashMap};

pub const PAIR_SPLIT: &str = "&";
pub const KV_SPLIT: &str = "=";

pub const SERIALIZER_KEY: &str = "serializer";
pub const COMPRESSOR_TYPE_KEY: &str = "compressorType";

/// Decode an undo row context such as `serializer=json&compressorType=NONE`.
///
/// Pairs without a `=` are skipped; the value keeps any further `=`.
pub fn decode_map(context: &str) -> HashMap<String, String> {
    if context.is_empty() {
        return HashMap::new();
    }

    context
        .split(PAIR_SPLIT)
        .filter_map(|pair| pair.split_once(KV_SPLIT))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Inverse of `decode_map`, keys in sorted order.
pub fn encode_map(map: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&String, &String> = map.iter().collect();
    sorted
        .into_iter()
        .map(|(k, v)| format!("{k}{KV_SPLIT}{v}"))
        .collect::<Vec<_>>()
        .join(PAIR_SPLIT)
}

pub fn serializer(context: &HashMap<String, String>) -> Option<&str> {
    context.get(SERIALIZER_KEY).map(String::as_str)
}

pub fn compressor_type(context: &HashMap<String, String>) -> Option<&str> {
    context.get(COMPRESSOR_TYPE_KEY).map(String::as_str)
}
