//! Static documents which never really change except for some parameters,
//! like 'pack.mcmeta' and the function tag files

use serde_json::{json, Value};

/// A minecraft function tag document listing a single entry
pub fn template_tag(entry: &str) -> Value {
    json!({
        "values": [entry],
    })
}

pub fn template_pack_mcmeta(pack_format: u32, description: &str) -> String {
    let value = json!({
        "pack": {
            "pack_format": pack_format,
            "description": description,
        }
    });
    serde_json::to_string_pretty(&value).expect("Json values always serialize")
}
