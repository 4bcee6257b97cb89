//! JSON state blobs: one flat `name -> value` map per storage key.

use crate::StorageArea;
use ps_core::ShellError;
use ps_core::ShellResult;
use serde_json::Map;
use serde_json::Value;

pub type StateBlob = Map<String, Value>;

/// Reads the blob under `key`. A missing key is an empty blob; a value that is
/// not a JSON object is an error.
pub fn read_blob(area: &dyn StorageArea, key: &str) -> ShellResult<StateBlob> {
    let Some(raw) = area.get_item(key)? else {
        return Ok(StateBlob::new());
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(blob)) => Ok(blob),
        Ok(other) => Err(ShellError::new(
            "storage.blob_not_object",
            format!("`{key}` holds a JSON {} instead of an object", json_kind(&other)),
        )),
        Err(error) => Err(ShellError::new(
            "storage.blob_invalid_json",
            format!("`{key}` is not valid JSON: {error}"),
        )),
    }
}

pub fn write_blob(area: &dyn StorageArea, key: &str, blob: &StateBlob) -> ShellResult<()> {
    let encoded = serde_json::to_string(blob).map_err(|error| {
        ShellError::new(
            "storage.blob_encode_failed",
            format!("failed to encode `{key}`: {error}"),
        )
    })?;
    area.set_item(key, &encoded)
}

/// Merges `overlay` into `target`.
///
/// Objects merge key by key, recursively. Arrays are unioned: every overlay
/// item comes first, followed by target items the overlay does not contain.
/// Anything else is replaced by the overlay value.
pub fn merge_recursive(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(existing) => merge_recursive(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(overlay)) => {
            let mut merged = overlay.clone();
            for item in target.drain(..) {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            *target = merged;
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::merge_recursive;
    use super::read_blob;
    use super::write_blob;
    use super::StateBlob;
    use crate::MemoryStorage;
    use crate::StorageArea;
    use serde_json::json;

    #[test]
    fn objects_merge_deeply_and_scalars_are_replaced() {
        let mut target = json!({"cart": {"count": 1, "currency": "USD"}, "zip": "10001"});
        merge_recursive(&mut target, &json!({"cart": {"count": 3}, "zip": "94105"}));
        assert_eq!(
            target,
            json!({"cart": {"count": 3, "currency": "USD"}, "zip": "94105"})
        );
    }

    #[test]
    fn arrays_are_unioned_with_overlay_first() {
        let mut target = json!({"recent": ["a", "b", "c"]});
        merge_recursive(&mut target, &json!({"recent": ["d", "b"]}));
        assert_eq!(target, json!({"recent": ["d", "b", "a", "c"]}));
    }

    #[test]
    fn mismatched_kinds_take_the_overlay() {
        let mut target = json!({"filters": ["red"]});
        merge_recursive(&mut target, &json!({"filters": {"color": "red"}}));
        assert_eq!(target, json!({"filters": {"color": "red"}}));
    }

    #[test]
    fn blobs_round_trip_through_storage() {
        let storage = MemoryStorage::new();
        let mut blob = StateBlob::new();
        blob.insert("user".to_owned(), json!({"signedIn": true}));

        assert!(write_blob(&storage, "pwaSessionState", &blob).is_ok());
        assert_eq!(read_blob(&storage, "pwaSessionState"), Ok(blob));
        assert_eq!(read_blob(&storage, "missing"), Ok(StateBlob::new()));
    }

    #[test]
    fn non_object_blobs_are_rejected() {
        let storage = MemoryStorage::new();
        assert!(storage.set_item("pwaLocalState", "[1,2]").is_ok());
        match read_blob(&storage, "pwaLocalState") {
            Err(error) => assert_eq!(error.code, "storage.blob_not_object"),
            Ok(blob) => panic!("unexpected blob {blob:?}"),
        }
    }
}
