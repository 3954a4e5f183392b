//! JSON projection of plist dicts and arrays.
//!
//! Stripping only applies to the top level of the projected dict, where the
//! bundle identity fields live. Nested dicts (theme settings, for example)
//! keep their `scope` keys.

use serde_json::{Map, Value as JsonValue};

use crate::cell::CellValue;
use crate::document::{Plist, PlistArray, PlistArrayMut, PlistDict, PlistDictMut};
use crate::error::Error;

/// Identity keys that a stripped JSON edit must never overwrite.
pub const INTERNAL_KEYS: [&str; 3] = ["uuid", "scope", "keyEquivalent"];

fn is_internal(key: &str) -> bool {
    INTERNAL_KEYS.contains(&key)
}

fn value_to_json(plist: &Plist, value: CellValue) -> JsonValue {
    match value {
        CellValue::String(r) => JsonValue::String(plist.string(r).to_owned()),
        CellValue::Integer(value) => JsonValue::from(value),
        CellValue::Bool(value) => JsonValue::Bool(value),
        CellValue::Dict(dict) => plist.dict(dict).to_json(false),
        CellValue::Array(array) => plist.array(array).to_json(),
    }
}

impl PlistDict<'_> {
    pub fn to_json(&self, strip_internal: bool) -> JsonValue {
        let mut map = Map::new();
        for (key, value) in self.entries() {
            if strip_internal && is_internal(key) {
                continue;
            }
            map.insert(key.to_owned(), value_to_json(self.plist(), value));
        }
        JsonValue::Object(map)
    }

    /// Pretty-printed form of [`to_json`](Self::to_json).
    pub fn to_json_string(&self, strip_internal: bool) -> String {
        format!("{:#}", self.to_json(strip_internal))
    }
}

impl PlistArray<'_> {
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(
            self.iter()
                .map(|value| value_to_json(self.plist(), value))
                .collect(),
        )
    }
}

fn unsupported(path: &str, kind: &'static str) -> Error {
    Error::UnsupportedJson {
        path: path.to_owned(),
        kind,
    }
}

/// Rejects values that have no plist representation.
fn validate(value: &JsonValue, path: &str) -> Result<(), Error> {
    match value {
        JsonValue::Null => Err(unsupported(path, "null")),
        JsonValue::Number(number) if number.as_i64().is_none() => {
            Err(unsupported(path, "non-integer number"))
        }
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| validate(item, &format!("{}/{}", path, i))),
        JsonValue::Object(members) => members
            .iter()
            .try_for_each(|(key, member)| validate(member, &format!("{}/{}", path, key))),
        _ => Ok(()),
    }
}

fn insert_members(dict: &mut PlistDictMut<'_>, members: &Map<String, JsonValue>, skip: &[&str]) {
    for (key, value) in members {
        if skip.contains(&key.as_str()) {
            continue;
        }
        match value {
            JsonValue::String(text) => dict.set_string(key, text),
            JsonValue::Bool(flag) => dict.set_bool(key, *flag),
            JsonValue::Number(number) => {
                if let Some(number) = number.as_i64() {
                    dict.set_integer(key, number);
                }
            }
            JsonValue::Object(nested) => insert_members(&mut dict.new_dict(key), nested, &[]),
            JsonValue::Array(items) => insert_items(&mut dict.new_array(key), items),
            JsonValue::Null => {}
        }
    }
}

fn insert_items(array: &mut PlistArrayMut<'_>, items: &[JsonValue]) {
    for value in items {
        match value {
            JsonValue::String(text) => array.push_string(text),
            JsonValue::Bool(flag) => array.push_bool(*flag),
            JsonValue::Number(number) => {
                if let Some(number) = number.as_i64() {
                    array.push_integer(number);
                }
            }
            JsonValue::Object(nested) => insert_members(&mut array.push_dict(), nested, &[]),
            JsonValue::Array(nested) => insert_items(&mut array.push_array(), nested),
            JsonValue::Null => {}
        }
    }
}

impl PlistDictMut<'_> {
    /// Replaces the dict's content with the members of a JSON object.
    ///
    /// With `strip_internal`, the identity keys already in the dict are kept
    /// and any identity keys in `json` are ignored. The value is checked
    /// before anything is removed, so a rejected import changes nothing.
    pub fn set_json(&mut self, json: &JsonValue, strip_internal: bool) -> Result<(), Error> {
        let members = match json {
            JsonValue::Object(members) => members,
            JsonValue::Null => return Err(unsupported("", "null")),
            JsonValue::Array(_) => return Err(unsupported("", "array at the top level")),
            _ => return Err(unsupported("", "scalar at the top level")),
        };
        validate(json, "")?;

        let doomed: Vec<String> = self
            .as_dict()
            .keys()
            .filter(|key| !strip_internal || !is_internal(key))
            .map(str::to_owned)
            .collect();
        for key in doomed {
            self.delete_item(&key);
        }

        let skip: &[&str] = if strip_internal { &INTERNAL_KEYS } else { &[] };
        insert_members(self, members, skip);
        Ok(())
    }
}

#[cfg(test)]
mod json_tests {
    use serde_json::json;

    use super::*;

    fn themed() -> Plist {
        let mut plist = Plist::new();
        let mut root = plist.root_mut();
        root.set_string("name", "Snippet");
        root.set_string("uuid", "0A0B0C0D-0000-0000-0000-000000000001");
        root.set_string("scope", "source.rust");
        root.set_string("keyEquivalent", "^x");
        root.set_string("content", "fn $1() {}");
        root.set_integer("count", 3);
        let mut settings = root.new_array("settings");
        settings.push_dict().set_string("scope", "comment");
        plist
    }

    #[test]
    fn to_json_strips_exactly_the_identity_keys() {
        let plist = themed();
        let stripped = plist.root().to_json(true);
        let keys: Vec<&String> = stripped.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "content", "count", "settings"]);
        assert_eq!(stripped["settings"][0]["scope"], json!("comment"));

        let full = plist.root().to_json(false);
        assert_eq!(full.as_object().unwrap().len(), 7);
        assert_eq!(full["count"], json!(3));
    }

    #[test]
    fn stripped_import_keeps_identity_fields() {
        let source = themed();
        let exported = source.root().to_json(true);

        let mut target = Plist::new();
        {
            let mut root = target.root_mut();
            root.set_string("uuid", "FFFFFFFF-0000-0000-0000-000000000002");
            root.set_string("scope", "text.plain");
            root.set_string("keyEquivalent", "@y");
            root.set_string("stale", "gone after import");
        }
        let mut hostile = exported.clone();
        hostile["uuid"] = json!("should be ignored");
        target.root_mut().set_json(&hostile, true).unwrap();

        let root = target.root();
        assert_eq!(
            root.get_string("uuid"),
            Some("FFFFFFFF-0000-0000-0000-000000000002")
        );
        assert_eq!(root.get_string("scope"), Some("text.plain"));
        assert_eq!(root.get_string("keyEquivalent"), Some("@y"));
        assert!(!root.has_key("stale"));
        assert_eq!(root.get_string("content"), Some("fn $1() {}"));
        assert_eq!(root.to_json(true), exported);
    }

    #[test]
    fn unstripped_import_replaces_everything() {
        let mut plist = themed();
        plist
            .root_mut()
            .set_json(&json!({"name": "x", "nested": {"list": [1, true, "s", []]}}), false)
            .unwrap();
        let root = plist.root();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["name", "nested"]);
        let list = root.get_dict("nested").unwrap().get_array("list").unwrap();
        assert_eq!(list.get_integer(0), Some(1));
        assert_eq!(list.get_bool(1), Some(true));
        assert_eq!(list.get_string(2), Some("s"));
        assert!(list.get_array(3).unwrap().is_empty());
    }

    #[test]
    fn null_and_floats_are_rejected_without_changes() {
        let mut plist = themed();
        let before = plist.root().to_json(false);

        let err = plist
            .root_mut()
            .set_json(&json!({"name": "x", "deep": {"bad": null}}), false)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedJson { ref path, .. } if path == "/deep/bad"));

        let err = plist
            .root_mut()
            .set_json(&json!({"ratio": 1.5}), true)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedJson { .. }));

        assert_eq!(plist.root().to_json(false), before);
    }
}
