//! Serializable snapshot of a session
//!
//! [`StoreDump`] is the JSON shape the CLI reads and prints. It keeps ids,
//! owners, references and temporary flags exactly, so a dump applied to a
//! fresh session and saved produces the same records as the original.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::container::{ArrayKind, ArrayVar};
use crate::context::Session;
use crate::error::{DynvarError, Result};
use crate::strings::StringVar;
use crate::value::{ArrayId, Element, Key, KeyType, StringId, HANDLE_MASK};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDump {
    #[serde(default)]
    pub arrays: Vec<ArrayDump>,
    #[serde(default)]
    pub strings: Vec<StringDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDump {
    pub id: ArrayId,
    pub kind: ArrayKind,
    pub owner: u8,
    #[serde(default)]
    pub refs: Vec<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
    #[serde(default)]
    pub elements: Vec<EntryDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDump {
    pub key: Key,
    pub value: Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDump {
    pub id: StringId,
    pub owner: u8,
    pub data: String,
}

fn layout(kind: ArrayKind) -> (KeyType, bool) {
    match kind {
        ArrayKind::Array => (KeyType::Number, true),
        ArrayKind::Map => (KeyType::Number, false),
        ArrayKind::StringMap => (KeyType::Text, false),
    }
}

fn checked_id(id: u32, what: &str) -> Result<u32> {
    match id & HANDLE_MASK {
        0 => Err(DynvarError::Format(format!("{} id {} is not a valid handle", what, id))),
        id => Ok(id),
    }
}

impl StoreDump {
    /// Snapshot every array and string in `session`
    pub fn capture(session: &Session) -> Self {
        let arrays = {
            let table = session.arrays().lock();
            table
                .iter()
                .map(|(id, arr)| ArrayDump {
                    id,
                    kind: arr.kind(),
                    owner: arr.owner(),
                    refs: arr.references().to_vec(),
                    temporary: table.is_temporary(id),
                    elements: arr
                        .entries()
                        .into_iter()
                        .map(|(key, value)| EntryDump { key, value })
                        .collect(),
                })
                .collect()
        };
        let strings = {
            let table = session.strings().lock();
            table
                .iter()
                .map(|(id, var)| StringDump {
                    id,
                    owner: var.owner,
                    data: var.data.clone(),
                })
                .collect()
        };
        Self { arrays, strings }
    }

    /// Replace the contents of `session` with this dump. The session is left
    /// untouched if the dump is inconsistent.
    pub fn apply(&self, session: &Session) -> Result<()> {
        session.preload();
        let result = self.install(session);
        session.postload(result.is_ok());
        result
    }

    fn install(&self, session: &Session) -> Result<()> {
        let known: BTreeSet<ArrayId> = self.arrays.iter().map(|a| a.id & HANDLE_MASK).collect();

        let mut table = session.arrays().lock();
        for dump in &self.arrays {
            let id = checked_id(dump.id, "array")?;
            if table.contains(id) {
                return Err(DynvarError::Format(format!("duplicate array id {}", id)));
            }

            let (key_type, packed) = layout(dump.kind);
            let mut arr = ArrayVar::restore(key_type, packed, dump.owner, dump.refs.clone())?;
            for (i, entry) in dump.elements.iter().enumerate() {
                if packed && entry.key.index() != Some(i) {
                    return Err(DynvarError::Format(format!(
                        "array {} has out-of-sequence index {}",
                        id, entry.key
                    )));
                }
                if let Element::Array(target) = entry.value {
                    if target != 0 && !known.contains(&target) {
                        return Err(DynvarError::Format(format!(
                            "array {} refers to missing array {}",
                            id, target
                        )));
                    }
                }
                arr.set(entry.key.clone(), entry.value.clone())?;
            }

            table.insert(id, arr)?;
            if dump.temporary {
                table.mark_temporary(id, true);
            }
        }
        drop(table);

        let mut table = session.strings().lock();
        for dump in &self.strings {
            let id = checked_id(dump.id, "string")?;
            if table.contains(id) {
                return Err(DynvarError::Format(format!("duplicate string id {}", id)));
            }
            table.insert(id, StringVar::new(dump.data.clone(), dump.owner))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "arrays": [
            { "id": 1, "kind": "array", "owner": 0, "refs": [1],
              "elements": [
                { "key": 0, "value": { "type": "number", "value": 1.5 } },
                { "key": 1, "value": { "type": "string", "value": "two" } }
              ] },
            { "id": 4, "kind": "stringmap", "owner": 1,
              "elements": [
                { "key": "list", "value": { "type": "array", "value": 1 } },
                { "key": "npc", "value": { "type": "form", "value": 16777236 } }
              ] }
        ],
        "strings": [ { "id": 2, "owner": 0, "data": "hello" } ]
    }"#;

    #[test]
    fn test_apply_preserves_ids() {
        let dump: StoreDump = serde_json::from_str(SAMPLE).unwrap();
        let session = Session::default();
        dump.apply(&session).unwrap();

        assert_eq!(session.arrays().ids(), vec![1, 4]);
        assert_eq!(session.arrays().references(1), Some(vec![1]));
        assert_eq!(session.arrays().get_array(4, &Key::from("list")), Some(1));
        assert_eq!(session.arrays().get_form(4, &Key::from("npc")), Some(0x0100_0014));
        assert_eq!(session.strings().get(2), Some("hello".to_string()));
    }

    #[test]
    fn test_capture_matches_applied_dump() {
        let dump: StoreDump = serde_json::from_str(SAMPLE).unwrap();
        let session = Session::default();
        dump.apply(&session).unwrap();
        assert_eq!(StoreDump::capture(&session), dump);
    }

    #[test]
    fn test_missing_target_rejected_and_session_kept() {
        let session = Session::default();
        let existing = session.arrays().create(KeyType::Number, true, 0).unwrap();

        let dump: StoreDump = serde_json::from_str(
            r#"{ "arrays": [ { "id": 3, "kind": "map", "owner": 0,
                 "elements": [ { "key": 2, "value": { "type": "array", "value": 9 } } ] } ] }"#,
        )
        .unwrap();
        assert!(matches!(dump.apply(&session), Err(DynvarError::Format(_))));
        assert_eq!(session.arrays().ids(), vec![existing]);
    }

    #[test]
    fn test_packed_indices_must_be_sequential() {
        let dump: StoreDump = serde_json::from_str(
            r#"{ "arrays": [ { "id": 1, "kind": "array", "owner": 0,
                 "elements": [ { "key": 1, "value": { "type": "number", "value": 1 } } ] } ] }"#,
        )
        .unwrap();
        assert!(dump.apply(&Session::default()).is_err());
    }

    #[test]
    fn test_temporary_flag_round_trips() {
        let session = Session::default();
        let id = session.arrays().create(KeyType::Number, true, 0).unwrap();
        session.arrays().mark_temporary(id, true);

        let dump = StoreDump::capture(&session);
        assert!(dump.arrays[0].temporary);

        let copy = Session::default();
        dump.apply(&copy).unwrap();
        assert!(copy.arrays().is_temporary(id));
    }
}
