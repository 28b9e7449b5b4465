//! Array and string variable records

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::modules::ModuleMap;
use super::stream::{RecordReader, RecordTag, RecordWriter};
use crate::container::{ArrayStore, ArrayTable, ArrayVar};
use crate::error::{DynvarError, Result};
use crate::strings::{StringStore, StringVar};
use crate::value::{ArrayId, Element, ElementType, Key, KeyType, HANDLE_MASK};

/// Current array record version
pub const ARRAY_VERSION: u32 = 2;
/// Array records without reference lists
pub const LEGACY_ARRAY_VERSION: u32 = 1;
pub const STRING_VERSION: u32 = 1;

const ARRAY_START: RecordTag = *b"ARVS";
const ARRAY_RECORD: RecordTag = *b"ARVR";
const ARRAY_END: RecordTag = *b"ARVE";
const STRING_START: RecordTag = *b"STVS";
const STRING_RECORD: RecordTag = *b"STVR";
const STRING_END: RecordTag = *b"STVE";

/// What a save wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub arrays: usize,
    pub strings: usize,
    /// Temporary arrays awaiting collection, left out of the save
    pub skipped: usize,
}

/// What a load restored and what it had to repair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub version: u32,
    pub arrays: usize,
    pub strings: usize,
    pub dropped_arrays: usize,
    pub dropped_strings: usize,
    /// Content references into unloaded modules, set to 0
    pub nulled_forms: usize,
    /// Array references to arrays that were not restored, set to 0
    pub nulled_arrays: usize,
}

fn tag_name(tag: &RecordTag) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

fn check_array_version(version: u32) -> Result<()> {
    if version == LEGACY_ARRAY_VERSION || version == ARRAY_VERSION {
        Ok(())
    } else {
        Err(DynvarError::Format(format!("unsupported array record version {}", version)))
    }
}

fn count_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| DynvarError::Format(format!("too many {} to save", what)))
}

fn write_element<W: RecordWriter + ?Sized>(w: &mut W, element: &Element) -> Result<()> {
    w.write_u8(element.element_type().code())?;
    match element {
        Element::Invalid => Ok(()),
        Element::Number(n) => w.write_f64(*n),
        Element::Form(id) => w.write_u32(*id),
        Element::String(s) => w.write_str(s),
        Element::Array(id) => w.write_u32(*id),
    }
}

fn write_array<W: RecordWriter + ?Sized>(
    w: &mut W,
    id: u32,
    arr: &ArrayVar,
    refs: &[u8],
    version: u32,
) -> Result<()> {
    w.write_u8(arr.owner())?;
    w.write_u32(id)?;
    w.write_u8(arr.key_type().code())?;
    w.write_u8(u8::from(arr.is_packed()))?;

    if version >= ARRAY_VERSION {
        w.write_u32(count_u32(refs.len(), "references")?)?;
        for &module in refs {
            w.write_u8(module)?;
        }
    }

    w.write_u32(count_u32(arr.len(), "elements")?)?;
    for (key, element) in arr.backend().iter() {
        match &key {
            Key::Number(n) => w.write_f64(*n)?,
            Key::Text(s) => w.write_str(s)?,
        }
        write_element(w, element)?;
    }
    Ok(())
}

/// Temporary arrays the sweep would collect, including those orphaned by
/// collecting others, plus the reference lists of everything else with the
/// references held by collected arrays removed.
fn pending_collection(table: &ArrayTable) -> (BTreeSet<ArrayId>, BTreeMap<ArrayId, Vec<u8>>) {
    let mut refs: BTreeMap<ArrayId, Vec<u8>> = table
        .iter()
        .map(|(id, arr)| (id, arr.references().to_vec()))
        .collect();
    let mut worklist: Vec<ArrayId> = table
        .temporaries()
        .into_iter()
        .filter(|id| refs.get(id).is_some_and(Vec::is_empty))
        .collect();
    let mut pending = BTreeSet::new();

    while let Some(id) = worklist.pop() {
        if !pending.insert(id) {
            continue;
        }
        let Some(arr) = table.get(id) else {
            continue;
        };
        let owner = arr.owner();
        for child in arr.child_arrays() {
            let Some(held) = refs.get_mut(&child) else {
                continue;
            };
            if let Some(pos) = held.iter().position(|&m| m == owner) {
                held.remove(pos);
            }
            if held.is_empty() && table.is_temporary(child) && !pending.contains(&child) {
                worklist.push(child);
            }
        }
    }
    (pending, refs)
}

/// Write the array section. With `skip_pending`, temporary arrays the next
/// sweep would erase are left out and the references they hold are not
/// counted on the arrays that are written.
pub fn save_arrays<W: RecordWriter + ?Sized>(
    store: &ArrayStore,
    w: &mut W,
    version: u32,
    skip_pending: bool,
) -> Result<SaveReport> {
    check_array_version(version)?;
    let table = store.lock();
    let mut report = SaveReport::default();
    let (pending, adjusted) = if skip_pending {
        pending_collection(&table)
    } else {
        (BTreeSet::new(), BTreeMap::new())
    };

    w.open_record(ARRAY_START, version)?;
    for (id, arr) in table.iter() {
        if pending.contains(&id) {
            report.skipped += 1;
            continue;
        }
        let refs = adjusted.get(&id).map_or(arr.references(), Vec::as_slice);
        w.open_record(ARRAY_RECORD, version)?;
        write_array(w, id, arr, refs, version)?;
        report.arrays += 1;
    }
    w.open_record(ARRAY_END, version)?;

    info!(arrays = report.arrays, skipped = report.skipped, version, "saved arrays");
    Ok(report)
}

fn read_element<R: RecordReader + ?Sized>(
    r: &mut R,
    modules: &ModuleMap,
    report: &mut LoadReport,
) -> Result<Element> {
    let code = r.read_u8()?;
    let element_type = ElementType::from_code(code)
        .ok_or_else(|| DynvarError::Format(format!("unknown element type {}", code)))?;

    Ok(match element_type {
        ElementType::Invalid => Element::Invalid,
        ElementType::Number => Element::Number(r.read_f64()?),
        ElementType::Form => {
            let form = r.read_u32()?;
            match modules.resolve_form(form) {
                Some(form) => Element::Form(form),
                None => {
                    report.nulled_forms += 1;
                    Element::Form(0)
                }
            }
        }
        ElementType::String => Element::String(r.read_str()?),
        ElementType::Array => Element::Array(r.read_u32()? & HANDLE_MASK),
    })
}

/// Read one array record. `None` when its owning module is gone.
fn read_array<R: RecordReader + ?Sized>(
    r: &mut R,
    version: u32,
    modules: &ModuleMap,
    report: &mut LoadReport,
) -> Result<Option<(u32, ArrayVar)>> {
    let owner = r.read_u8()?;
    let id = r.read_u32()? & HANDLE_MASK;
    if id == 0 {
        return Err(DynvarError::Format("array record with id 0".to_string()));
    }
    let Some(owner) = modules.resolve(owner) else {
        debug!(id, owner, "dropping array owned by an unloaded module");
        return Ok(None);
    };

    let code = r.read_u8()?;
    let key_type = KeyType::from_code(code)
        .filter(|kt| *kt != KeyType::Invalid)
        .ok_or_else(|| DynvarError::Format(format!("array {} has invalid key type {}", id, code)))?;
    let packed = r.read_u8()? != 0;

    let refs = if version >= ARRAY_VERSION {
        let count = r.read_u32()?;
        let mut refs = Vec::new();
        for _ in 0..count {
            if let Some(module) = modules.resolve(r.read_u8()?) {
                refs.push(module);
            }
        }
        refs
    } else {
        Vec::new()
    };

    let mut arr = ArrayVar::restore(key_type, packed, owner, refs)?;
    let count = r.read_u32()?;
    for i in 0..count {
        let key = if key_type == KeyType::Number {
            Key::from(r.read_f64()?)
        } else {
            Key::Text(r.read_str()?)
        };
        if arr.is_packed() && key.index() != Some(i as usize) {
            return Err(DynvarError::Format(format!(
                "packed array {} has out-of-sequence index {}",
                id, key
            )));
        }
        let element = read_element(r, modules, report)?;
        arr.set(key, element)?;
    }
    Ok(Some((id, arr)))
}

/// Point array references at nothing when their target was not restored
fn null_dangling(table: &mut ArrayTable) -> usize {
    let ids = table.handles();
    let live: BTreeSet<u32> = ids.iter().copied().collect();
    let mut nulled = 0;
    for id in ids {
        let Some(arr) = table.get_mut(id) else {
            continue;
        };
        for element in arr.backend_mut().values_mut() {
            if let Element::Array(target) = element {
                if *target != 0 && !live.contains(target) {
                    *target = 0;
                    nulled += 1;
                }
            }
        }
    }
    nulled
}

/// Read the array section into `store`. The caller snapshots the store
/// first and restores it if this fails.
pub fn load_arrays<R: RecordReader + ?Sized>(
    store: &ArrayStore,
    r: &mut R,
    modules: &ModuleMap,
) -> Result<LoadReport> {
    let header = r
        .next_record()?
        .ok_or_else(|| DynvarError::Format("missing array section".to_string()))?;
    if header.tag != ARRAY_START {
        return Err(DynvarError::Format(format!(
            "expected {}, found {}",
            tag_name(&ARRAY_START),
            tag_name(&header.tag)
        )));
    }
    check_array_version(header.version)?;

    let mut table = store.lock();
    let mut report = LoadReport {
        version: header.version,
        ..LoadReport::default()
    };

    loop {
        let header = r
            .next_record()?
            .ok_or_else(|| DynvarError::Format("array section has no end marker".to_string()))?;
        match header.tag {
            ARRAY_END => break,
            ARRAY_RECORD => {
                check_array_version(header.version)?;
                match read_array(r, header.version, modules, &mut report)? {
                    Some((id, arr)) => {
                        if table.contains(id) {
                            return Err(DynvarError::Format(format!("duplicate array id {}", id)));
                        }
                        table.insert(id, arr)?;
                        report.arrays += 1;
                    }
                    None => report.dropped_arrays += 1,
                }
            }
            other => {
                return Err(DynvarError::Format(format!(
                    "unexpected {} record in array section",
                    tag_name(&other)
                )))
            }
        }
    }

    report.nulled_arrays = null_dangling(&mut table);
    if report.dropped_arrays > 0 || report.nulled_forms > 0 || report.nulled_arrays > 0 {
        warn!(
            dropped = report.dropped_arrays,
            nulled_forms = report.nulled_forms,
            nulled_arrays = report.nulled_arrays,
            "repaired arrays referring to unloaded modules"
        );
    }
    info!(arrays = report.arrays, version = report.version, "loaded arrays");
    Ok(report)
}

/// Write the string variable section
pub fn save_strings<W: RecordWriter + ?Sized>(store: &StringStore, w: &mut W) -> Result<usize> {
    let table = store.lock();
    w.open_record(STRING_START, STRING_VERSION)?;
    for (id, var) in table.iter() {
        w.open_record(STRING_RECORD, STRING_VERSION)?;
        w.write_u8(var.owner)?;
        w.write_u32(id)?;
        w.write_str(&var.data)?;
    }
    w.open_record(STRING_END, STRING_VERSION)?;
    info!(strings = table.len(), "saved strings");
    Ok(table.len())
}

/// Read the string variable section into `store`, updating `report`.
/// Saves without a string section load as having no strings.
pub fn load_strings<R: RecordReader + ?Sized>(
    store: &StringStore,
    r: &mut R,
    modules: &ModuleMap,
    report: &mut LoadReport,
) -> Result<()> {
    let mark = r.position();
    match r.next_record()? {
        Some(header) if header.tag == STRING_START => {}
        Some(_) => {
            // belongs to whoever reads next
            r.seek(mark)?;
            return Ok(());
        }
        None => return Ok(()),
    }

    let mut table = store.lock();
    loop {
        let header = r
            .next_record()?
            .ok_or_else(|| DynvarError::Format("string section has no end marker".to_string()))?;
        match header.tag {
            STRING_END => break,
            STRING_RECORD => {
                let owner = r.read_u8()?;
                let id = r.read_u32()? & HANDLE_MASK;
                let data = r.read_str()?;
                if id == 0 {
                    return Err(DynvarError::Format("string record with id 0".to_string()));
                }
                let Some(owner) = modules.resolve(owner) else {
                    report.dropped_strings += 1;
                    continue;
                };
                if table.contains(id) {
                    return Err(DynvarError::Format(format!("duplicate string id {}", id)));
                }
                table.insert(id, StringVar::new(data, owner))?;
                report.strings += 1;
            }
            other => {
                return Err(DynvarError::Format(format!(
                    "unexpected {} record in string section",
                    tag_name(&other)
                )))
            }
        }
    }
    info!(strings = report.strings, dropped = report.dropped_strings, "loaded strings");
    Ok(())
}
