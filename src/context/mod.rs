//! Session state
//!
//! A [`Session`] owns the array and string stores of one running game and
//! drives them through the host lifecycle: `reset` on a new game, `clean`
//! once per frame, `save`, and `load` with rollback when the save is bad.

use tracing::{debug, warn};

use crate::config::Config;
use crate::container::ArrayStore;
use crate::error::Result;
use crate::persist::{
    load_arrays, load_strings, save_arrays, save_strings, LoadReport, ModuleMap, RecordReader,
    RecordWriter, SaveReport,
};
use crate::strings::StringStore;

#[derive(Debug, Default)]
pub struct Session {
    config: Config,
    arrays: ArrayStore,
    strings: StringStore,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            arrays: ArrayStore::new(),
            strings: StringStore::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arrays(&self) -> &ArrayStore {
        &self.arrays
    }

    pub fn strings(&self) -> &StringStore {
        &self.strings
    }

    /// Drop every variable
    pub fn reset(&self) {
        self.arrays.reset();
        self.strings.reset();
        debug!("session reset");
    }

    /// Per-frame sweep of temporaries nothing claimed. Returns how many
    /// arrays and strings were erased.
    pub fn clean(&self) -> (usize, usize) {
        (self.arrays.clean(), self.strings.clean())
    }

    pub fn save<W: RecordWriter + ?Sized>(&self, w: &mut W) -> Result<SaveReport> {
        let mut report = save_arrays(
            &self.arrays,
            w,
            self.config.save_version,
            self.config.skip_pending_on_save,
        )?;
        report.strings = save_strings(&self.strings, w)?;
        Ok(report)
    }

    /// Replace the session contents with a save. `modules` maps the module
    /// indices recorded in the save to the ones loaded now; the dynamic
    /// module is always kept. On error the previous contents come back.
    pub fn load<R: RecordReader + ?Sized>(&self, r: &mut R, modules: &ModuleMap) -> Result<LoadReport> {
        let modules = modules.clone().with_dynamic(self.config.dynamic_module);

        self.preload();
        let result = self.read_sections(r, &modules);
        self.postload(result.is_ok());

        if let Err(e) = &result {
            warn!(error = %e, "load failed, previous session restored");
        }
        result
    }

    fn read_sections<R: RecordReader + ?Sized>(&self, r: &mut R, modules: &ModuleMap) -> Result<LoadReport> {
        let mut report = load_arrays(&self.arrays, r, modules)?;
        load_strings(&self.strings, r, modules, &mut report)?;
        Ok(report)
    }

    /// Set both stores aside ahead of a load the host drives itself
    pub fn preload(&self) {
        self.arrays.preload();
        self.strings.preload();
    }

    pub fn postload(&self, success: bool) {
        self.arrays.postload(success);
        self.strings.postload(success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStream;
    use crate::value::{Element, Key, KeyType, MAX_TEXT_LEN};

    fn populated() -> Session {
        let session = Session::default();
        let list = session
            .arrays()
            .create_list(vec![Element::Number(1.0), Element::from("two")], 0)
            .unwrap();
        let map = session.arrays().create(KeyType::Text, false, 0x10).unwrap();
        session.arrays().set_array(map, Key::from("list"), list).unwrap();
        session.strings().create("hello", 0).unwrap();
        session
    }

    #[test]
    fn test_save_then_load_restores_contents() {
        let session = populated();
        let mut out = MemoryStream::new();
        let saved = session.save(&mut out).unwrap();
        assert_eq!(saved.arrays, 2);
        assert_eq!(saved.strings, 1);

        let fresh = Session::default();
        let mut input = MemoryStream::from_bytes(out.into_bytes());
        let report = fresh.load(&mut input, &ModuleMap::identity()).unwrap();
        assert_eq!(report.arrays, 2);
        assert_eq!(report.strings, 1);
        for id in session.arrays().ids() {
            assert_eq!(fresh.arrays().entries(id), session.arrays().entries(id));
        }
    }

    #[test]
    fn test_failed_load_restores_previous_state() {
        let session = populated();
        let before: Vec<_> = session
            .arrays()
            .ids()
            .into_iter()
            .map(|id| session.arrays().entries(id))
            .collect();

        let mut garbage = MemoryStream::from_bytes(b"ARVS\x02\x00\x00\x00\x00\x00\x00\x00ARVR".to_vec());
        assert!(session.load(&mut garbage, &ModuleMap::identity()).is_err());

        let after: Vec<_> = session
            .arrays()
            .ids()
            .into_iter()
            .map(|id| session.arrays().entries(id))
            .collect();
        assert_eq!(before, after);
        assert_eq!(session.strings().count(), 1);
    }

    #[test]
    fn test_dynamic_module_survives_empty_map() {
        let session = Session::default();
        let id = session.arrays().create(KeyType::Number, true, 0xFF).unwrap();
        session.arrays().add_reference(id, 0xFF).unwrap();
        let mut out = MemoryStream::new();
        session.save(&mut out).unwrap();

        let fresh = Session::default();
        let mut input = MemoryStream::from_bytes(out.into_bytes());
        fresh.load(&mut input, &ModuleMap::from_loaded(&[])).unwrap();
        assert!(fresh.arrays().exists(id));
    }

    #[test]
    fn test_clean_sweeps_both_stores() {
        let session = Session::default();
        let id = session.arrays().create(KeyType::Number, true, 0).unwrap();
        session.arrays().mark_temporary(id, true);
        session.strings().create_temporary("scratch", 0).unwrap();
        assert_eq!(session.clean(), (1, 1));
        assert_eq!(session.clean(), (0, 0));
    }

    #[test]
    fn test_rejected_long_string_does_not_block_save() {
        let session = populated();
        let long = "z".repeat(MAX_TEXT_LEN + 1);
        let map = session.arrays().create(KeyType::Text, false, 0).unwrap();
        assert!(session.arrays().set_string(map, Key::from("note"), &long).is_err());
        assert!(session.arrays().set_number(map, Key::from(long.as_str()), 1.0).is_err());
        assert!(session.strings().create(&long, 0).is_err());

        let mut out = MemoryStream::new();
        let saved = session.save(&mut out).unwrap();
        assert_eq!(saved.arrays, 3);
        assert_eq!(saved.strings, 1);
    }

    #[test]
    fn test_pending_arrays_saved_by_default() {
        let session = Session::default();
        let id = session.arrays().create(KeyType::Number, true, 0).unwrap();
        session.arrays().mark_temporary(id, true);

        let mut out = MemoryStream::new();
        let saved = session.save(&mut out).unwrap();
        assert_eq!((saved.arrays, saved.skipped), (1, 0));

        let fresh = Session::default();
        let mut input = MemoryStream::from_bytes(out.into_bytes());
        fresh.load(&mut input, &ModuleMap::identity()).unwrap();
        assert!(fresh.arrays().exists(id));
    }

    #[test]
    fn test_legacy_save_version() {
        let session = Session::new(Config {
            save_version: 1,
            ..Config::default()
        });
        let id = session.arrays().create(KeyType::Number, true, 0).unwrap();
        session.arrays().add_reference(id, 0).unwrap();
        let mut out = MemoryStream::new();
        session.save(&mut out).unwrap();

        let fresh = Session::default();
        let mut input = MemoryStream::from_bytes(out.into_bytes());
        let report = fresh.load(&mut input, &ModuleMap::identity()).unwrap();
        assert_eq!(report.version, 1);
        assert_eq!(fresh.arrays().references(id), Some(vec![]));
    }
}
