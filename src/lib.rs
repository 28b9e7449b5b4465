//! Dynvar - reference-counted array and map variables for scripting runtimes
//!
//! Scripts create arrays, maps and string-keyed maps at runtime and pass
//! them around by id. Dynvar stores them, tracks which content modules
//! refer to each one, sweeps temporaries nobody claimed, and writes the
//! whole set into a save and back.
//!
//! # Example
//!
//! ```
//! use dynvar::{Element, Key, KeyType, MemoryStream, ModuleMap, Session};
//!
//! let session = Session::default();
//! let inventory = session.arrays().create(KeyType::Text, false, 0x01).unwrap();
//! session.arrays().set_number(inventory, Key::from("gold"), 250.0).unwrap();
//!
//! let mut save = MemoryStream::new();
//! session.save(&mut save).unwrap();
//!
//! let restored = Session::default();
//! let mut input = MemoryStream::from_bytes(save.into_bytes());
//! restored.load(&mut input, &ModuleMap::identity()).unwrap();
//! assert_eq!(restored.arrays().get_element(inventory, &Key::from("gold")), Some(Element::Number(250.0)));
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod dump;
pub mod error;
pub mod output;
pub mod persist;
pub mod plugin;
pub mod store;
pub mod strings;
pub mod value;

pub use config::Config;
pub use container::{ArrayKind, ArrayState, ArrayStore, SortMode, SortOrder};
pub use context::Session;
pub use dump::StoreDump;
pub use error::{DynvarError, Result};
pub use output::{format_output, OutputFormat};
pub use persist::{LoadReport, MemoryStream, ModuleMap, SaveReport};
pub use plugin::{ArrayInterface, Capability};
pub use strings::StringStore;
pub use value::{ArrayId, Element, Key, KeyType, MAX_TEXT_LEN};
