mod tail;

pub use tail::{FileTail, spawn_importer};
