mod classify;
mod model;
mod source;

pub use classify::{Classifier, PatternClassifier};
pub use model::{Job, JobKind, Outcome};
pub use source::{load_jobs, load_jobs_from_file, parse_item_lines};
