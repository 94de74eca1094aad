// Interval tree library - indexes text spans by (line, column) and keeps them
// attached to their text as the document is edited

pub mod config;
pub mod model;

pub use config::{ConfigError, TreeConfig};
pub use model::document::TextDocument;
pub use model::edit::{EditObserver, TextEdit};
pub use model::interval_iter::{Iter, Overlapping};
pub use model::interval_tree::IntervalTree;
pub use model::position::{IntervalError, TextInterval, TextPosition, Validation};
