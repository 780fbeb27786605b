pub mod history;
pub mod model;

pub use history::HistoryStore;
pub use model::{renumber, Section};
