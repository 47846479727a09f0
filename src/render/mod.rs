mod summary;

pub use summary::{NetworkSummary, NodeView, render_json, render_text};
