pub mod path;
pub mod testing;

/// Log targets muted in every subscriber: markdown parser internals.
pub const NOISY_TARGETS: &[&str] = &["pulldown_cmark"];
