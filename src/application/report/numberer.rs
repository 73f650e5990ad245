//! Hierarchical heading counters ("1", "1.2", "1.2.3").

/// Deepest normalized level that still receives a number.
pub const MAX_NUMBERED_DEPTH: usize = 4;

/// Per-render heading counter stack.
///
/// Each render owns its own instance; nothing is shared between builds.
#[derive(Debug, Clone)]
pub struct HeadingNumberer {
    counters: Vec<u32>,
    enabled: bool,
}

impl Default for HeadingNumberer {
    fn default() -> Self {
        Self {
            counters: vec![0],
            enabled: true,
        }
    }
}

impl HeadingNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counters = vec![0];
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Next number for a heading of `level` hashes, relative to `top_level`.
    ///
    /// Returns an empty string while disabled or when the normalized level is
    /// deeper than [`MAX_NUMBERED_DEPTH`]. Moving to a shallower heading drops
    /// the deeper counters.
    pub fn get_number(&mut self, level: usize, top_level: usize) -> String {
        if !self.enabled {
            return String::new();
        }
        let normalized = (level + 1).saturating_sub(top_level).max(1);
        if normalized > MAX_NUMBERED_DEPTH {
            return String::new();
        }
        self.counters.resize(normalized, 0);
        if let Some(last) = self.counters.last_mut() {
            *last += 1;
        }
        self.counters
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}
