//! Section context tracking

/// Active heading titles by level, one instance per document.
///
/// Slot `i` holds the title of the most recent level `i + 1` heading. A
/// heading at level `L` replaces slot `L` and clears every deeper slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionContext {
    slots: Vec<Option<String>>,
}

impl SectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heading. Level 0 is body text and leaves the context untouched.
    pub fn observe(&mut self, level: u8, title: &str) {
        if level == 0 {
            return;
        }
        let depth = level as usize - 1;
        self.slots.truncate(depth);
        self.slots.resize(depth, None);
        self.slots.push(Some(title.to_string()));
    }

    /// Title at a 1-based level, if set.
    pub fn get(&self, level: u8) -> Option<&str> {
        let index = (level as usize).checked_sub(1)?;
        self.slots.get(index)?.as_deref()
    }

    /// `"A > B > C"` over the non-empty slots, or `None` before any heading.
    pub fn path(&self) -> Option<String> {
        let parts: Vec<&str> = self.slots.iter().flatten().map(String::as_str).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" > "))
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
