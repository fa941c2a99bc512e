use log::warn;

/// Bounds-checked position in an ordered, possibly empty collection
///
/// Moving past either end is a no-op. Used for paging through the
/// identifications of a species and the photos of an identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn can_go_next(&self) -> bool {
        self.index + 1 < self.len
    }

    pub fn can_go_previous(&self) -> bool {
        self.index > 0
    }

    /// Moves forward; returns whether the position changed
    pub fn next(&mut self) -> bool {
        if self.can_go_next() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Moves backward; returns whether the position changed
    pub fn previous(&mut self) -> bool {
        if self.can_go_previous() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Follows a change in collection size, clamping to the last item when
    /// the current position fell off the end
    pub fn resize(&mut self, len: usize) {
        self.len = len;
        if len == 0 {
            self.index = 0;
        } else if self.index >= len {
            warn!("Cursor index {} overflow, defaulting to last ({})", self.index, len - 1);
            self.index = len - 1;
        }
    }

    /// Current item of `items`, re-synchronizing with its length first
    pub fn current<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.len() != self.len {
            self.resize(items.len());
        }
        items.get(self.index)
    }

    /// Position label: `"(2/5)"`, or `"(0)"` when empty
    pub fn label(&self) -> String {
        if self.is_empty() {
            "(0)".to_string()
        } else {
            format!("({}/{})", self.index + 1, self.len)
        }
    }
}
