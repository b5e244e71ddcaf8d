#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    visited: Vec<String>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.cursor.map(|ix| self.visited[ix].as_str())
    }

    pub fn visit(&mut self, id: &str) {
        if self.current() == Some(id) {
            return;
        }
        let keep = self.cursor.map(|ix| ix + 1).unwrap_or(0);
        self.visited.truncate(keep);
        self.visited.push(id.to_string());
        self.cursor = Some(self.visited.len() - 1);
    }

    pub fn back(&mut self) -> Option<&str> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.current()
    }

    pub fn forward(&mut self) -> Option<&str> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.visited.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.current()
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.visited.len())
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    // Drops entries the keep predicate rejects, leaving the cursor on the
    // nearest surviving entry.
    pub fn retain<F: Fn(&str) -> bool>(&mut self, keep: F) {
        let new_cursor = self.cursor.map(|cursor| {
            let removed_before = self.visited[..cursor]
                .iter()
                .filter(|id| !keep(id))
                .count();
            let current_removed = !keep(&self.visited[cursor]);
            (cursor - removed_before).saturating_sub(current_removed as usize)
        });
        self.visited.retain(|id| keep(id));
        self.cursor = match new_cursor {
            Some(_) if self.visited.is_empty() => None,
            Some(ix) => Some(ix.min(self.visited.len() - 1)),
            None => None,
        };
    }
}
