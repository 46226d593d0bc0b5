use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Assigned by the backend (document key or database id).
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at,
        }
    }
}

/// Trim user input, rejecting text that is empty afterwards.
pub fn normalize_text(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Newest first. Stable, so ties keep backend order.
pub fn sort_newest_first(todos: &mut [Todo]) {
    todos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// The client's copy of the backend collection as of the last successful read.
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    items: Vec<Todo>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a fresh snapshot. The list is never patched in place.
    pub fn replace(&mut self, mut todos: Vec<Todo>) {
        sort_newest_first(&mut todos);
        self.items = todos;
    }

    pub fn items(&self) -> &[Todo] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.items.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_text("  buy milk \n"), Some("buy milk"));
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text(""), None);
    }

    #[test]
    fn replace_sorts_newest_first() {
        let mut list = TodoList::new();
        list.replace(vec![
            Todo::new("a", "oldest", at(100)),
            Todo::new("b", "newest", at(300)),
            Todo::new("c", "middle", at(200)),
        ]);
        let ids: Vec<&str> = list.items().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_never_puts_older_before_newer() {
        let mut todos: Vec<Todo> = [5, 1, 9, 3, 9, 0, 7]
            .iter()
            .enumerate()
            .map(|(i, s)| Todo::new(i.to_string(), "x", at(*s)))
            .collect();
        sort_newest_first(&mut todos);
        for pair in todos.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn replace_discards_previous_items() {
        let mut list = TodoList::new();
        list.replace(vec![Todo::new("a", "one", at(1)), Todo::new("b", "two", at(2))]);
        list.replace(vec![Todo::new("c", "three", at(3))]);
        assert_eq!(list.len(), 1);
        assert!(list.get("a").is_none());
        assert_eq!(list.get("c").map(|t| t.text.as_str()), Some("three"));
    }
}
