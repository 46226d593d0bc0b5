use crate::backend::{Subscription, TodoBackend};
use crate::core::todo::{Todo, TodoList, normalize_text};
use crate::error::{Result, TodoError};

/// At most one row is being edited at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing { id: String, draft: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Blank text, or nothing was being edited.
    Cancelled,
}

/// The todo list bound to a backend. Every change goes through the backend
/// and the list is only ever replaced by what the backend reports back.
pub struct TodoApp {
    backend: Box<dyn TodoBackend>,
    list: TodoList,
    edit: EditState,
    subscription: Option<Subscription>,
}

impl TodoApp {
    pub fn new(backend: Box<dyn TodoBackend>) -> Self {
        let subscription = backend.subscribe();
        Self {
            backend,
            list: TodoList::new(),
            edit: EditState::Idle,
            subscription,
        }
    }

    pub fn backend(&self) -> &dyn TodoBackend {
        self.backend.as_ref()
    }

    pub fn items(&self) -> &[Todo] {
        self.list.items()
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.list.get(id)
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// Reload the list. On any failure the previous list stays as it was.
    pub async fn refresh(&mut self) -> Result<()> {
        if let Some(sub) = self.subscription.as_mut() {
            self.list.replace(sub.snapshot());
            return Ok(());
        }
        match self.backend.list().await {
            Ok(todos) => {
                self.list.replace(todos);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load todos from {}: {}", self.backend.describe(), e);
                Err(e)
            }
        }
    }

    /// Apply a pushed snapshot if one is waiting. Returns true if the list changed.
    pub fn apply_pending(&mut self) -> bool {
        match self.subscription.as_mut() {
            Some(sub) if sub.has_changed() => {
                self.list.replace(sub.snapshot());
                true
            }
            _ => false,
        }
    }

    /// Wait for the next pushed snapshot and apply it.
    /// Returns false for backends that do not push, or once the stream ends.
    pub async fn next_update(&mut self) -> bool {
        let Some(sub) = self.subscription.as_mut() else {
            return false;
        };
        match sub.next().await {
            Some(todos) => {
                self.list.replace(todos);
                true
            }
            None => false,
        }
    }

    async fn after_write(&mut self) -> Result<()> {
        if self.is_live() {
            self.apply_pending();
            Ok(())
        } else {
            self.refresh().await
        }
    }

    /// Create a todo from the input box. The input is cleared only on success.
    pub async fn submit(&mut self, input: &mut String) -> Result<()> {
        let text = normalize_text(input).ok_or(TodoError::EmptyText)?.to_string();
        if let Err(e) = self.backend.create(&text).await {
            log::error!("Failed to create todo: {}", e);
            return Err(e);
        }
        input.clear();
        self.after_write().await
    }

    pub fn start_edit(&mut self, id: &str) -> Result<()> {
        let todo = self
            .list
            .get(id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        self.edit = EditState::Editing {
            id: todo.id.clone(),
            draft: todo.text.clone(),
        };
        Ok(())
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let EditState::Editing { draft, .. } = &mut self.edit {
            *draft = text.into();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.edit = EditState::Idle;
    }

    /// Save the draft. Blank text cancels the edit without touching the backend.
    /// On failure the row stays in edit mode.
    pub async fn save_edit(&mut self) -> Result<SaveOutcome> {
        let EditState::Editing { id, draft } = &self.edit else {
            return Ok(SaveOutcome::Cancelled);
        };
        let Some(text) = normalize_text(draft) else {
            log::debug!("Blank edit of {}, cancelling", id);
            self.cancel_edit();
            return Ok(SaveOutcome::Cancelled);
        };
        let (id, text) = (id.clone(), text.to_string());

        if let Err(e) = self.backend.update(&id, &text).await {
            log::error!("Failed to update todo {}: {}", id, e);
            return Err(e);
        }
        self.edit = EditState::Idle;
        self.after_write().await?;
        Ok(SaveOutcome::Saved)
    }

    /// Delete a todo once `confirm` agrees. Returns false if it was declined.
    pub async fn delete(&mut self, id: &str, confirm: impl FnOnce(&Todo) -> bool) -> Result<bool> {
        let todo = self
            .list
            .get(id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        if !confirm(todo) {
            return Ok(false);
        }
        if let Err(e) = self.backend.delete(id).await {
            log::error!("Failed to delete todo {}: {}", id, e);
            return Err(e);
        }
        if matches!(&self.edit, EditState::Editing { id: editing, .. } if editing == id) {
            self.edit = EditState::Idle;
        }
        self.after_write().await?;
        Ok(true)
    }
}
