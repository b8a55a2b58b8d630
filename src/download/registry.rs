use super::error::ControllerError;
use super::task::{Task, TaskId};
use std::collections::{HashMap, VecDeque};

/// Every live task, newest first.
///
/// The registry is the only place task state is stored; views are derived
/// from it. It has no locking of its own and lives inside the controller
/// context.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
    order: VecDeque<TaskId>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, task: Task) -> Result<(), ControllerError> {
        if self.tasks.contains_key(&task.id) {
            return Err(ControllerError::DuplicateTask(task.id));
        }
        self.order.push_front(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Run `f` against the task if it exists
    pub fn update<R>(&mut self, id: &TaskId, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        self.tasks.get_mut(id).map(f)
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        if let Some(pos) = self.order.iter().position(|t| t == id) {
            self.order.remove(pos);
        }
        Some(task)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids in display order
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }

    /// Tasks in display order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::task::{TaskMeta, TaskState};
    use pretty_assertions::assert_eq;

    fn create_test_task(id: &str) -> Task {
        Task::new(
            TaskId::new(id),
            TaskMeta {
                title: format!("Title {}", id),
                format_label: "best".to_string(),
                file_extension: "mp4".to_string(),
                estimated_size: None,
            },
            "Waiting...",
        )
    }

    #[test]
    fn test_registry_new_empty() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_newest_first() {
        let mut registry = TaskRegistry::new();
        registry.create(create_test_task("a")).unwrap();
        registry.create(create_test_task("b")).unwrap();
        registry.create(create_test_task("c")).unwrap();

        let ids: Vec<&str> = registry.ids().map(TaskId::as_str).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        let titles: Vec<&str> = registry.iter().map(|t| t.meta.title.as_str()).collect();
        assert_eq!(titles, vec!["Title c", "Title b", "Title a"]);
    }

    #[test]
    fn test_registry_duplicate_rejected() {
        let mut registry = TaskRegistry::new();
        registry.create(create_test_task("a")).unwrap();
        let err = registry.create(create_test_task("a")).unwrap_err();
        assert_eq!(err, ControllerError::DuplicateTask(TaskId::new("a")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_update_existing() {
        let mut registry = TaskRegistry::new();
        registry.create(create_test_task("a")).unwrap();

        let applied = registry.update(&TaskId::new("a"), |t| {
            t.apply_progress(Some(45), TaskState::Downloading, "Downloading")
        });
        assert_eq!(applied, Some(true));
        assert_eq!(registry.get(&TaskId::new("a")).unwrap().progress_percent, 45);
    }

    #[test]
    fn test_registry_update_nonexistent_is_noop() {
        let mut registry = TaskRegistry::new();
        let applied = registry.update(&TaskId::new("ghost"), |t| t.complete("done"));
        assert_eq!(applied, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_remove_keeps_order() {
        let mut registry = TaskRegistry::new();
        for id in ["a", "b", "c"] {
            registry.create(create_test_task(id)).unwrap();
        }

        let removed = registry.remove(&TaskId::new("b")).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert!(registry.remove(&TaskId::new("b")).is_none());

        let ids: Vec<&str> = registry.ids().map(TaskId::as_str).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(!registry.contains(&TaskId::new("b")));
    }
}
