//! Task registration.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::spec::TaskSpec;

/// Receives the task list of a group in one call.
pub trait TaskRegistry {
    /// Registers every task.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateName` if a name is already taken; no
    /// task is registered in that case.
    fn register_all(&mut self, tasks: Vec<TaskSpec>) -> Result<()>;
}

/// Name-indexed table of registered tasks.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: IndexMap<String, TaskSpec>,
}

impl TaskTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a task.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTask` if no task has the name.
    pub fn get(&self, name: &str) -> Result<&TaskSpec> {
        self.tasks.get(name).ok_or_else(|| {
            ConfigError::UnknownTask {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.values()
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskRegistry for TaskTable {
    fn register_all(&mut self, tasks: Vec<TaskSpec>) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for task in &tasks {
            if self.tasks.contains_key(&task.name) || !seen.insert(task.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    resource_type: String::from("task"),
                    name: task.name.clone(),
                }
                .into());
            }
        }

        debug!("Registering {} tasks", tasks.len());
        for task in tasks {
            self.tasks.insert(task.name.clone(), task);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskAction;

    fn spec(name: &str) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            usage: String::new(),
            description: String::new(),
            action: TaskAction::Force,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = TaskTable::new();
        table.register_all(vec![spec("force"), spec("list_stacks")]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("force").unwrap().name, "force");
        assert!(table.get("nope").is_err());
    }

    #[test]
    fn test_duplicate_registration_is_atomic() {
        let mut table = TaskTable::new();
        table.register_all(vec![spec("force")]).unwrap();

        let err = table
            .register_all(vec![spec("list_stacks"), spec("force")])
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate task name: force"));
        assert_eq!(table.len(), 1);

        assert!(table.register_all(vec![spec("a"), spec("a")]).is_err());
    }
}
