//! # Tasks
//!
//! Stored scripts run on demand against a write transaction. Parameters
//! live on the task node as `PARAM_<name>` properties and reach the script
//! as the `parameters` map.
//!
//! A task declared `commitOnExecute` keeps what its script wrote; any
//! other task runs as a dry run and its transaction is dropped.

use super::InventoryService;
use super::host::{HostTx, TxHost};
use super::users::{user_node, user_profile};
use crate::cache::CacheUpdate;
use crate::messages;
use crate::primitives::*;
use crate::rules::expect_task_result;
use crate::script::{Bindings, CompiledScript, ScriptHost, ScriptValue};
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    ActivityType, NewTask, Task, TaskNotificationDescriptor, TaskResult, TaskScheduleDescriptor,
    UserProfile,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue, RelId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of compiled task scripts in the artifact cache.
const TASK_ARTIFACT: &str = "Task";

/// A task whose script completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The script's writes were committed.
    Committed(TaskResult),
    /// The script's writes were discarded.
    Discarded(TaskResult),
}

impl TaskOutcome {
    pub fn result(&self) -> &TaskResult {
        match self {
            Self::Committed(result) | Self::Discarded(result) => result,
        }
    }
}

/// A task that failed. Graph writes are always rolled back; blobs the
/// script saved before failing are not.
#[derive(Debug, thiserror::Error)]
pub enum TaskExecutionError {
    #[error("{0}")]
    RolledBack(#[from] InventoryError),

    #[error("{error} (already written: {effects})", effects = .external_effects.join(", "))]
    PartiallyApplied {
        error: InventoryError,
        external_effects: Vec<String>,
    },
}

impl TaskExecutionError {
    pub fn error(&self) -> &InventoryError {
        match self {
            Self::RolledBack(error) | Self::PartiallyApplied { error, .. } => error,
        }
    }
}

impl InventoryService {
    // =========================================================================
    // DEFINITIONS
    // =========================================================================

    pub fn create_task(&self, actor: &str, task: &NewTask) -> Result<NodeId, InventoryError> {
        super::require_name(&task.name, "task")?;
        self.write(|tx, _| {
            let id = tx.create_node(&[LABEL_TASKS])?;
            tx.set_property(id, PROPERTY_NAME, task.name.as_str().into())?;
            tx.set_property(id, PROPERTY_DESCRIPTION, task.description.as_str().into())?;
            tx.set_property(id, PROPERTY_ENABLED, task.enabled.into())?;
            tx.set_property(id, PROPERTY_COMMIT_ON_EXECUTE, task.commit_on_execute.into())?;
            if let Some(script) = &task.script {
                tx.set_property(id, PROPERTY_SCRIPT, script.as_str().into())?;
            }
            for (name, value) in &task.parameters {
                tx.set_property(id, &parameter_key(name), value.as_str().into())?;
            }
            write_schedule(tx, id, &task.schedule)?;
            write_notification(tx, id, &task.notification)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Task {} created", task.name)),
            )?;
            Ok(id)
        })
    }

    /// Change one of `name`, `description`, `enabled`, `commitOnExecute`
    /// or `script`. An empty script removes it.
    pub fn update_task_properties(
        &self,
        actor: &str,
        id: NodeId,
        property: &str,
        value: &str,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let node = task_node(tx, id)?;
            let new_value = match property {
                PROPERTY_NAME => {
                    super::require_name(value, "task")?;
                    Some(PropertyValue::from(value))
                }
                PROPERTY_DESCRIPTION => Some(PropertyValue::from(value)),
                PROPERTY_ENABLED | PROPERTY_COMMIT_ON_EXECUTE => {
                    Some(PropertyValue::Boolean(parse_flag(property, value)?))
                }
                PROPERTY_SCRIPT => {
                    effects.cache.push(CacheUpdate::RemoveArtifact(TASK_ARTIFACT.to_string(), id));
                    (!value.is_empty()).then(|| PropertyValue::from(value))
                }
                other => {
                    return Err(InventoryError::InvalidArgument(
                        ErrorMessage::new(messages::TASK_PROPERTY_INVALID).arg(other),
                    ));
                }
            };
            let mut change = ChangeDescriptor::new();
            assign(tx, &node, property, new_value, &mut change)?;
            change.notes = format!("Task {} updated", node.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    /// Set parameters; a `None` value removes the parameter.
    pub fn update_task_parameters(
        &self,
        actor: &str,
        id: NodeId,
        parameters: &BTreeMap<String, Option<String>>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, _| {
            let node = task_node(tx, id)?;
            let mut change = ChangeDescriptor::new();
            for (name, value) in parameters {
                let value = value.as_deref().map(PropertyValue::from);
                assign(tx, &node, &parameter_key(name), value, &mut change)?;
            }
            change.notes = format!("Parameters of task {} updated", node.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    pub fn update_task_schedule(
        &self,
        actor: &str,
        id: NodeId,
        schedule: &TaskScheduleDescriptor,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, _| {
            let node = task_node(tx, id)?;
            let mut change = ChangeDescriptor::new();
            for (key, value) in [
                (PROPERTY_START_TIME, schedule.start_time),
                (PROPERTY_EVERY_X_MINUTES, schedule.every_x_minutes),
                (PROPERTY_EXECUTION_TYPE, schedule.execution_type),
            ] {
                assign(tx, &node, key, Some(value.into()), &mut change)?;
            }
            change.notes = format!("Schedule of task {} updated", node.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    pub fn update_task_notification_type(
        &self,
        actor: &str,
        id: NodeId,
        notification: &TaskNotificationDescriptor,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, _| {
            let node = task_node(tx, id)?;
            let mut change = ChangeDescriptor::new();
            assign(tx, &node, PROPERTY_EMAIL, Some(notification.email.as_str().into()), &mut change)?;
            assign(
                tx,
                &node,
                PROPERTY_NOTIFICATION_TYPE,
                Some(notification.notification_type.into()),
                &mut change,
            )?;
            change.notes = format!("Notification of task {} updated", node.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    /// Delete the task and drop its subscriptions.
    pub fn delete_task(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = task_node(tx, id)?;
            tx.detach_delete(node.id)?;
            effects.cache.push(CacheUpdate::RemoveArtifact(TASK_ARTIFACT.to_string(), id));
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Task {} deleted", node.name())),
            )
        })
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    pub fn subscribe_user_to_task(
        &self,
        actor: &str,
        user: &str,
        id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let task = task_node(tx, id)?;
            let user = user_node(tx, user)?;
            if subscription(tx, user.id, task.id)?.is_some() {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ALREADY_SUBSCRIBED)
                        .arg(user.name())
                        .arg(task.name()),
                ));
            }
            tx.relate(user.id, task.id, REL_SUBSCRIBED_TO)?;
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!(
                    "User {} subscribed to task {}",
                    user.name(),
                    task.name()
                )),
            )
        })
    }

    pub fn unsubscribe_user_from_task(
        &self,
        actor: &str,
        user: &str,
        id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let task = task_node(tx, id)?;
            let user = user_node(tx, user)?;
            let rel = subscription(tx, user.id, task.id)?.ok_or_else(|| {
                InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::NOT_SUBSCRIBED)
                        .arg(user.name())
                        .arg(task.name()),
                )
            })?;
            tx.delete_relationship(rel)?;
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!(
                    "User {} unsubscribed from task {}",
                    user.name(),
                    task.name()
                )),
            )
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn get_task(&self, id: NodeId) -> Result<Task, InventoryError> {
        self.read(|tx| Ok(task(&task_node(tx, id)?)))
    }

    pub fn get_tasks(&self) -> Result<Vec<Task>, InventoryError> {
        self.read(|tx| Ok(tx.nodes(LABEL_TASKS)?.iter().map(task).collect()))
    }

    pub fn get_tasks_for_user(&self, user: &str) -> Result<Vec<Task>, InventoryError> {
        self.read(|tx| {
            let user = user_node(tx, user)?;
            let mut out = Vec::new();
            for rel in tx.outgoing(user.id, REL_SUBSCRIBED_TO)? {
                out.push(task(&tx.require_node(rel.end)?));
            }
            out.sort_by_key(|t| t.id);
            Ok(out)
        })
    }

    pub fn get_subscribers_for_task(&self, id: NodeId) -> Result<Vec<UserProfile>, InventoryError> {
        self.read(|tx| {
            let task = task_node(tx, id)?;
            let mut out = Vec::new();
            for rel in tx.incoming(task.id, REL_SUBSCRIBED_TO)? {
                out.push(user_profile(tx, &tx.require_node(rel.start)?)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Run the task script on a write transaction within the configured
    /// execution budget.
    pub fn execute_task(&self, actor: &str, id: NodeId) -> Result<TaskOutcome, TaskExecutionError> {
        let (definition, script) = self.read(|tx| {
            let definition = task(&task_node(tx, id)?);
            if !definition.enabled {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::TASK_DISABLED).arg(&definition.name),
                ));
            }
            let script = self.task_script(tx, &definition)?;
            Ok((definition, script))
        })?;

        let host = self.write_host(actor, script.context())?;
        let mut bindings = Bindings::new();
        bindings.insert(
            "parameters".to_string(),
            ScriptValue::Map(
                definition
                    .parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), ScriptValue::from(v.as_str())))
                    .collect(),
            ),
        );
        let result = self
            .rules
            .invoke(&script, Arc::clone(&host) as Arc<dyn ScriptHost>, bindings, &self.budget())
            .and_then(|value| expect_task_result(script.context(), value));

        match result {
            Ok(result) => self.finish_task(actor, &definition, &host, result),
            Err(error) => {
                discard(&host);
                self.log_task_best_effort(actor, &definition, &format!("failed: {}", error));
                Err(failure(&host, error))
            }
        }
    }

    fn finish_task(
        &self,
        actor: &str,
        definition: &Task,
        host: &TxHost,
        result: TaskResult,
    ) -> Result<TaskOutcome, TaskExecutionError> {
        if !definition.commit_on_execute {
            discard(host);
            self.log_task_best_effort(actor, definition, "executed without commit");
            return Ok(TaskOutcome::Discarded(result));
        }
        let Some(HostTx::Write(tx)) = host.finish() else {
            return Err(failure(host, InventoryError::Storage(format!(
                "task {} lost its transaction",
                definition.name
            ))));
        };
        let committed = self
            .log_general(&tx, actor, ActivityType::ExecuteTask, &task_change(definition, "executed"))
            .and_then(|_| tx.commit());
        match committed {
            Ok(()) => {
                self.cache.apply(host.take_cache_updates());
                tracing::info!(event = "task_executed", task = %definition.name, actor = %actor);
                Ok(TaskOutcome::Committed(result))
            }
            Err(error) => Err(failure(host, error)),
        }
    }

    /// Dry runs and failures leave no transaction to log in, so the entry
    /// gets its own.
    fn log_task_best_effort(&self, actor: &str, definition: &Task, what: &str) {
        let change = task_change(definition, what);
        if let Err(e) = self.write(|tx, _| self.log_general(tx, actor, ActivityType::ExecuteTask, &change)) {
            tracing::warn!(
                event = "task_log_failed",
                task = %definition.name,
                reason = %e,
                "Task execution could not be recorded in the audit trail"
            );
        }
    }

    fn task_script(&self, tx: &impl GraphRead, definition: &Task) -> Result<CompiledScript, InventoryError> {
        let source = definition.script.as_deref().ok_or_else(|| {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::TASK_NO_SCRIPT).arg(&definition.name),
            )
        })?;
        let key = (TASK_ARTIFACT.to_string(), definition.id);
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.artifacts.get(&key).cloned(),
            || self.rules.compile(source, &format!("task {}", definition.name)),
            |c, script| {
                c.artifacts.insert(key.clone(), script);
            },
        )
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Drop the host's transaction; nothing it wrote survives.
fn discard(host: &TxHost) {
    if let Some(HostTx::Write(tx)) = host.finish() {
        if let Err(e) = tx.abort() {
            tracing::warn!(event = "task_abort_failed", reason = %e, "Task transaction abort failed");
        }
    }
}

fn failure(host: &TxHost, error: InventoryError) -> TaskExecutionError {
    let external_effects = host.external_effects();
    if external_effects.is_empty() {
        TaskExecutionError::RolledBack(error)
    } else {
        TaskExecutionError::PartiallyApplied { error, external_effects }
    }
}

fn task_change(definition: &Task, what: &str) -> ChangeDescriptor {
    ChangeDescriptor::with_notes(format!("Task {} {}", definition.name, what))
}

fn parameter_key(name: &str) -> String {
    format!("{}{}", TASK_PARAMETER_PREFIX, name)
}

fn parse_flag(property: &str, value: &str) -> Result<bool, InventoryError> {
    value.parse().map_err(|_| {
        InventoryError::InvalidArgument(
            ErrorMessage::new(messages::TASK_PROPERTY_INVALID).arg(format!("{}={}", property, value)),
        )
    })
}

/// Set or remove one property, recording the change.
fn assign(
    tx: &impl GraphWrite,
    node: &Node,
    key: &str,
    value: Option<PropertyValue>,
    change: &mut ChangeDescriptor,
) -> Result<(), InventoryError> {
    let old = node.property(key).cloned();
    if old == value {
        return Ok(());
    }
    match &value {
        Some(value) => tx.set_property(node.id, key, value.clone())?,
        None => {
            tx.remove_property(node.id, key)?;
        }
    }
    change.record(
        key,
        old.as_ref().map(PropertyValue::render),
        value.as_ref().map(PropertyValue::render),
    );
    Ok(())
}

fn write_schedule(
    tx: &impl GraphWrite,
    id: NodeId,
    schedule: &TaskScheduleDescriptor,
) -> Result<(), InventoryError> {
    tx.set_property(id, PROPERTY_START_TIME, schedule.start_time.into())?;
    tx.set_property(id, PROPERTY_EVERY_X_MINUTES, schedule.every_x_minutes.into())?;
    tx.set_property(id, PROPERTY_EXECUTION_TYPE, schedule.execution_type.into())
}

fn write_notification(
    tx: &impl GraphWrite,
    id: NodeId,
    notification: &TaskNotificationDescriptor,
) -> Result<(), InventoryError> {
    tx.set_property(id, PROPERTY_EMAIL, notification.email.as_str().into())?;
    tx.set_property(id, PROPERTY_NOTIFICATION_TYPE, notification.notification_type.into())
}

fn task_node(tx: &impl GraphRead, id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(id)? {
        Some(node) if node.has_label(LABEL_TASKS) => Ok(node),
        _ => Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::TASK_NOT_FOUND).arg(id),
        )),
    }
}

fn subscription(
    tx: &impl GraphRead,
    user: NodeId,
    task: NodeId,
) -> Result<Option<RelId>, InventoryError> {
    Ok(tx
        .outgoing(user, REL_SUBSCRIBED_TO)?
        .into_iter()
        .find(|rel| rel.end == task)
        .map(|rel| rel.id))
}

fn task(node: &Node) -> Task {
    let parameters = node
        .properties
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(TASK_PARAMETER_PREFIX)
                .map(|name| (name.to_string(), value.render()))
        })
        .collect();
    Task {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        enabled: node.boolean(PROPERTY_ENABLED),
        commit_on_execute: node.boolean(PROPERTY_COMMIT_ON_EXECUTE),
        script: node.text(PROPERTY_SCRIPT).map(str::to_string),
        parameters,
        schedule: TaskScheduleDescriptor {
            start_time: node.integer(PROPERTY_START_TIME).unwrap_or(0),
            every_x_minutes: node.integer(PROPERTY_EVERY_X_MINUTES).unwrap_or(0),
            execution_type: node.integer(PROPERTY_EXECUTION_TYPE).unwrap_or(0),
        },
        notification: TaskNotificationDescriptor {
            email: node.text_or_empty(PROPERTY_EMAIL),
            notification_type: node.integer(PROPERTY_NOTIFICATION_TYPE).unwrap_or(0),
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
