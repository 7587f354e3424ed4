//! Configuration variables: named, typed settings grouped in pools.
//!
//! Values are stored as text and parsed on read. Parsed values are cached
//! by variable name until a committed change touches the variable.

use super::{InventoryService, require_name};
use crate::cache::{CacheLayer, CacheUpdate};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    ActivityType, ApplicationPool, ConfigValue, ConfigVariableType, ConfigurationVariable,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue, now_millis};

/// Input for a new configuration variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConfigurationVariable {
    pub name: String,
    pub description: String,
    pub variable_type: ConfigVariableType,
    pub masked: bool,
    pub value_definition: String,
}

impl InventoryService {
    // =========================================================================
    // POOLS
    // =========================================================================

    pub fn create_configuration_variables_pool(
        &self,
        actor: &str,
        name: &str,
        description: &str,
    ) -> Result<String, InventoryError> {
        require_name(name, "pool")?;
        self.write(|tx, _| {
            let uuid = create_application_pool(tx, LABEL_CONFIG_VARIABLE_POOLS, name, description)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Configuration variables pool {} created", name)),
            )?;
            Ok(uuid)
        })
    }

    /// `property` is `name` or `description`.
    pub fn update_configuration_variables_pool(
        &self,
        actor: &str,
        uuid: &str,
        property: &str,
        value: &str,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, _| {
            let pool = application_pool_node(tx, LABEL_CONFIG_VARIABLE_POOLS, uuid)?;
            match property {
                PROPERTY_NAME => require_name(value, "pool")?,
                PROPERTY_DESCRIPTION => {}
                other => return Err(invalid_property(other)),
            }
            let mut change = ChangeDescriptor::new();
            change.record(property, pool.text(property).map(str::to_string), Some(value.to_string()));
            tx.set_property(pool.id, property, value.into())?;
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    /// Delete a pool with every variable in it.
    pub fn delete_configuration_variables_pool(
        &self,
        actor: &str,
        uuid: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let pool = application_pool_node(tx, LABEL_CONFIG_VARIABLE_POOLS, uuid)?;
            for rel in tx.incoming(pool.id, REL_CHILD_OF)? {
                let variable = tx.require_node(rel.start)?;
                effects.cache.push(CacheUpdate::RemoveConfigValue(variable.name()));
                tx.detach_delete(variable.id)?;
            }
            tx.detach_delete(pool.id)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Configuration variables pool {} deleted", pool.name())),
            )
        })
    }

    pub fn get_configuration_variables_pools(&self) -> Result<Vec<ApplicationPool>, InventoryError> {
        self.read(|tx| {
            let mut pools: Vec<_> = tx
                .nodes(LABEL_CONFIG_VARIABLE_POOLS)?
                .iter()
                .map(application_pool)
                .collect();
            pools.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(pools)
        })
    }

    // =========================================================================
    // VARIABLES
    // =========================================================================

    /// Create a variable in a pool. Names are unique across pools and the
    /// value must convert to the declared type.
    pub fn create_configuration_variable(
        &self,
        actor: &str,
        pool_uuid: &str,
        variable: &NewConfigurationVariable,
    ) -> Result<NodeId, InventoryError> {
        require_name(&variable.name, "configuration variable")?;
        parse_value(&variable.name, variable.variable_type, &variable.value_definition)?;
        self.write(|tx, effects| {
            let pool = application_pool_node(tx, LABEL_CONFIG_VARIABLE_POOLS, pool_uuid)?;
            if find_variable(tx, &variable.name)?.is_some() {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::CONFIG_VARIABLE_EXISTS).arg(&variable.name),
                ));
            }
            let node = tx.create_node(&[LABEL_CONFIG_VARIABLES])?;
            tx.set_property(node, PROPERTY_NAME, variable.name.as_str().into())?;
            tx.set_property(node, PROPERTY_DESCRIPTION, variable.description.as_str().into())?;
            tx.set_property(node, PROPERTY_TYPE, variable.variable_type.code().into())?;
            tx.set_property(node, PROPERTY_MASKED, variable.masked.into())?;
            tx.set_property(node, PROPERTY_VALUE, variable.value_definition.as_str().into())?;
            tx.relate(node, pool.id, REL_CHILD_OF)?;
            effects.cache.push(CacheUpdate::RemoveConfigValue(variable.name.clone()));
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Configuration variable {} created", variable.name)),
            )?;
            Ok(node)
        })
    }

    /// Update one property: `name`, `description`, `value`, `masked` or
    /// `type` (numeric code). The resulting value must still convert.
    pub fn update_configuration_variable(
        &self,
        actor: &str,
        name: &str,
        property: &str,
        value: &str,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let node = variable_node(tx, name)?;
            let mut variable = configuration_variable(&node)?;
            let new_value: PropertyValue = match property {
                PROPERTY_NAME => {
                    require_name(value, "configuration variable")?;
                    if value != name && find_variable(tx, value)?.is_some() {
                        return Err(InventoryError::InvalidArgument(
                            ErrorMessage::new(messages::CONFIG_VARIABLE_EXISTS).arg(value),
                        ));
                    }
                    variable.name = value.to_string();
                    value.into()
                }
                PROPERTY_DESCRIPTION => value.into(),
                PROPERTY_VALUE => {
                    variable.value_definition = value.to_string();
                    value.into()
                }
                PROPERTY_MASKED => match value {
                    "true" => true.into(),
                    "false" => false.into(),
                    _ => return Err(invalid_property(value)),
                },
                PROPERTY_TYPE => {
                    let code: i64 = value.parse().map_err(|_| invalid_type(value))?;
                    variable.variable_type =
                        ConfigVariableType::from_code(code).ok_or_else(|| invalid_type(value))?;
                    code.into()
                }
                other => return Err(invalid_property(other)),
            };
            parse_value(&variable.name, variable.variable_type, &variable.value_definition)?;

            let mut change = ChangeDescriptor::new();
            let old = node.property(property).map(PropertyValue::render);
            change.record(property, old, Some(value.to_string()));
            tx.set_property(node.id, property, new_value)?;
            effects.cache.push(CacheUpdate::RemoveConfigValue(name.to_string()));
            effects.cache.push(CacheUpdate::RemoveConfigValue(variable.name.clone()));
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    pub fn delete_configuration_variable(&self, actor: &str, name: &str) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = variable_node(tx, name)?;
            tx.detach_delete(node.id)?;
            effects.cache.push(CacheUpdate::RemoveConfigValue(name.to_string()));
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Configuration variable {} deleted", name)),
            )
        })
    }

    pub fn get_configuration_variable(&self, name: &str) -> Result<ConfigurationVariable, InventoryError> {
        self.read(|tx| configuration_variable(&variable_node(tx, name)?))
    }

    /// Typed value of a variable.
    pub fn get_configuration_variable_value(&self, name: &str) -> Result<ConfigValue, InventoryError> {
        self.read(|tx| config_value_in(&self.cache, tx, name))
    }

    pub fn get_configuration_variables_in_pool(
        &self,
        pool_uuid: &str,
    ) -> Result<Vec<ConfigurationVariable>, InventoryError> {
        self.read(|tx| {
            let pool = application_pool_node(tx, LABEL_CONFIG_VARIABLE_POOLS, pool_uuid)?;
            let mut out = Vec::new();
            for rel in tx.incoming(pool.id, REL_CHILD_OF)? {
                out.push(configuration_variable(&tx.require_node(rel.start)?)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    pub fn get_configuration_variables_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ConfigurationVariable>, InventoryError> {
        self.read(|tx| {
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_CONFIG_VARIABLES)? {
                if node.name().starts_with(prefix) {
                    out.push(configuration_variable(&node)?);
                }
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Typed value of a variable, served from the cache when it is current.
pub(super) fn config_value_in(
    cache: &CacheLayer,
    tx: &impl GraphRead,
    name: &str,
) -> Result<ConfigValue, InventoryError> {
    cache.get_or_load(
        tx.cache_epoch(),
        |c| c.config_values.get(name).cloned(),
        || {
            let variable = configuration_variable(&variable_node(tx, name)?)?;
            parse_value(name, variable.variable_type, &variable.value_definition)
        },
        |c, value| {
            c.config_values.insert(name.to_string(), value);
        },
    )
}

/// Parse a stored value. Arrays are comma separated; matrices separate
/// rows with `;` and cells with `,`.
pub fn parse_value(
    name: &str,
    variable_type: ConfigVariableType,
    raw: &str,
) -> Result<ConfigValue, InventoryError> {
    let invalid = || {
        InventoryError::InvalidArgument(
            ErrorMessage::new(messages::CONFIG_VALUE_INVALID)
                .arg(name)
                .arg(raw)
                .arg(format!("{:?}", variable_type)),
        )
    };
    let cells = |row: &str| -> Vec<String> {
        if row.trim().is_empty() {
            Vec::new()
        } else {
            row.split(',').map(|c| c.trim().to_string()).collect()
        }
    };
    Ok(match variable_type {
        ConfigVariableType::String => ConfigValue::Text(raw.to_string()),
        ConfigVariableType::Integer => ConfigValue::Integer(raw.trim().parse().map_err(|_| invalid())?),
        ConfigVariableType::Float => ConfigValue::Float(raw.trim().parse().map_err(|_| invalid())?),
        ConfigVariableType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => ConfigValue::Boolean(true),
            "false" => ConfigValue::Boolean(false),
            _ => return Err(invalid()),
        },
        ConfigVariableType::Array => ConfigValue::Array(cells(raw)),
        ConfigVariableType::Matrix => {
            if raw.trim().is_empty() {
                ConfigValue::Matrix(Vec::new())
            } else {
                ConfigValue::Matrix(raw.split(';').map(cells).collect())
            }
        }
    })
}

fn invalid_property(property: &str) -> InventoryError {
    InventoryError::InvalidArgument(ErrorMessage::new(messages::CONFIG_PROPERTY_INVALID).arg(property))
}

fn invalid_type(value: &str) -> InventoryError {
    InventoryError::InvalidArgument(ErrorMessage::new(messages::CONFIG_TYPE_INVALID).arg(value))
}

fn find_variable(tx: &impl GraphRead, name: &str) -> Result<Option<Node>, InventoryError> {
    tx.find_node(LABEL_CONFIG_VARIABLES, PROPERTY_NAME, &PropertyValue::from(name))
}

fn variable_node(tx: &impl GraphRead, name: &str) -> Result<Node, InventoryError> {
    find_variable(tx, name)?.ok_or_else(|| {
        InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::CONFIG_VARIABLE_NOT_FOUND).arg(name),
        )
    })
}

fn configuration_variable(node: &Node) -> Result<ConfigurationVariable, InventoryError> {
    let code = node.integer(PROPERTY_TYPE).unwrap_or(0);
    Ok(ConfigurationVariable {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        value_definition: node.text_or_empty(PROPERTY_VALUE),
        masked: node.boolean(PROPERTY_MASKED),
        variable_type: ConfigVariableType::from_code(code)
            .ok_or_else(|| invalid_type(&code.to_string()))?,
    })
}

/// Pool of application objects with this uuid and label.
pub(super) fn application_pool_node(
    tx: &impl GraphRead,
    label: &str,
    uuid: &str,
) -> Result<Node, InventoryError> {
    tx.node_by_uuid(uuid)?
        .filter(|n| n.has_label(label))
        .ok_or_else(|| {
            InventoryError::ApplicationObjectNotFound(
                ErrorMessage::new(messages::APPLICATION_POOL_NOT_FOUND).arg(uuid),
            )
        })
}

pub(super) fn application_pool(node: &Node) -> ApplicationPool {
    ApplicationPool {
        uuid: node.uuid().unwrap_or_default().to_string(),
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
    }
}

/// Create a uuid-identified application pool node.
pub(super) fn create_application_pool(
    tx: &impl GraphWrite,
    label: &str,
    name: &str,
    description: &str,
) -> Result<String, InventoryError> {
    let node = tx.create_node(&[label])?;
    let uuid = uuid::Uuid::new_v4().to_string();
    tx.set_property(node, PROPERTY_UUID, uuid.as_str().into())?;
    tx.set_property(node, PROPERTY_NAME, name.into())?;
    tx.set_property(node, PROPERTY_DESCRIPTION, description.into())?;
    tx.set_property(node, PROPERTY_CREATION_DATE, now_millis().into())?;
    Ok(uuid)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;

    fn variable(name: &str, variable_type: ConfigVariableType, value: &str) -> NewConfigurationVariable {
        NewConfigurationVariable {
            name: name.to_string(),
            description: String::new(),
            variable_type,
            masked: false,
            value_definition: value.to_string(),
        }
    }

    #[test]
    fn values_are_typed() {
        assert_eq!(
            parse_value("m", ConfigVariableType::Matrix, "a,b;c,d").expect("matrix"),
            ConfigValue::Matrix(vec![vec!["a".into(), "b".into()], vec!["c".into(), "d".into()]])
        );
        assert_eq!(
            parse_value("a", ConfigVariableType::Array, "x, y").expect("array"),
            ConfigValue::Array(vec!["x".into(), "y".into()])
        );
        assert_eq!(
            parse_value("b", ConfigVariableType::Boolean, "TRUE").expect("bool"),
            ConfigValue::Boolean(true)
        );
        let err = parse_value("i", ConfigVariableType::Integer, "ten").expect_err("not a number");
        assert_eq!(err.key(), Some(messages::CONFIG_VALUE_INVALID));
    }

    #[test]
    fn cached_value_follows_updates() {
        let service = service();
        let pool = service
            .create_configuration_variables_pool(ADMIN_USER, "general", "")
            .expect("pool");
        service
            .create_configuration_variable(
                ADMIN_USER,
                &pool,
                &variable("sync.interval", ConfigVariableType::Integer, "5"),
            )
            .expect("variable");
        assert_eq!(
            service.get_configuration_variable_value("sync.interval").expect("value"),
            ConfigValue::Integer(5)
        );
        service
            .update_configuration_variable(ADMIN_USER, "sync.interval", PROPERTY_VALUE, "15")
            .expect("update");
        assert_eq!(
            service.get_configuration_variable_value("sync.interval").expect("value"),
            ConfigValue::Integer(15)
        );
        let err = service
            .update_configuration_variable(ADMIN_USER, "sync.interval", PROPERTY_VALUE, "soon")
            .expect_err("invalid value");
        assert_eq!(err.key(), Some(messages::CONFIG_VALUE_INVALID));
        service
            .update_configuration_variable(ADMIN_USER, "sync.interval", PROPERTY_TYPE, "0")
            .expect("retype");
        assert_eq!(
            service.get_configuration_variable_value("sync.interval").expect("value"),
            ConfigValue::Text("15".into())
        );
    }

    #[test]
    fn names_are_unique_and_prefix_searchable() {
        let service = service();
        let pool = service
            .create_configuration_variables_pool(ADMIN_USER, "general", "")
            .expect("pool");
        for name in ["mail.host", "mail.port", "sync.interval"] {
            service
                .create_configuration_variable(ADMIN_USER, &pool, &variable(name, ConfigVariableType::String, "x"))
                .expect("variable");
        }
        let err = service
            .create_configuration_variable(
                ADMIN_USER,
                &pool,
                &variable("mail.host", ConfigVariableType::String, "y"),
            )
            .expect_err("duplicate");
        assert_eq!(err.key(), Some(messages::CONFIG_VARIABLE_EXISTS));
        assert_eq!(service.get_configuration_variables_with_prefix("mail.").expect("prefix").len(), 2);
        assert_eq!(service.get_configuration_variables_in_pool(&pool).expect("pool").len(), 3);

        service
            .update_configuration_variables_pool(ADMIN_USER, &pool, PROPERTY_NAME, "core")
            .expect("rename pool");
        assert_eq!(service.get_configuration_variables_pools().expect("pools")[0].name, "core");
        service.delete_configuration_variable(ADMIN_USER, "mail.port").expect("delete");
        service
            .delete_configuration_variables_pool(ADMIN_USER, &pool)
            .expect("delete pool");
        let err = service.get_configuration_variable("mail.host").expect_err("gone");
        assert_eq!(err.key(), Some(messages::CONFIG_VARIABLE_NOT_FOUND));
    }

    #[test]
    fn cached_values_go_with_their_variable() {
        let service = service();
        let pool = service
            .create_configuration_variables_pool(ADMIN_USER, "general", "")
            .expect("pool");
        for name in ["mail.host", "mail.port", "sync.interval"] {
            service
                .create_configuration_variable(ADMIN_USER, &pool, &variable(name, ConfigVariableType::String, "x"))
                .expect("variable");
            service.get_configuration_variable_value(name).expect("cached");
        }

        service.delete_configuration_variable(ADMIN_USER, "mail.port").expect("delete");
        let err = service
            .get_configuration_variable_value("mail.port")
            .expect_err("deleted");
        assert_eq!(err.key(), Some(messages::CONFIG_VARIABLE_NOT_FOUND));

        service
            .update_configuration_variable(ADMIN_USER, "mail.host", PROPERTY_NAME, "smtp.host")
            .expect("rename");
        let err = service
            .get_configuration_variable_value("mail.host")
            .expect_err("old name");
        assert_eq!(err.key(), Some(messages::CONFIG_VARIABLE_NOT_FOUND));
        assert_eq!(
            service.get_configuration_variable_value("smtp.host").expect("new name"),
            ConfigValue::Text("x".into())
        );

        service
            .delete_configuration_variables_pool(ADMIN_USER, &pool)
            .expect("delete pool");
        let err = service
            .get_configuration_variable_value("sync.interval")
            .expect_err("pool deleted");
        assert_eq!(err.key(), Some(messages::CONFIG_VARIABLE_NOT_FOUND));
    }
}
