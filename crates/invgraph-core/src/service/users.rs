//! Users, groups, privileges and login sessions.
//!
//! ```text
//! (user) -BELONGS_TO_GROUP-> (group) -CHILD_OF-> (Groups)
//! (user | group) -HAS_PRIVILEGE-> (privilege)
//! ```
//!
//! Every user belongs to at least one group. Deleted users are relabelled
//! so the audit entries they performed keep their actor.

use super::InventoryService;
use crate::cache::CacheUpdate;
use crate::hierarchy::special_node;
use crate::messages;
use crate::primitives::*;
use crate::schema::name_matches;
use crate::session::{hash_password, verify_password};
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    AccessLevel, ActivityType, GroupProfile, NewUser, Privilege, Session, SessionType,
    UserProfile, UserType, UserUpdate,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue, now_millis};
use regex::Regex;
use std::sync::LazyLock;

static USER_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(USER_NAME_PATTERN).ok());
static GROUP_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(GROUP_NAME_PATTERN).ok());

impl InventoryService {
    // =========================================================================
    // USERS
    // =========================================================================

    pub fn create_user(&self, actor: &str, user: &NewUser) -> Result<NodeId, InventoryError> {
        check_user_name(&user.name)?;
        if user.password.is_empty() {
            return Err(InventoryError::InvalidArgument(ErrorMessage::new(
                messages::PASSWORD_EMPTY,
            )));
        }
        self.write(|tx, effects| {
            if find_user(tx, &user.name)?.is_some() {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::USER_EXISTS).arg(&user.name),
                ));
            }
            let group = tx
                .node(user.default_group)?
                .filter(|g| g.has_label(LABEL_GROUPS))
                .ok_or_else(|| {
                    InventoryError::ApplicationObjectNotFound(
                        ErrorMessage::new(messages::GROUP_NOT_FOUND).arg(user.default_group),
                    )
                })?;
            let node = tx.create_node(&[LABEL_USERS])?;
            tx.set_property(node, PROPERTY_NAME, user.name.as_str().into())?;
            tx.set_property(node, PROPERTY_PASSWORD, hash_password(&user.password).into())?;
            tx.set_property(node, PROPERTY_FIRST_NAME, user.first_name.as_str().into())?;
            tx.set_property(node, PROPERTY_LAST_NAME, user.last_name.as_str().into())?;
            tx.set_property(node, PROPERTY_EMAIL, user.email.as_str().into())?;
            tx.set_property(node, PROPERTY_ENABLED, user.enabled.into())?;
            tx.set_property(node, PROPERTY_TYPE, user.user_type.code().into())?;
            tx.set_property(node, PROPERTY_CREATION_DATE, now_millis().into())?;
            tx.relate(node, group.id, REL_BELONGS_TO_GROUP)?;
            for privilege in &user.privileges {
                set_privilege(tx, node, privilege)?;
            }
            effects
                .cache
                .push(CacheUpdate::PutUser(user_profile(tx, &tx.require_node(node)?)?));
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("User {} created", user.name)),
            )?;
            Ok(node)
        })
    }

    pub fn get_user(&self, name: &str) -> Result<UserProfile, InventoryError> {
        self.read(|tx| {
            self.cache.get_or_load(
                tx.cache_epoch(),
                |c| c.users.get(name).cloned(),
                || user_profile(tx, &user_node(tx, name)?),
                |c, user| {
                    c.users.insert(name.to_string(), user);
                },
            )
        })
    }

    /// Every active user, sorted by name.
    pub fn get_users(&self) -> Result<Vec<UserProfile>, InventoryError> {
        self.read(|tx| {
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_USERS)? {
                out.push(user_profile(tx, &node)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    /// Disabling a user closes its sessions.
    pub fn set_user_properties(
        &self,
        actor: &str,
        name: &str,
        update: &UserUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        let (change, profile) = self.write(|tx, effects| {
            let node = user_node(tx, name)?;
            if user_type(&node) == UserType::System {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::SYSTEM_USER).arg(name),
                ));
            }
            let mut change = ChangeDescriptor::new();
            if let Some(new_name) = &update.name {
                if new_name != name {
                    check_user_name(new_name)?;
                    if find_user(tx, new_name)?.is_some() {
                        return Err(InventoryError::InvalidArgument(
                            ErrorMessage::new(messages::USER_EXISTS).arg(new_name),
                        ));
                    }
                    change.record(PROPERTY_NAME, Some(name.to_string()), Some(new_name.clone()));
                    tx.set_property(node.id, PROPERTY_NAME, new_name.as_str().into())?;
                }
            }
            if let Some(password) = &update.password {
                if password.is_empty() {
                    return Err(InventoryError::InvalidArgument(ErrorMessage::new(
                        messages::PASSWORD_EMPTY,
                    )));
                }
                change.record(PROPERTY_PASSWORD, None, None);
                tx.set_property(node.id, PROPERTY_PASSWORD, hash_password(password).into())?;
            }
            for (key, value) in [
                (PROPERTY_FIRST_NAME, &update.first_name),
                (PROPERTY_LAST_NAME, &update.last_name),
                (PROPERTY_EMAIL, &update.email),
            ] {
                if let Some(value) = value {
                    change.record(key, node.text(key).map(str::to_string), Some(value.clone()));
                    tx.set_property(node.id, key, value.as_str().into())?;
                }
            }
            if let Some(enabled) = update.enabled {
                change.record(
                    PROPERTY_ENABLED,
                    Some(node.boolean(PROPERTY_ENABLED).to_string()),
                    Some(enabled.to_string()),
                );
                tx.set_property(node.id, PROPERTY_ENABLED, enabled.into())?;
            }
            if let Some(user_type) = update.user_type {
                change.record(
                    PROPERTY_TYPE,
                    node.integer(PROPERTY_TYPE).map(|c| c.to_string()),
                    Some(user_type.code().to_string()),
                );
                tx.set_property(node.id, PROPERTY_TYPE, user_type.code().into())?;
            }
            let profile = user_profile(tx, &tx.require_node(node.id)?)?;
            effects.cache.push(CacheUpdate::PutUser(profile.clone()));
            if !change.is_empty() {
                self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            }
            Ok((change, profile))
        })?;
        if profile.enabled {
            self.sessions.refresh_user(&profile);
        } else {
            self.sessions.close_user_sessions(profile.id);
        }
        Ok(change)
    }

    pub fn add_user_to_group(&self, actor: &str, user: &str, group: &str) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let user_node = user_node(tx, user)?;
            let group_node = group_node(tx, group)?;
            if membership(tx, user_node.id, group_node.id)?.is_some() {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ALREADY_MEMBER).arg(user).arg(group),
                ));
            }
            tx.relate(user_node.id, group_node.id, REL_BELONGS_TO_GROUP)?;
            effects.cache.push(CacheUpdate::UsersChanged);
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!("User {} added to group {}", user, group)),
            )
        })
    }

    pub fn remove_user_from_group(
        &self,
        actor: &str,
        user: &str,
        group: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let user_node = user_node(tx, user)?;
            let group_node = group_node(tx, group)?;
            let rel = membership(tx, user_node.id, group_node.id)?.ok_or_else(|| {
                InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::NOT_MEMBER).arg(user).arg(group),
                )
            })?;
            if tx.outgoing(user_node.id, REL_BELONGS_TO_GROUP)?.len() == 1 {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::ORPHAN_USER).arg(user).arg(group),
                ));
            }
            tx.delete_relationship(rel)?;
            effects.cache.push(CacheUpdate::UsersChanged);
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!("User {} removed from group {}", user, group)),
            )
        })
    }

    /// Delete users. The default administrator, system users and users
    /// with open sessions can not be deleted.
    pub fn delete_users(&self, actor: &str, names: &[&str]) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            for name in names {
                let node = user_node(tx, name)?;
                self.retire_user(tx, &node)?;
                effects.cache.push(CacheUpdate::RemoveUser(name.to_string()));
                self.log_general(
                    tx,
                    actor,
                    ActivityType::DeleteApplicationObject,
                    &ChangeDescriptor::with_notes(format!("User {} deleted", name)),
                )?;
            }
            Ok(())
        })
    }

    fn retire_user(&self, tx: &impl GraphWrite, node: &Node) -> Result<(), InventoryError> {
        let name = node.name();
        if name == ADMIN_USER {
            return Err(InventoryError::OperationNotPermitted(ErrorMessage::new(
                messages::ADMIN_PROTECTED,
            )));
        }
        if user_type(node) == UserType::System {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::SYSTEM_USER).arg(&name),
            ));
        }
        if self.sessions.has_sessions(node.id) {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::USER_HAS_SESSIONS).arg(&name),
            ));
        }
        for rel in tx.outgoing(node.id, REL_HAS_PRIVILEGE)? {
            tx.detach_delete(rel.end)?;
        }
        for rel in tx.outgoing(node.id, REL_OWNS_QUERY)? {
            tx.detach_delete(rel.end)?;
        }
        for kind in [REL_BELONGS_TO_GROUP, REL_SUBSCRIBED_TO] {
            for rel in tx.outgoing(node.id, kind)? {
                tx.delete_relationship(rel.id)?;
            }
        }
        tx.remove_label(node.id, LABEL_USERS)?;
        tx.add_label(node.id, LABEL_DELETED_USERS)
    }

    // =========================================================================
    // GROUPS
    // =========================================================================

    pub fn create_group(
        &self,
        actor: &str,
        name: &str,
        description: &str,
    ) -> Result<NodeId, InventoryError> {
        check_group_name(name)?;
        self.write(|tx, effects| {
            if find_group(tx, name)?.is_some() {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::GROUP_EXISTS).arg(name),
                ));
            }
            let groups = special_node(tx, NODE_GROUPS)?;
            let node = tx.create_node(&[LABEL_GROUPS])?;
            tx.set_property(node, PROPERTY_NAME, name.into())?;
            tx.set_property(node, PROPERTY_DESCRIPTION, description.into())?;
            tx.set_property(node, PROPERTY_CREATION_DATE, now_millis().into())?;
            tx.relate(node, groups.id, REL_CHILD_OF)?;
            effects
                .cache
                .push(CacheUpdate::PutGroup(group_profile(tx, &tx.require_node(node)?)?));
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Group {} created", name)),
            )?;
            Ok(node)
        })
    }

    pub fn get_group(&self, name: &str) -> Result<GroupProfile, InventoryError> {
        self.read(|tx| {
            self.cache.get_or_load(
                tx.cache_epoch(),
                |c| c.groups.get(name).cloned(),
                || group_profile(tx, &group_node(tx, name)?),
                |c, group| {
                    c.groups.insert(name.to_string(), group);
                },
            )
        })
    }

    pub fn get_groups(&self) -> Result<Vec<GroupProfile>, InventoryError> {
        self.read(|tx| {
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_GROUPS)? {
                out.push(group_profile(tx, &node)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    pub fn set_group_properties(
        &self,
        actor: &str,
        name: &str,
        new_name: Option<&str>,
        description: Option<&str>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let node = group_node(tx, name)?;
            let mut change = ChangeDescriptor::new();
            if let Some(new_name) = new_name.filter(|n| *n != name) {
                check_group_name(new_name)?;
                if find_group(tx, new_name)?.is_some() {
                    return Err(InventoryError::InvalidArgument(
                        ErrorMessage::new(messages::GROUP_EXISTS).arg(new_name),
                    ));
                }
                change.record(PROPERTY_NAME, Some(name.to_string()), Some(new_name.to_string()));
                tx.set_property(node.id, PROPERTY_NAME, new_name.into())?;
            }
            if let Some(description) = description {
                change.record(
                    PROPERTY_DESCRIPTION,
                    node.text(PROPERTY_DESCRIPTION).map(str::to_string),
                    Some(description.to_string()),
                );
                tx.set_property(node.id, PROPERTY_DESCRIPTION, description.into())?;
            }
            effects
                .cache
                .push(CacheUpdate::PutGroup(group_profile(tx, &tx.require_node(node.id)?)?));
            if !change.is_empty() {
                self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            }
            Ok(change)
        })
    }

    /// Delete groups. Members left without any group are deleted too.
    pub fn delete_groups(&self, actor: &str, names: &[&str]) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            for name in names {
                let node = group_node(tx, name)?;
                let mut orphans = Vec::new();
                for rel in tx.incoming(node.id, REL_BELONGS_TO_GROUP)? {
                    let user = tx.require_node(rel.start)?;
                    if user.name() == ADMIN_USER {
                        return Err(InventoryError::OperationNotPermitted(
                            ErrorMessage::new(messages::GROUP_HOLDS_ADMIN).arg(name),
                        ));
                    }
                    if user.has_label(LABEL_USERS)
                        && tx.outgoing(user.id, REL_BELONGS_TO_GROUP)?.len() == 1
                    {
                        orphans.push(user);
                    }
                }
                for user in &orphans {
                    self.retire_user(tx, user)?;
                }
                for rel in tx.outgoing(node.id, REL_HAS_PRIVILEGE)? {
                    tx.detach_delete(rel.end)?;
                }
                tx.detach_delete(node.id)?;
                effects.cache.push(CacheUpdate::RemoveGroup(name.to_string()));
                effects.cache.push(CacheUpdate::UsersChanged);
                self.log_general(
                    tx,
                    actor,
                    ActivityType::DeleteApplicationObject,
                    &ChangeDescriptor::with_notes(format!(
                        "Group {} deleted with {} orphaned users",
                        name,
                        orphans.len()
                    )),
                )?;
            }
            Ok(())
        })
    }

    pub fn get_users_in_group(&self, group: &str) -> Result<Vec<UserProfile>, InventoryError> {
        self.read(|tx| {
            let node = group_node(tx, group)?;
            let mut out = Vec::new();
            for rel in tx.incoming(node.id, REL_BELONGS_TO_GROUP)? {
                let user = tx.require_node(rel.start)?;
                if user.has_label(LABEL_USERS) {
                    out.push(user_profile(tx, &user)?);
                }
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    pub fn get_groups_for_user(&self, user: &str) -> Result<Vec<GroupProfile>, InventoryError> {
        self.read(|tx| {
            let node = user_node(tx, user)?;
            let mut out = Vec::new();
            for rel in tx.outgoing(node.id, REL_BELONGS_TO_GROUP)? {
                out.push(group_profile(tx, &tx.require_node(rel.end)?)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    // =========================================================================
    // PRIVILEGES
    // =========================================================================

    /// Grant a privilege, or change its access level if already granted.
    pub fn set_privilege_to_user(
        &self,
        actor: &str,
        user: &str,
        feature_token: &str,
        access_level: AccessLevel,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = user_node(tx, user)?;
            set_privilege(tx, node.id, &Privilege::new(feature_token, access_level))?;
            effects.cache.push(CacheUpdate::PutUser(user_profile(tx, &node)?));
            self.log_privilege(tx, actor, feature_token, user, Some(access_level))
        })
    }

    pub fn set_privilege_to_group(
        &self,
        actor: &str,
        group: &str,
        feature_token: &str,
        access_level: AccessLevel,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = group_node(tx, group)?;
            set_privilege(tx, node.id, &Privilege::new(feature_token, access_level))?;
            effects.cache.push(CacheUpdate::PutGroup(group_profile(tx, &node)?));
            self.log_privilege(tx, actor, feature_token, group, Some(access_level))
        })
    }

    pub fn remove_privilege_from_user(
        &self,
        actor: &str,
        user: &str,
        feature_token: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = user_node(tx, user)?;
            remove_privilege(tx, node.id, feature_token, user)?;
            effects.cache.push(CacheUpdate::PutUser(user_profile(tx, &node)?));
            self.log_privilege(tx, actor, feature_token, user, None)
        })
    }

    pub fn remove_privilege_from_group(
        &self,
        actor: &str,
        group: &str,
        feature_token: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = group_node(tx, group)?;
            remove_privilege(tx, node.id, feature_token, group)?;
            effects.cache.push(CacheUpdate::PutGroup(group_profile(tx, &node)?));
            self.log_privilege(tx, actor, feature_token, group, None)
        })
    }

    fn log_privilege(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        feature_token: &str,
        owner: &str,
        level: Option<AccessLevel>,
    ) -> Result<(), InventoryError> {
        let mut change = ChangeDescriptor::with_notes(format!("Privileges of {} changed", owner));
        change.record(
            feature_token,
            None,
            level.map(|l| l.code().to_string()),
        );
        self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Authenticate and open a session. Unknown users and wrong passwords
    /// fail alike.
    pub fn create_session(
        &self,
        user: &str,
        password: &str,
        session_type: SessionType,
        ip_address: &str,
    ) -> Result<Session, InventoryError> {
        let profile = self.write(|tx, _| {
            let bad_credentials = |reason: &'static str| {
                tracing::warn!(event = "auth_failure", reason, user = %user, "Login rejected");
                InventoryError::NotAuthorized(ErrorMessage::new(messages::BAD_CREDENTIALS))
            };
            let Some(node) = find_user(tx, user)? else {
                return Err(bad_credentials("unknown_user"));
            };
            if !verify_password(&node.text_or_empty(PROPERTY_PASSWORD), password) {
                return Err(bad_credentials("wrong_password"));
            }
            if !node.boolean(PROPERTY_ENABLED) {
                tracing::warn!(event = "auth_failure", reason = "user_disabled", user = %user);
                return Err(InventoryError::NotAuthorized(
                    ErrorMessage::new(messages::USER_DISABLED).arg(user),
                ));
            }
            let mut change = ChangeDescriptor::with_notes(format!("{:?} session", session_type));
            change.record("ipAddress", None, Some(ip_address.to_string()));
            self.log_general(tx, user, ActivityType::OpenSession, &change)?;
            user_profile(tx, &node)
        })?;
        Ok(self.sessions.open(profile, session_type, ip_address))
    }

    pub fn is_session_valid(&self, user: &str, token: &str) -> bool {
        self.sessions.is_session_valid(user, token)
    }

    /// Fail unless `token` is a live session of `user`.
    pub fn check_session(&self, user: &str, token: &str) -> Result<(), InventoryError> {
        if self.sessions.is_session_valid(user, token) {
            return Ok(());
        }
        tracing::warn!(event = "auth_failure", reason = "session_mismatch", user = %user);
        Err(InventoryError::NotAuthorized(
            ErrorMessage::new(messages::SESSION_INVALID).arg(user),
        ))
    }

    pub fn get_user_in_session(&self, token: &str) -> Result<UserProfile, InventoryError> {
        self.sessions.get_user_in_session(token)
    }

    pub fn close_session(&self, token: &str) -> Result<(), InventoryError> {
        let session = self.sessions.get_session(token)?;
        self.write(|tx, _| {
            let mut change = ChangeDescriptor::with_notes(format!("{:?} session", session.session_type));
            change.record("ipAddress", Some(session.ip_address.clone()), None);
            self.log_general(tx, &session.user.name, ActivityType::CloseSession, &change)
        })?;
        self.sessions.close_session(token).map(|_| ())
    }

    pub fn get_sessions(&self) -> Vec<Session> {
        self.sessions.sessions()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn check_user_name(name: &str) -> Result<(), InventoryError> {
    if name.is_empty() || !name_matches(&USER_NAME, name) {
        return Err(InventoryError::InvalidArgument(
            ErrorMessage::new(messages::USER_NAME_INVALID).arg(name),
        ));
    }
    Ok(())
}

fn check_group_name(name: &str) -> Result<(), InventoryError> {
    if name.trim().is_empty() || !name_matches(&GROUP_NAME, name) {
        return Err(InventoryError::InvalidArgument(
            ErrorMessage::new(messages::GROUP_NAME_INVALID).arg(name),
        ));
    }
    Ok(())
}

fn find_user(tx: &impl GraphRead, name: &str) -> Result<Option<Node>, InventoryError> {
    tx.find_node(LABEL_USERS, PROPERTY_NAME, &PropertyValue::from(name))
}

fn find_group(tx: &impl GraphRead, name: &str) -> Result<Option<Node>, InventoryError> {
    tx.find_node(LABEL_GROUPS, PROPERTY_NAME, &PropertyValue::from(name))
}

pub(crate) fn user_node(tx: &impl GraphRead, name: &str) -> Result<Node, InventoryError> {
    find_user(tx, name)?.ok_or_else(|| {
        InventoryError::ApplicationObjectNotFound(ErrorMessage::new(messages::USER_NOT_FOUND).arg(name))
    })
}

fn group_node(tx: &impl GraphRead, name: &str) -> Result<Node, InventoryError> {
    find_group(tx, name)?.ok_or_else(|| {
        InventoryError::ApplicationObjectNotFound(ErrorMessage::new(messages::GROUP_NOT_FOUND).arg(name))
    })
}

fn membership(
    tx: &impl GraphRead,
    user: NodeId,
    group: NodeId,
) -> Result<Option<crate::types::RelId>, InventoryError> {
    Ok(tx
        .outgoing(user, REL_BELONGS_TO_GROUP)?
        .into_iter()
        .find(|r| r.end == group)
        .map(|r| r.id))
}

fn user_type(node: &Node) -> UserType {
    node.integer(PROPERTY_TYPE)
        .and_then(UserType::from_code)
        .unwrap_or(UserType::Gui)
}

fn privileges(tx: &impl GraphRead, owner: NodeId) -> Result<Vec<Privilege>, InventoryError> {
    let mut out = Vec::new();
    for rel in tx.outgoing(owner, REL_HAS_PRIVILEGE)? {
        let node = tx.require_node(rel.end)?;
        let access_level = node
            .integer(PROPERTY_ACCESS_LEVEL)
            .and_then(AccessLevel::from_code)
            .unwrap_or(AccessLevel::Read);
        out.push(Privilege::new(node.text_or_empty(PROPERTY_FEATURE_TOKEN), access_level));
    }
    out.sort();
    Ok(out)
}

fn set_privilege(tx: &impl GraphWrite, owner: NodeId, privilege: &Privilege) -> Result<(), InventoryError> {
    for rel in tx.outgoing(owner, REL_HAS_PRIVILEGE)? {
        let node = tx.require_node(rel.end)?;
        if node.text(PROPERTY_FEATURE_TOKEN) == Some(privilege.feature_token.as_str()) {
            return tx.set_property(node.id, PROPERTY_ACCESS_LEVEL, privilege.access_level.code().into());
        }
    }
    let node = tx.create_node(&[LABEL_PRIVILEGES])?;
    tx.set_property(node, PROPERTY_FEATURE_TOKEN, privilege.feature_token.as_str().into())?;
    tx.set_property(node, PROPERTY_ACCESS_LEVEL, privilege.access_level.code().into())?;
    tx.relate(owner, node, REL_HAS_PRIVILEGE)?;
    Ok(())
}

fn remove_privilege(
    tx: &impl GraphWrite,
    owner: NodeId,
    feature_token: &str,
    owner_name: &str,
) -> Result<(), InventoryError> {
    for rel in tx.outgoing(owner, REL_HAS_PRIVILEGE)? {
        let node = tx.require_node(rel.end)?;
        if node.text(PROPERTY_FEATURE_TOKEN) == Some(feature_token) {
            return tx.detach_delete(node.id);
        }
    }
    Err(InventoryError::InvalidArgument(
        ErrorMessage::new(messages::PRIVILEGE_NOT_FOUND)
            .arg(feature_token)
            .arg(owner_name),
    ))
}

pub(super) fn user_profile(tx: &impl GraphRead, node: &Node) -> Result<UserProfile, InventoryError> {
    Ok(UserProfile {
        id: node.id,
        name: node.name(),
        first_name: node.text_or_empty(PROPERTY_FIRST_NAME),
        last_name: node.text_or_empty(PROPERTY_LAST_NAME),
        email: node.text_or_empty(PROPERTY_EMAIL),
        enabled: node.boolean(PROPERTY_ENABLED),
        user_type: user_type(node),
        creation_date: node.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
        privileges: privileges(tx, node.id)?,
    })
}

fn group_profile(tx: &impl GraphRead, node: &Node) -> Result<GroupProfile, InventoryError> {
    Ok(GroupProfile {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        creation_date: node.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
        privileges: privileges(tx, node.id)?,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;

    fn admins(service: &InventoryService) -> NodeId {
        service.get_group(ADMIN_GROUP).expect("group").id
    }

    #[test]
    fn create_user_validates_name_and_password() {
        let service = service();
        let group = admins(&service);
        let err = service
            .create_user(ADMIN_USER, &NewUser::new("bad name", "pw", group))
            .expect_err("space");
        assert_eq!(err.key(), Some(messages::USER_NAME_INVALID));
        let err = service
            .create_user(ADMIN_USER, &NewUser::new("jdoe", "", group))
            .expect_err("empty password");
        assert_eq!(err.key(), Some(messages::PASSWORD_EMPTY));
        service
            .create_user(ADMIN_USER, &NewUser::new("jdoe", "pw", group))
            .expect("user");
        let err = service
            .create_user(ADMIN_USER, &NewUser::new("jdoe", "pw", group))
            .expect_err("duplicate");
        assert_eq!(err.key(), Some(messages::USER_EXISTS));
        let users = service.get_users_in_group(ADMIN_GROUP).expect("members");
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn sessions_require_valid_credentials() {
        let service = service();
        let group = admins(&service);
        service
            .create_user(ADMIN_USER, &NewUser::new("ops", "s3cret", group))
            .expect("user");
        let err = service
            .create_session("ops", "wrong", SessionType::Desktop, "10.0.0.1")
            .expect_err("bad password");
        assert!(matches!(err, InventoryError::NotAuthorized(_)));
        let err = service
            .create_session("ghost", "x", SessionType::Desktop, "10.0.0.1")
            .expect_err("unknown user");
        assert_eq!(err.key(), Some(messages::BAD_CREDENTIALS));

        let session = service
            .create_session("ops", "s3cret", SessionType::Desktop, "10.0.0.1")
            .expect("session");
        assert!(service.is_session_valid("ops", &session.token));
        assert!(service.check_session(ADMIN_USER, &session.token).is_err());
        assert_eq!(service.get_user_in_session(&session.token).expect("user").name, "ops");

        let err = service.delete_users(ADMIN_USER, &["ops"]).expect_err("has session");
        assert_eq!(err.key(), Some(messages::USER_HAS_SESSIONS));
        service.close_session(&session.token).expect("close");
        assert!(service.get_sessions().is_empty());
        service.delete_users(ADMIN_USER, &["ops"]).expect("delete");
        assert!(service.get_user("ops").is_err());
    }

    #[test]
    fn disabled_users_cannot_log_in() {
        let service = service();
        let group = admins(&service);
        service
            .create_user(ADMIN_USER, &NewUser::new("temp", "pw", group))
            .expect("user");
        service
            .create_session("temp", "pw", SessionType::Web, "::1")
            .expect("session");
        let update = UserUpdate {
            enabled: Some(false),
            ..UserUpdate::default()
        };
        service.set_user_properties(ADMIN_USER, "temp", &update).expect("disable");
        assert!(service.get_sessions().is_empty());
        let err = service
            .create_session("temp", "pw", SessionType::Web, "::1")
            .expect_err("disabled");
        assert_eq!(err.key(), Some(messages::USER_DISABLED));
    }

    #[test]
    fn system_users_and_admin_are_protected() {
        let service = service();
        let group = admins(&service);
        let mut user = NewUser::new("sync", "pw", group);
        user.user_type = UserType::System;
        service.create_user(ADMIN_USER, &user).expect("user");
        let update = UserUpdate {
            email: Some("x@example.org".into()),
            ..UserUpdate::default()
        };
        let err = service
            .set_user_properties(ADMIN_USER, "sync", &update)
            .expect_err("system");
        assert_eq!(err.key(), Some(messages::SYSTEM_USER));
        let err = service.delete_users(ADMIN_USER, &[ADMIN_USER]).expect_err("admin");
        assert_eq!(err.key(), Some(messages::ADMIN_PROTECTED));
        let err = service.delete_groups(ADMIN_USER, &[ADMIN_GROUP]).expect_err("admin group");
        assert_eq!(err.key(), Some(messages::GROUP_HOLDS_ADMIN));
    }

    #[test]
    fn group_membership_never_orphans() {
        let service = service();
        let group = admins(&service);
        service.create_group(ADMIN_USER, "Field Ops", "").expect("group");
        service
            .create_user(ADMIN_USER, &NewUser::new("tech", "pw", group))
            .expect("user");
        service.add_user_to_group(ADMIN_USER, "tech", "Field Ops").expect("add");
        let err = service
            .add_user_to_group(ADMIN_USER, "tech", "Field Ops")
            .expect_err("twice");
        assert_eq!(err.key(), Some(messages::ALREADY_MEMBER));
        service
            .remove_user_from_group(ADMIN_USER, "tech", ADMIN_GROUP)
            .expect("remove");
        let err = service
            .remove_user_from_group(ADMIN_USER, "tech", "Field Ops")
            .expect_err("last group");
        assert_eq!(err.key(), Some(messages::ORPHAN_USER));

        // Deleting the only group of a user deletes the user too.
        service.delete_groups(ADMIN_USER, &["Field Ops"]).expect("delete group");
        assert!(service.get_user("tech").is_err());
        let trail = service.get_general_activity_audit_trail(0, 0).expect("trail");
        assert!(trail.iter().any(|e| e.performing_user == ADMIN_USER));
    }

    #[test]
    fn privileges_upsert_and_remove() {
        let service = service();
        service
            .set_privilege_to_user(ADMIN_USER, ADMIN_USER, "nav", AccessLevel::Read)
            .expect("grant");
        service
            .set_privilege_to_user(ADMIN_USER, ADMIN_USER, "nav", AccessLevel::ReadWrite)
            .expect("upgrade");
        let user = service.get_user(ADMIN_USER).expect("user");
        assert_eq!(user.privileges, vec![Privilege::new("nav", AccessLevel::ReadWrite)]);
        service
            .set_privilege_to_group(ADMIN_USER, ADMIN_GROUP, "audit", AccessLevel::Read)
            .expect("grant group");
        assert_eq!(service.get_group(ADMIN_GROUP).expect("group").privileges.len(), 1);
        service
            .remove_privilege_from_user(ADMIN_USER, ADMIN_USER, "nav")
            .expect("remove");
        let err = service
            .remove_privilege_from_group(ADMIN_USER, ADMIN_GROUP, "nav")
            .expect_err("absent");
        assert_eq!(err.key(), Some(messages::PRIVILEGE_NOT_FOUND));
        assert!(service.get_user(ADMIN_USER).expect("user").privileges.is_empty());
    }

    #[test]
    fn renames_move_cache_keys() {
        let service = service();
        service.create_group(ADMIN_USER, "NOC", "network").expect("group");
        assert_eq!(service.get_group("NOC").expect("group").description, "network");
        service
            .set_group_properties(ADMIN_USER, "NOC", Some("NOC Tier 1"), None)
            .expect("rename");
        assert!(service.get_group("NOC").is_err());
        assert_eq!(service.get_groups_for_user(ADMIN_USER).expect("groups").len(), 1);
        assert_eq!(service.get_groups().expect("groups").len(), 2);
        assert!(service.get_users().expect("users").iter().any(|u| u.name == ADMIN_USER));
    }

    #[test]
    fn sessions_follow_renames_and_disabling() {
        let service = service();
        let group = admins(&service);
        service
            .create_user(ADMIN_USER, &NewUser::new("ops", "pw", group))
            .expect("user");
        let session = service
            .create_session("ops", "pw", SessionType::Web, "::1")
            .expect("session");

        let rename = UserUpdate {
            name: Some("noc".into()),
            ..UserUpdate::default()
        };
        service.set_user_properties(ADMIN_USER, "ops", &rename).expect("rename");
        assert!(service.is_session_valid("noc", &session.token));
        assert_eq!(service.get_user_in_session(&session.token).expect("user").name, "noc");

        let update = UserUpdate {
            name: Some("noc2".into()),
            enabled: Some(false),
            ..UserUpdate::default()
        };
        service.set_user_properties(ADMIN_USER, "noc", &update).expect("rename and disable");
        assert!(service.get_sessions().is_empty());
    }

    #[test]
    fn session_survives_a_failed_close() {
        let service = service();
        let mut ghost = service.get_user(ADMIN_USER).expect("admin");
        ghost.id = NodeId(u64::MAX);
        ghost.name = "ghost".into();
        let session = service.sessions.open(ghost, SessionType::Web, "");
        assert!(service.close_session(&session.token).is_err());
        assert!(service.is_session_valid("ghost", &session.token));
    }
}
