//! Views and attachments.
//!
//! View structures are opaque bytes stored on the view node. Backgrounds
//! and attachment contents live in the [`BlobStore`](crate::blob::BlobStore);
//! the graph keeps their deterministic names. New blobs are written
//! inside the transaction closure, obsolete ones are removed after commit.

use super::inventory::ObjectRef;
use super::{Effects, InventoryService, require_name};
use crate::blob::{BlobKind, BlobRef, attachment_name, background_name};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    ActivityType, FileObject, FileObjectLight, ViewObject, ViewObjectLight, ViewUpdate,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, now_millis};

/// Owner part of background blob names for general views.
const GENERAL_VIEW_OWNER: &str = "general";

/// Input for a new view.
#[derive(Debug, Clone, Copy)]
pub struct NewView<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// Class of the view (its kind, as understood by the client).
    pub class_name: &'a str,
    pub structure: &'a [u8],
    pub background: Option<&'a [u8]>,
}

/// Node owning a view and the name it contributes to background blobs.
struct ViewOwner {
    node: Option<NodeId>,
    blob_owner: String,
}

impl InventoryService {
    // =========================================================================
    // OBJECT RELATED VIEWS
    // =========================================================================

    pub fn create_object_related_view(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        view: &NewView<'_>,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| {
            let owner = self.object_owner(tx, object)?;
            self.create_view(tx, actor, &owner, LABEL_OBJECT_VIEWS, view)
        })
    }

    pub fn update_object_related_view(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        view_id: NodeId,
        update: &ViewUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let owner = self.object_owner(tx, object)?;
            let view = owned_view(tx, &owner, view_id)?;
            self.update_view(tx, effects, actor, &owner, &view, update)
        })
    }

    pub fn get_object_related_view(
        &self,
        object: ObjectRef<'_>,
        view_id: NodeId,
    ) -> Result<ViewObject, InventoryError> {
        self.read(|tx| {
            let owner = self.object_owner(tx, object)?;
            Ok(self.view_object(&owned_view(tx, &owner, view_id)?))
        })
    }

    /// `limit == 0` returns every view.
    pub fn get_object_related_views(
        &self,
        object: ObjectRef<'_>,
        limit: usize,
    ) -> Result<Vec<ViewObjectLight>, InventoryError> {
        self.read(|tx| {
            let owner = self.object_owner(tx, object)?;
            owned_views(tx, &owner, limit)
        })
    }

    pub fn delete_object_related_view(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        view_id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let owner = self.object_owner(tx, object)?;
            let view = owned_view(tx, &owner, view_id)?;
            self.delete_view(tx, effects, actor, &view)
        })
    }

    // =========================================================================
    // LIST TYPE RELATED VIEWS (LAYOUTS)
    // =========================================================================

    pub fn create_list_type_related_view(
        &self,
        actor: &str,
        item: ObjectRef<'_>,
        view: &NewView<'_>,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| {
            let owner = self.layout_owner(tx, item)?;
            self.create_view(tx, actor, &owner, LABEL_OBJECT_VIEWS, view)
        })
    }

    pub fn update_list_type_related_view(
        &self,
        actor: &str,
        item: ObjectRef<'_>,
        view_id: NodeId,
        update: &ViewUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let owner = self.layout_owner(tx, item)?;
            let view = owned_view(tx, &owner, view_id)?;
            self.update_view(tx, effects, actor, &owner, &view, update)
        })
    }

    pub fn get_list_type_related_view(
        &self,
        item: ObjectRef<'_>,
        view_id: NodeId,
    ) -> Result<ViewObject, InventoryError> {
        self.read(|tx| {
            let owner = self.layout_owner(tx, item)?;
            Ok(self.view_object(&owned_view(tx, &owner, view_id)?))
        })
    }

    pub fn get_list_type_related_views(
        &self,
        item: ObjectRef<'_>,
        limit: usize,
    ) -> Result<Vec<ViewObjectLight>, InventoryError> {
        self.read(|tx| {
            let owner = self.layout_owner(tx, item)?;
            owned_views(tx, &owner, limit)
        })
    }

    pub fn delete_list_type_related_view(
        &self,
        actor: &str,
        item: ObjectRef<'_>,
        view_id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let owner = self.layout_owner(tx, item)?;
            let view = owned_view(tx, &owner, view_id)?;
            self.delete_view(tx, effects, actor, &view)
        })
    }

    // =========================================================================
    // GENERAL VIEWS
    // =========================================================================

    pub fn create_general_view(
        &self,
        actor: &str,
        view: &NewView<'_>,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| self.create_view(tx, actor, &general_owner(), LABEL_GENERAL_VIEWS, view))
    }

    pub fn update_general_view(
        &self,
        actor: &str,
        view_id: NodeId,
        update: &ViewUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let view = general_view(tx, view_id)?;
            self.update_view(tx, effects, actor, &general_owner(), &view, update)
        })
    }

    pub fn get_general_view(&self, view_id: NodeId) -> Result<ViewObject, InventoryError> {
        self.read(|tx| Ok(self.view_object(&general_view(tx, view_id)?)))
    }

    /// General views, optionally of one view class. `limit == 0` returns all.
    pub fn get_general_views(
        &self,
        class_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ViewObjectLight>, InventoryError> {
        self.read(|tx| {
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_GENERAL_VIEWS)? {
                if limit > 0 && out.len() >= limit {
                    break;
                }
                if class_name.is_none_or(|c| node.text(PROPERTY_CLASS_NAME) == Some(c)) {
                    out.push(view_light(&node));
                }
            }
            Ok(out)
        })
    }

    pub fn delete_general_views(&self, actor: &str, ids: &[NodeId]) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            for &id in ids {
                let view = general_view(tx, id)?;
                self.delete_view(tx, effects, actor, &view)?;
            }
            Ok(())
        })
    }

    // =========================================================================
    // ATTACHMENTS
    // =========================================================================

    pub fn attach_file_to_object(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        name: &str,
        tags: &str,
        content: &[u8],
    ) -> Result<NodeId, InventoryError> {
        require_name(name, "file")?;
        let max = self.config.max_attachment_size;
        if u64::try_from(content.len()).map_or(true, |len| len > max) {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::FILE_TOO_LARGE).arg(name).arg(max),
            ));
        }
        self.write(|tx, _| {
            let owner = self.mapper.object_node(tx, object.0, object.1)?;
            let file = tx.create_node(&[LABEL_FILES])?;
            tx.set_property(file, PROPERTY_NAME, name.into())?;
            tx.set_property(file, PROPERTY_TAGS, tags.into())?;
            tx.set_property(file, PROPERTY_CREATION_DATE, now_millis().into())?;
            tx.relate(owner.id, file, REL_HAS_ATTACHMENT)?;
            let blob = attachment_name(owner.uuid().unwrap_or_default(), file);
            self.blobs.save(BlobKind::Attachment, &blob, content)?;
            let mut change = ChangeDescriptor::with_notes(format!("File {} attached", name));
            change.record("attachment", None, Some(name.to_string()));
            self.log_object(tx, actor, owner.id, ActivityType::UpdateInventoryObject, &change)?;
            Ok(file)
        })
    }

    pub fn get_files_for_object(
        &self,
        object: ObjectRef<'_>,
    ) -> Result<Vec<FileObjectLight>, InventoryError> {
        self.read(|tx| {
            let owner = self.mapper.object_node(tx, object.0, object.1)?;
            let mut out = Vec::new();
            for rel in tx.outgoing(owner.id, REL_HAS_ATTACHMENT)? {
                let file = tx.require_node(rel.end)?;
                out.push(FileObjectLight {
                    id: file.id,
                    name: file.name(),
                    tags: file.text_or_empty(PROPERTY_TAGS),
                    creation_date: file.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
                });
            }
            Ok(out)
        })
    }

    pub fn get_file(&self, object: ObjectRef<'_>, file_id: NodeId) -> Result<FileObject, InventoryError> {
        self.read(|tx| {
            let owner = self.mapper.object_node(tx, object.0, object.1)?;
            let file = attached_file(tx, &owner, file_id)?;
            let blob = attachment_name(owner.uuid().unwrap_or_default(), file.id);
            let content = self.blobs.read(BlobKind::Attachment, &blob)?;
            Ok(FileObject {
                id: file.id,
                name: file.name(),
                tags: file.text_or_empty(PROPERTY_TAGS),
                creation_date: file.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
                content,
            })
        })
    }

    pub fn update_file_properties(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        file_id: NodeId,
        name: Option<&str>,
        tags: Option<&str>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        if let Some(name) = name {
            require_name(name, "file")?;
        }
        self.write(|tx, _| {
            let owner = self.mapper.object_node(tx, object.0, object.1)?;
            let file = attached_file(tx, &owner, file_id)?;
            let mut change = ChangeDescriptor::new();
            for (key, value) in [(PROPERTY_NAME, name), (PROPERTY_TAGS, tags)] {
                if let Some(value) = value {
                    change.record(key, file.text(key).map(str::to_string), Some(value.to_string()));
                    tx.set_property(file.id, key, value.into())?;
                }
            }
            if !change.is_empty() {
                self.log_object(tx, actor, owner.id, ActivityType::UpdateInventoryObject, &change)?;
            }
            Ok(change)
        })
    }

    pub fn detach_file_from_object(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        file_id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let owner = self.mapper.object_node(tx, object.0, object.1)?;
            let file = attached_file(tx, &owner, file_id)?;
            tx.detach_delete(file.id)?;
            effects.blobs.push(BlobRef::attachment(attachment_name(
                owner.uuid().unwrap_or_default(),
                file.id,
            )));
            let mut change = ChangeDescriptor::with_notes(format!("File {} detached", file.name()));
            change.record("attachment", Some(file.name()), None);
            self.log_object(tx, actor, owner.id, ActivityType::UpdateInventoryObject, &change)
        })
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn object_owner(&self, tx: &impl GraphRead, object: ObjectRef<'_>) -> Result<ViewOwner, InventoryError> {
        let node = self.mapper.object_node(tx, object.0, object.1)?;
        Ok(ViewOwner {
            node: Some(node.id),
            blob_owner: node.uuid().unwrap_or_default().to_string(),
        })
    }

    fn layout_owner(&self, tx: &impl GraphRead, item: ObjectRef<'_>) -> Result<ViewOwner, InventoryError> {
        let node = self.list_type_item_node(tx, item.0, item.1)?;
        Ok(ViewOwner {
            node: Some(node.id),
            blob_owner: self.mapper.membership(tx, node.id)?.class_name,
        })
    }

    fn create_view(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        owner: &ViewOwner,
        label: &str,
        view: &NewView<'_>,
    ) -> Result<NodeId, InventoryError> {
        require_name(view.name, "view")?;
        require_name(view.class_name, "view class")?;
        let node = tx.create_node(&[label])?;
        tx.set_property(node, PROPERTY_NAME, view.name.into())?;
        tx.set_property(node, PROPERTY_DESCRIPTION, view.description.into())?;
        tx.set_property(node, PROPERTY_CLASS_NAME, view.class_name.into())?;
        tx.set_property(node, PROPERTY_STRUCTURE, view.structure.to_vec().into())?;
        tx.set_property(node, PROPERTY_CREATION_DATE, now_millis().into())?;
        if let Some(background) = view.background.filter(|b| !b.is_empty()) {
            let blob = background_name(&owner.blob_owner, node, view.class_name);
            self.blobs.save(BlobKind::Background, &blob, background)?;
            tx.set_property(node, PROPERTY_BACKGROUND, blob.as_str().into())?;
        }
        if let Some(owner) = owner.node {
            tx.relate(owner, node, REL_HAS_VIEW)?;
        }
        self.log_general(
            tx,
            actor,
            ActivityType::CreateApplicationObject,
            &ChangeDescriptor::with_notes(format!("View {} created", view.name)),
        )?;
        Ok(node)
    }

    fn update_view(
        &self,
        tx: &impl GraphWrite,
        effects: &mut Effects,
        actor: &str,
        owner: &ViewOwner,
        view: &Node,
        update: &ViewUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        let mut change = ChangeDescriptor::new();
        for (key, value) in [
            (PROPERTY_NAME, update.name.as_deref()),
            (PROPERTY_DESCRIPTION, update.description.as_deref()),
        ] {
            if let Some(value) = value {
                if key == PROPERTY_NAME {
                    require_name(value, "view")?;
                }
                change.record(key, view.text(key).map(str::to_string), Some(value.to_string()));
                tx.set_property(view.id, key, value.into())?;
            }
        }
        if let Some(structure) = &update.structure {
            change.record(PROPERTY_STRUCTURE, None, None);
            tx.set_property(view.id, PROPERTY_STRUCTURE, structure.clone().into())?;
        }
        if let Some(background) = &update.background {
            let previous = view.text(PROPERTY_BACKGROUND).map(str::to_string);
            if background.is_empty() {
                if let Some(previous) = &previous {
                    tx.remove_property(view.id, PROPERTY_BACKGROUND)?;
                    effects.blobs.push(BlobRef::background(previous.as_str()));
                }
                change.record(PROPERTY_BACKGROUND, previous, None);
            } else {
                let class_name = view.text_or_empty(PROPERTY_CLASS_NAME);
                let blob = background_name(&owner.blob_owner, view.id, &class_name);
                self.blobs.save(BlobKind::Background, &blob, background)?;
                tx.set_property(view.id, PROPERTY_BACKGROUND, blob.as_str().into())?;
                change.record(PROPERTY_BACKGROUND, previous, Some(blob));
            }
        }
        if !change.is_empty() {
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
        }
        Ok(change)
    }

    fn delete_view(
        &self,
        tx: &impl GraphWrite,
        effects: &mut Effects,
        actor: &str,
        view: &Node,
    ) -> Result<(), InventoryError> {
        if let Some(background) = view.text(PROPERTY_BACKGROUND) {
            effects.blobs.push(BlobRef::background(background));
        }
        tx.detach_delete(view.id)?;
        self.log_general(
            tx,
            actor,
            ActivityType::DeleteApplicationObject,
            &ChangeDescriptor::with_notes(format!("View {} deleted", view.name())),
        )
    }

    /// A missing background blob is reported as no background.
    fn view_object(&self, node: &Node) -> ViewObject {
        let background = node.text(PROPERTY_BACKGROUND).and_then(|blob| {
            match self.blobs.read(BlobKind::Background, blob) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(
                        event = "background_unreadable",
                        blob = %blob,
                        error = %e,
                        "View background could not be read"
                    );
                    None
                }
            }
        });
        ViewObject {
            id: node.id,
            name: node.name(),
            description: node.text_or_empty(PROPERTY_DESCRIPTION),
            class_name: node.text_or_empty(PROPERTY_CLASS_NAME),
            structure: node
                .property(PROPERTY_STRUCTURE)
                .and_then(|p| p.as_bytes())
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            background,
        }
    }
}

fn general_owner() -> ViewOwner {
    ViewOwner {
        node: None,
        blob_owner: GENERAL_VIEW_OWNER.to_string(),
    }
}

fn view_not_found(id: NodeId) -> InventoryError {
    InventoryError::ApplicationObjectNotFound(ErrorMessage::new(messages::VIEW_NOT_FOUND).arg(id))
}

fn owned_view(tx: &impl GraphRead, owner: &ViewOwner, view_id: NodeId) -> Result<Node, InventoryError> {
    let Some(owner) = owner.node else {
        return general_view(tx, view_id);
    };
    if !tx.outgoing(owner, REL_HAS_VIEW)?.iter().any(|r| r.end == view_id) {
        return Err(view_not_found(view_id));
    }
    tx.require_node(view_id)
}

fn owned_views(
    tx: &impl GraphRead,
    owner: &ViewOwner,
    limit: usize,
) -> Result<Vec<ViewObjectLight>, InventoryError> {
    let mut out = Vec::new();
    let Some(owner) = owner.node else {
        return Ok(out);
    };
    for rel in tx.outgoing(owner, REL_HAS_VIEW)? {
        if limit > 0 && out.len() >= limit {
            break;
        }
        out.push(view_light(&tx.require_node(rel.end)?));
    }
    Ok(out)
}

fn general_view(tx: &impl GraphRead, view_id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(view_id)? {
        Some(node) if node.has_label(LABEL_GENERAL_VIEWS) => Ok(node),
        _ => Err(view_not_found(view_id)),
    }
}

fn view_light(node: &Node) -> ViewObjectLight {
    ViewObjectLight {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        class_name: node.text_or_empty(PROPERTY_CLASS_NAME),
    }
}

fn attached_file(tx: &impl GraphRead, owner: &Node, file_id: NodeId) -> Result<Node, InventoryError> {
    if !tx
        .outgoing(owner.id, REL_HAS_ATTACHMENT)?
        .iter()
        .any(|r| r.end == file_id)
    {
        return Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::FILE_NOT_FOUND).arg(file_id),
        ));
    }
    tx.require_node(file_id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::service::tests::{service, service_with};
    use crate::types::AttributeValue;
    use crate::types::model::{AttributeChanges, ClassDefinition};

    fn building(service: &InventoryService) -> String {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("Building", CLASS_INVENTORY_OBJECT))
            .expect("class");
        service.add_possible_children(ADMIN_USER, None, &["Building"]).expect("children");
        let mut attrs = AttributeChanges::new();
        attrs.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text("HQ".into())));
        service
            .create_object(ADMIN_USER, "Building", None, &attrs, None)
            .expect("building")
    }

    fn new_view<'a>(background: Option<&'a [u8]>) -> NewView<'a> {
        NewView {
            name: "floor plan",
            description: "",
            class_name: "PlanView",
            structure: b"<view/>",
            background,
        }
    }

    #[test]
    fn object_view_background_lifecycle() {
        let service = service();
        let uuid = building(&service);
        let object = ("Building", uuid.as_str());
        let view = service
            .create_object_related_view(ADMIN_USER, object, &new_view(Some(b"png")))
            .expect("view");
        let blob = background_name(&uuid, view, "PlanView");
        assert_eq!(service.blobs().read(BlobKind::Background, &blob).expect("blob"), b"png");

        let loaded = service.get_object_related_view(object, view).expect("get");
        assert_eq!(loaded.structure, b"<view/>");
        assert_eq!(loaded.background.as_deref(), Some(&b"png"[..]));

        let update = ViewUpdate {
            background: Some(Vec::new()),
            ..ViewUpdate::default()
        };
        let change = service
            .update_object_related_view(ADMIN_USER, object, view, &update)
            .expect("update");
        assert_eq!(change.affected_properties, vec![PROPERTY_BACKGROUND]);
        assert!(service.blobs().read(BlobKind::Background, &blob).is_err());
        assert!(service
            .get_object_related_view(object, view)
            .expect("get")
            .background
            .is_none());

        assert_eq!(service.get_object_related_views(object, 0).expect("views").len(), 1);
        service
            .delete_object_related_view(ADMIN_USER, object, view)
            .expect("delete");
        let err = service.get_object_related_view(object, view).expect_err("gone");
        assert_eq!(err.key(), Some(messages::VIEW_NOT_FOUND));
    }

    #[test]
    fn deleting_object_removes_its_blobs() {
        let service = service();
        let uuid = building(&service);
        let object = ("Building", uuid.as_str());
        let view = service
            .create_object_related_view(ADMIN_USER, object, &new_view(Some(b"bg")))
            .expect("view");
        let file = service
            .attach_file_to_object(ADMIN_USER, object, "manual.pdf", "docs", b"%PDF")
            .expect("attach");
        service
            .delete_objects(ADMIN_USER, &[object], false)
            .expect("delete");
        assert!(service
            .blobs()
            .read(BlobKind::Background, &background_name(&uuid, view, "PlanView"))
            .is_err());
        assert!(service
            .blobs()
            .read(BlobKind::Attachment, &attachment_name(&uuid, file))
            .is_err());
    }

    #[test]
    fn general_views_filter_by_class() {
        let service = service();
        let a = service.create_general_view(ADMIN_USER, &new_view(None)).expect("view");
        let mut other = new_view(None);
        other.class_name = "TopologyView";
        service.create_general_view(ADMIN_USER, &other).expect("view");
        assert_eq!(service.get_general_views(None, 0).expect("views").len(), 2);
        assert_eq!(service.get_general_views(Some("PlanView"), 0).expect("views").len(), 1);
        let update = ViewUpdate {
            name: Some("renamed".into()),
            ..ViewUpdate::default()
        };
        service.update_general_view(ADMIN_USER, a, &update).expect("update");
        assert_eq!(service.get_general_view(a).expect("view").name, "renamed");
        service.delete_general_views(ADMIN_USER, &[a]).expect("delete");
        assert!(service.get_general_view(a).is_err());
    }

    #[test]
    fn layouts_belong_to_list_type_items() {
        let service = service();
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("Vendor", CLASS_GENERIC_OBJECT_LIST))
            .expect("class");
        let item = service
            .create_list_type_item(ADMIN_USER, "Vendor", "Nokia", None)
            .expect("item");
        let view = service
            .create_list_type_related_view(ADMIN_USER, ("Vendor", &item), &new_view(Some(b"icon")))
            .expect("layout");
        assert_eq!(
            service
                .get_list_type_related_view(("Vendor", &item), view)
                .expect("layout")
                .background
                .as_deref(),
            Some(&b"icon"[..])
        );
        let update = ViewUpdate {
            structure: Some(b"<layout/>".to_vec()),
            ..ViewUpdate::default()
        };
        service
            .update_list_type_related_view(ADMIN_USER, ("Vendor", &item), view, &update)
            .expect("update");
        assert_eq!(
            service
                .get_list_type_related_views(("Vendor", &item), 0)
                .expect("layouts")
                .len(),
            1
        );
        service
            .delete_list_type_related_view(ADMIN_USER, ("Vendor", &item), view)
            .expect("delete");
        assert!(service
            .blobs()
            .read(BlobKind::Background, &background_name("Vendor", view, "PlanView"))
            .is_err());
    }

    #[test]
    fn attachments_respect_size_limit() {
        let config = ServiceConfig {
            max_attachment_size: 4,
            ..ServiceConfig::default()
        };
        let service = service_with(config);
        let uuid = building(&service);
        let object = ("Building", uuid.as_str());
        let err = service
            .attach_file_to_object(ADMIN_USER, object, "big.bin", "", b"12345")
            .expect_err("too large");
        assert_eq!(err.key(), Some(messages::FILE_TOO_LARGE));

        let file = service
            .attach_file_to_object(ADMIN_USER, object, "small.bin", "a", b"1234")
            .expect("attach");
        assert_eq!(service.get_file(object, file).expect("file").content, b"1234");
        service
            .update_file_properties(ADMIN_USER, object, file, None, Some("b"))
            .expect("tags");
        assert_eq!(service.get_files_for_object(object).expect("files")[0].tags, "b");
        service
            .detach_file_from_object(ADMIN_USER, object, file)
            .expect("detach");
        assert!(service.get_files_for_object(object).expect("files").is_empty());
        let err = service.get_file(object, file).expect_err("detached");
        assert_eq!(err.key(), Some(messages::FILE_NOT_FOUND));
    }
}
