//! Business rule definitions and the explicit rule check.

use super::InventoryService;
use crate::types::model::{ActivityType, BusinessRule, NewBusinessRule};
use crate::types::{ChangeDescriptor, InventoryError, NodeId};

impl InventoryService {
    pub fn create_business_rule(
        &self,
        actor: &str,
        rule: &NewBusinessRule,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| {
            let id = self.rules.create_business_rule(tx, rule)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Business rule {} created", rule.name)),
            )?;
            Ok(id)
        })
    }

    pub fn delete_business_rule(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            self.rules.delete_business_rule(tx, id)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Business rule {} deleted", id)),
            )
        })
    }

    /// All rules, or only those of `rule_type`.
    pub fn get_business_rules(&self, rule_type: Option<i64>) -> Result<Vec<BusinessRule>, InventoryError> {
        self.read(|tx| self.rules.get_business_rules(tx, rule_type))
    }

    /// Check a prospective relationship against the relationship rules.
    /// Always passes when the service does not enforce business rules.
    pub fn check_relationship_by_attribute_value_business_rules(
        &self,
        source_class: &str,
        source_uuid: &str,
        target_class: &str,
        target_uuid: &str,
    ) -> Result<(), InventoryError> {
        if !self.config.enforce_business_rules {
            return Ok(());
        }
        self.read(|tx| {
            self.rules.check_relationship_by_attribute_value(
                tx,
                source_class,
                source_uuid,
                target_class,
                target_uuid,
            )
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::messages;
    use crate::primitives::*;
    use crate::service::tests::{service, service_with};
    use crate::types::AttributeValue;
    use crate::types::model::{AttributeChanges, AttributeDefinition, AttributeType, ClassDefinition};

    fn device(service: &InventoryService, class_name: &str, voltage: &str) -> String {
        let mut attrs = AttributeChanges::new();
        attrs.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text(format!("{}-{}", class_name, voltage))));
        attrs.insert("voltage".into(), Some(AttributeValue::Text(voltage.into())));
        service
            .create_object(ADMIN_USER, class_name, None, &attrs, None)
            .expect("device")
    }

    fn power_classes(service: &InventoryService) {
        for name in ["Feed", "Outlet"] {
            service
                .create_class(ADMIN_USER, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT))
                .expect("class");
            service
                .create_attribute(ADMIN_USER, name, &AttributeDefinition::new("voltage", AttributeType::String))
                .expect("attribute");
        }
        service
            .add_possible_children(ADMIN_USER, None, &["Feed", "Outlet"])
            .expect("children");
    }

    fn voltage_rule(service: &InventoryService) -> NodeId {
        let rule = NewBusinessRule::relationship_by_attribute_value(
            "voltage match", "Feed", "Outlet", "voltage", "voltage", "230", "230",
        );
        service.create_business_rule(ADMIN_USER, &rule).expect("rule")
    }

    fn enforcing() -> InventoryService {
        service_with(ServiceConfig {
            enforce_business_rules: true,
            ..ServiceConfig::default()
        })
    }

    #[test]
    fn rules_are_checked_on_demand() {
        let service = enforcing();
        power_classes(&service);
        let id = voltage_rule(&service);
        assert_eq!(service.get_business_rules(None).expect("rules").len(), 1);
        assert!(service.get_business_rules(Some(99)).expect("rules").is_empty());

        let feed = device(&service, "Feed", "230");
        let good = device(&service, "Outlet", "230");
        let bad = device(&service, "Outlet", "110");
        service
            .check_relationship_by_attribute_value_business_rules("Feed", &feed, "Outlet", &good)
            .expect("allowed");
        let err = service
            .check_relationship_by_attribute_value_business_rules("Feed", &feed, "Outlet", &bad)
            .expect_err("rejected");
        assert!(matches!(err, InventoryError::BusinessRuleViolation(_)));

        service.delete_business_rule(ADMIN_USER, id).expect("delete");
        let err = service.delete_business_rule(ADMIN_USER, id).expect_err("gone");
        assert_eq!(err.key(), Some(messages::RULE_NOT_FOUND));
    }

    #[test]
    fn checks_pass_without_enforcement() {
        let service = service();
        power_classes(&service);
        voltage_rule(&service);
        let feed = device(&service, "Feed", "230");
        let bad = device(&service, "Outlet", "110");
        service
            .check_relationship_by_attribute_value_business_rules("Feed", &feed, "Outlet", &bad)
            .expect("not enforced");
        service
            .create_special_relationship(ADMIN_USER, ("Feed", &feed), ("Outlet", &bad), "powers")
            .expect("related");

        let service = enforcing();
        power_classes(&service);
        voltage_rule(&service);
        let feed = device(&service, "Feed", "230");
        let bad = device(&service, "Outlet", "110");
        let err = service
            .create_special_relationship(ADMIN_USER, ("Feed", &feed), ("Outlet", &bad), "powers")
            .expect_err("enforced");
        assert!(matches!(err, InventoryError::BusinessRuleViolation(_)));
    }
}
