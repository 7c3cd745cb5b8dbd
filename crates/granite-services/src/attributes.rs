//! Direct attribute administration: create, edit, delete, usage gauges.

use uuid::Uuid;

use granite_core::models::AttributeDetail;
use granite_core::validation::{build_usage_gauges, validate_attribute_value, UsageGauge};
use granite_core::{AppError, DomainEvent};
use granite_db::{AdminActionRepository, AttributeRepository};

use crate::log_events;

pub struct AttributeService {
    attributes: AttributeRepository,
    audit: AdminActionRepository,
}

impl AttributeService {
    pub fn new(attributes: AttributeRepository, audit: AdminActionRepository) -> Self {
        Self { attributes, audit }
    }

    pub async fn list(&self, allocation_id: Uuid) -> Result<Vec<AttributeDetail>, AppError> {
        self.attributes.list_details(allocation_id).await
    }

    pub async fn get(&self, attribute_id: Uuid) -> Result<AttributeDetail, AppError> {
        self.attributes
            .get_detail(attribute_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Attribute {attribute_id} not found")))
    }

    pub async fn gauges(&self, allocation_id: Uuid) -> Result<Vec<UsageGauge>, AppError> {
        let attributes = self.attributes.list_details(allocation_id).await?;
        Ok(build_usage_gauges(&attributes))
    }

    /// Attach a new attribute. Unique types admit at most one value per
    /// allocation.
    pub async fn create(
        &self,
        actor: &str,
        allocation_id: Uuid,
        attribute_type_id: Uuid,
        value: &str,
    ) -> Result<AttributeDetail, AppError> {
        let attr_type = self
            .attributes
            .get_type(attribute_type_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Attribute type {attribute_type_id} not found"))
            })?;
        validate_attribute_value(attr_type.kind, &attr_type.name, value)?;
        if attr_type.is_unique
            && self
                .attributes
                .exists_for_type(allocation_id, attribute_type_id)
                .await?
        {
            return Err(AppError::guard(format!(
                "The allocation already has an attribute of type '{}'.",
                attr_type.name
            )));
        }

        let attribute = self
            .attributes
            .create(allocation_id, attribute_type_id, value)
            .await?;
        if attr_type.has_usage {
            self.attributes.ensure_usage_row(attribute.id).await?;
        }
        self.audit
            .record(
                allocation_id,
                actor,
                &format!(
                    "Created attribute \"{}\" with value \"{value}\"",
                    attr_type.name
                ),
            )
            .await?;
        let detail = self
            .attributes
            .get_detail(attribute.id)
            .await?
            .ok_or_else(|| AppError::internal("Attribute vanished after creation"))?;
        Ok(detail)
    }

    /// Edit an attribute value in place.
    pub async fn update(
        &self,
        actor: &str,
        attribute_id: Uuid,
        value: &str,
    ) -> Result<AttributeDetail, AppError> {
        let detail = self
            .attributes
            .get_detail(attribute_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Attribute {attribute_id} not found")))?;
        validate_attribute_value(detail.kind, &detail.type_name, value)?;
        if detail.value == value {
            return Ok(detail);
        }

        self.attributes.set_value(attribute_id, value).await?;
        self.audit
            .record(
                detail.allocation_id,
                actor,
                &format!(
                    "Changed \"{}\" from \"{}\" to \"{value}\"",
                    detail.type_name, detail.value
                ),
            )
            .await?;
        log_events(&[DomainEvent::AttributeChanged {
            allocation_id: detail.allocation_id,
            allocation_attribute_id: attribute_id,
        }]);
        let updated = self
            .attributes
            .get_detail(attribute_id)
            .await?
            .ok_or_else(|| AppError::internal("Attribute vanished after update"))?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &str, attribute_id: Uuid) -> Result<(), AppError> {
        let detail = self
            .attributes
            .get_detail(attribute_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Attribute {attribute_id} not found")))?;
        self.attributes.delete(attribute_id).await?;
        self.audit
            .record(
                detail.allocation_id,
                actor,
                &format!(
                    "Deleted attribute \"{}\" (value \"{}\")",
                    detail.type_name, detail.value
                ),
            )
            .await?;
        Ok(())
    }
}
