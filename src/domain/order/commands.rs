use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::Service;
use crate::domain::Requester;
use super::value_objects::{ItemPatch, ParametersPatch};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    AddItem {
        requester: Requester,
        item_id: Uuid,
        service: Service,
    },
    RemoveItem {
        requester: Requester,
        item_id: Uuid,
    },
    UpdateItem {
        requester: Requester,
        item_id: Uuid,
        patch: ItemPatch,
    },
    SetParameters {
        requester: Requester,
        patch: ParametersPatch,
    },
    Form {
        requester: Requester,
        at: DateTime<Utc>,
    },
    Complete {
        requester: Requester,
        at: DateTime<Utc>,
    },
    Reject {
        requester: Requester,
        at: DateTime<Utc>,
    },
    SoftDelete {
        requester: Requester,
        at: DateTime<Utc>,
    },
}

impl OrderCommand {
    /// Metric and log label
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::AddItem { .. } => "add_item",
            OrderCommand::RemoveItem { .. } => "remove_item",
            OrderCommand::UpdateItem { .. } => "update_item",
            OrderCommand::SetParameters { .. } => "set_parameters",
            OrderCommand::Form { .. } => "form",
            OrderCommand::Complete { .. } => "complete",
            OrderCommand::Reject { .. } => "reject",
            OrderCommand::SoftDelete { .. } => "soft_delete",
        }
    }

    pub fn requester(&self) -> Requester {
        match self {
            OrderCommand::AddItem { requester, .. }
            | OrderCommand::RemoveItem { requester, .. }
            | OrderCommand::UpdateItem { requester, .. }
            | OrderCommand::SetParameters { requester, .. }
            | OrderCommand::Form { requester, .. }
            | OrderCommand::Complete { requester, .. }
            | OrderCommand::Reject { requester, .. }
            | OrderCommand::SoftDelete { requester, .. } => *requester,
        }
    }
}
