//! Dashboard notification model

use serde::{Deserialize, Serialize};

use super::entity::require_text;
use super::{Collection, Entity, EntityMeta};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            ..Self::default()
        }
    }
}

impl Entity for Notification {
    const COLLECTION: Collection = Collection::Notifications;
    const ID_PREFIX: &'static str = "NTF";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.message, "message")
    }
}

/// Number of notifications not yet marked read.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|item| !item.read).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_count_skips_read_items() {
        let mut read = Notification::new(NotificationKind::Info, "Trip completed");
        read.read = true;
        let unread = Notification::new(NotificationKind::Alert, "Service overdue");
        assert_eq!(unread_count(&[read, unread]), 1);
    }

    #[test]
    fn notification_requires_message() {
        assert!(Notification::new(NotificationKind::Warning, "").validate().is_err());
    }
}
