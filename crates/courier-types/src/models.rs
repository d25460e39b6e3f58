use serde::{Deserialize, Serialize};

use crate::api::SettingsPatch;

/// A registered user. Stored in the users collection keyed by `userId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub settings: UserSettings,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub notifications: NotificationSettings,
    pub theme: Theme,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: NotificationSettings::default(),
            theme: Theme::Light,
            language: "en".into(),
        }
    }
}

impl UserSettings {
    /// Overwrite the fields present in `patch`, keeping the rest.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(notifications) = patch.notifications {
            let current = &mut self.notifications;
            current.email = notifications.email.unwrap_or(current.email);
            current.push = notifications.push.unwrap_or(current.push);
            current.in_app = notifications.in_app.unwrap_or(current.in_app);
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
    }
}

/// Per-channel notification switches. Everything is on for a new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email: bool,
    pub push: bool,
    pub in_app: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            in_app: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// A direct message. Written once by the send path, never updated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    /// Recipient.
    pub user_id: String,
    pub sender_id: String,
    pub content: String,
    pub read: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    System,
    Alert,
}

/// An open gateway connection. Lives only between `$connect` and `$disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub timestamp: String,
}
