//! Webhook subscription management
//!
//! Keeps exactly one `message.received` webhook pointed at the receiver URL.
//! Requests go through the shared [`OpenPhoneHttpClient`], so they are rate
//! limited and retried like every other call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::fetcher::openphone_config::{
    OpenPhoneApiConfig, MESSAGE_RECEIVED_EVENT, NEW_MESSAGE_WEBHOOK_PATH, OPENPHONE_API_CONFIG,
};
use crate::fetcher::openphone_http::OpenPhoneHttpClient;
use crate::fetcher::{FetcherError, FetcherResult};

/// A webhook as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    /// Webhook id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Delivery URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Subscribed event types
    #[serde(default)]
    pub events: Vec<String>,
    /// `enabled` or `disabled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Free-form label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Owning user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Phone number ids the webhook is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ids: Option<Vec<String>>,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Webhook {
    /// Whether this webhook delivers only `message.received` events to `url`
    pub fn is_message_received_for(&self, url: &str) -> bool {
        self.url.as_deref() == Some(url) && self.events == [MESSAGE_RECEIVED_EVENT]
    }
}

/// Options for creating the message webhook
#[derive(Debug, Clone, Default)]
pub struct WebhookOptions {
    /// Webhook label
    pub label: Option<String>,
    /// Owning user id
    pub user_id: Option<String>,
    /// Restrict to these phone number ids
    pub resource_ids: Option<Vec<String>>,
}

/// Build the receiver URL from a public base URL
pub fn build_webhook_url(base_url: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        NEW_MESSAGE_WEBHOOK_PATH.trim_start_matches('/')
    )
}

/// Parse a comma-separated id list; blanks are dropped and an empty result is `None`
pub fn parse_resource_ids(raw: Option<&str>) -> Option<Vec<String>> {
    let ids: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    (!ids.is_empty()).then_some(ids)
}

/// Manages message webhooks through the OpenPhone API
#[derive(Debug, Clone)]
pub struct WebhookManager {
    http: OpenPhoneHttpClient,
    config: OpenPhoneApiConfig,
}

impl WebhookManager {
    /// Create a manager over a shared client
    pub fn new(http: OpenPhoneHttpClient) -> Self {
        Self {
            http,
            config: OPENPHONE_API_CONFIG,
        }
    }

    /// List workspace webhooks, optionally restricted to one user
    pub async fn list_webhooks(&self, user_id: Option<&str>) -> FetcherResult<Vec<Webhook>> {
        let query: Vec<(&str, String)> = user_id
            .map(|id| vec![("userId", id.to_string())])
            .unwrap_or_default();
        let body = self.http.get(self.config.webhooks_endpoint, &query).await?;

        let webhooks = body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match serde_json::from_value(item.clone()) {
                        Ok(webhook) => Some(webhook),
                        Err(e) => {
                            warn!("Skipping malformed webhook record: {}", e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(webhooks)
    }

    /// Find a webhook delivering only `message.received` to `url`
    pub async fn find_message_received_webhook(
        &self,
        url: &str,
        user_id: Option<&str>,
    ) -> FetcherResult<Option<Webhook>> {
        let webhooks = self.list_webhooks(user_id).await?;
        Ok(webhooks
            .into_iter()
            .find(|webhook| webhook.is_message_received_for(url)))
    }

    /// Create an enabled webhook subscribed to `message.received` only
    pub async fn create_message_received_webhook(
        &self,
        url: &str,
        options: &WebhookOptions,
    ) -> FetcherResult<Webhook> {
        let mut payload = json!({
            "events": [MESSAGE_RECEIVED_EVENT],
            "url": url,
            "status": "enabled",
        });
        if let Some(label) = options.label.as_deref().filter(|l| !l.is_empty()) {
            payload["label"] = json!(label);
        }
        if let Some(user_id) = options.user_id.as_deref().filter(|u| !u.is_empty()) {
            payload["userId"] = json!(user_id);
        }
        if let Some(ids) = options.resource_ids.as_ref().filter(|ids| !ids.is_empty()) {
            payload["resourceIds"] = json!(ids);
        }

        let body = self
            .http
            .post(self.config.message_webhooks_endpoint, &payload)
            .await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        if data.is_null() {
            return Ok(Webhook::default());
        }
        serde_json::from_value(data)
            .map_err(|e| FetcherError::Parse(format!("Invalid webhook response: {e}")))
    }

    /// Reuse the matching webhook if one exists, otherwise create it
    pub async fn ensure_message_received_webhook(
        &self,
        url: &str,
        options: &WebhookOptions,
    ) -> FetcherResult<Webhook> {
        if let Some(existing) = self
            .find_message_received_webhook(url, options.user_id.as_deref())
            .await?
        {
            info!(
                webhook_id = existing.id.as_deref().unwrap_or(""),
                "Reusing existing message.received webhook"
            );
            return Ok(existing);
        }

        let created = self.create_message_received_webhook(url, options).await?;
        info!(
            webhook_id = created.id.as_deref().unwrap_or(""),
            "Created message.received webhook"
        );
        Ok(created)
    }
}
