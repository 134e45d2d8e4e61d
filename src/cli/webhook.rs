//! Webhook command implementation

use clap::{Parser, Subcommand};
use tracing::{error, info};

use super::{Cli, CliError, OutputFormat};
use crate::fetcher::openphone_config::NEW_MESSAGE_WEBHOOK_PATH;
use crate::fetcher::webhooks::{
    build_webhook_url, parse_resource_ids, Webhook, WebhookManager, WebhookOptions,
};

/// Webhook command arguments
#[derive(Parser, Debug)]
pub struct WebhookArgs {
    /// Webhook operation
    #[command(subcommand)]
    pub command: WebhookCommand,
}

/// Webhook operations
#[derive(Subcommand, Debug)]
pub enum WebhookCommand {
    /// Reuse or create the message.received webhook for the receiver URL
    Ensure(EnsureWebhookArgs),
}

/// Arguments for `webhook ensure`
#[derive(Parser, Debug)]
pub struct EnsureWebhookArgs {
    /// Public base URL of the webhook receiver, e.g. https://example.com
    #[arg(long, env = "OPENPHONE_WEBHOOK_BASE_URL")]
    pub base_url: Option<String>,

    /// Webhook label
    #[arg(long, default_value = NEW_MESSAGE_WEBHOOK_PATH.trim_start_matches('/'))]
    pub label: String,

    /// OpenPhone user id owning the webhook
    #[arg(long)]
    pub user_id: Option<String>,

    /// Comma-separated phone number ids (PN...); "*" for all numbers
    #[arg(long)]
    pub resource_ids: Option<String>,
}

impl WebhookArgs {
    /// Execute the webhook command
    pub async fn execute(&self, cli: &Cli) -> Result<Webhook, CliError> {
        match &self.command {
            WebhookCommand::Ensure(args) => args.execute(cli).await,
        }
    }
}

impl EnsureWebhookArgs {
    /// Receiver URL derived from `--base-url`
    pub fn webhook_url(&self) -> Result<String, CliError> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                CliError::Configuration(
                    "Missing base URL. Set OPENPHONE_WEBHOOK_BASE_URL or pass --base-url."
                        .to_string(),
                )
            })?;
        Ok(build_webhook_url(base_url))
    }

    /// Creation options from the flags
    pub fn options(&self) -> WebhookOptions {
        WebhookOptions {
            label: Some(self.label.clone()).filter(|label| !label.is_empty()),
            user_id: self.user_id.clone(),
            resource_ids: parse_resource_ids(self.resource_ids.as_deref()),
        }
    }

    async fn execute(&self, cli: &Cli) -> Result<Webhook, CliError> {
        let url = self.webhook_url()?;
        let manager = WebhookManager::new(cli.http_client()?);

        info!(url = %url, "Ensuring message.received webhook");
        let result = manager
            .ensure_message_received_webhook(&url, &self.options())
            .await;

        match (&result, cli.output_format) {
            (Ok(webhook), OutputFormat::Json) => match serde_json::to_string_pretty(webhook) {
                Ok(text) => println!("{text}"),
                Err(e) => error!("Failed to render JSON output: {}", e),
            },
            (Ok(webhook), OutputFormat::Human) => {
                println!("\nWebhook ready!");
                println!("URL: {url}");
                if let Some(id) = &webhook.id {
                    println!("ID: {id}");
                }
                if let Some(status) = &webhook.status {
                    println!("Status: {status}");
                }
            }
            (Err(e), OutputFormat::Json) => {
                println!(
                    "{}",
                    serde_json::json!({"success": false, "error": e.to_string()})
                );
            }
            (Err(e), OutputFormat::Human) => {
                eprintln!("\nWebhook setup failed!");
                eprintln!("Error: {e}");
            }
        }

        Ok(result?)
    }
}
