//! Mail service client for margin-call notices.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::NotifyError;

/// Default deadline for one mail service request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters rendered into the margin-call mail template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginCallParams {
    /// Asset label of the loan token ("Btc" / "Usd")
    pub asset: String,
    /// Approximate liquidation price
    pub liquidation_price: f64,
    /// Hash of the trade that opened the loan
    pub tx_hash: String,
    pub leverage: f64,
    /// Principal in base units
    pub principal: String,
    /// Position size in base units
    pub position_size: String,
    /// Current margin, decimal percent
    pub current_margin: f64,
    /// Maintenance margin, decimal percent
    pub maintenance_margin: f64,
}

/// One margin-call notice for one borrower.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginCallNotice {
    /// Borrower address
    pub user: String,
    pub params: MarginCallParams,
}

#[derive(Serialize)]
struct SendMarginCall<'a> {
    position: &'a MarginCallNotice,
}

/// Outbound margin-call delivery.
#[async_trait]
pub trait MarginCallMailer: Send + Sync {
    async fn send_margin_call(&self, notice: &MarginCallNotice) -> Result<(), NotifyError>;
}

/// HTTP client for the mail service.
#[derive(Clone)]
pub struct MailServiceClient {
    client: reqwest::Client,
    timeout: Duration,
    host: String,
    api_key: String,
}

impl std::fmt::Debug for MailServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailServiceClient")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MailServiceClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            host: host.into(),
            api_key: api_key.into(),
        }
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/sendMarginCall", self.host.trim_end_matches('/'))
    }
}

#[async_trait]
impl MarginCallMailer for MailServiceClient {
    #[instrument(skip(self, notice), fields(user = %notice.user))]
    async fn send_margin_call(&self, notice: &MarginCallNotice) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .timeout(self.timeout)
            .json(&SendMarginCall { position: notice })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::from_response("mail service", response).await);
        }

        let body = response.text().await.unwrap_or_default();
        info!(response = %body, "Margin call sent");
        Ok(())
    }
}
