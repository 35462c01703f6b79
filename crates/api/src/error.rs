use thiserror::Error;

/// Failure to deliver a notification.
///
/// Delivery is best effort: callers log these and move on.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
}

impl NotifyError {
    /// Build a [`NotifyError::Status`] from a non-2xx response.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Status {
            service,
            status,
            body,
        }
    }
}
