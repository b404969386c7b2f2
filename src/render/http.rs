use async_trait::async_trait;
use reqwest::Client;

use super::{PageRenderer, RenderError};

/// Fetches the raw page with a GET; scripts on the page are not run.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}
