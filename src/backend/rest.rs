use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};

use super::TodoBackend;
use super::envelope::{self, CreatePayload, UpdatePayload};
use super::resolver::ResolvedEndpoint;
use crate::core::todo::Todo;
use crate::error::{Result, TodoError};

/// Todo CRUD over the JSON envelope API.
pub struct RestBackend {
    http: Client,
    endpoint: ResolvedEndpoint,
}

impl RestBackend {
    pub fn new(endpoint: ResolvedEndpoint) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self::with_client(http, endpoint))
    }

    pub fn with_client(http: Client, endpoint: ResolvedEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.endpoint
    }

    /// Send one request and return the body of a 2xx response.
    async fn send(&self, req: RequestBuilder) -> Result<String> {
        let resp = req
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            log::warn!("{} answered {}", self.endpoint.url(), status);
            return Err(TodoError::Http(status));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(String::new());
        }
        Ok(resp.text().await?)
    }

    async fn write(&self, req: RequestBuilder) -> Result<()> {
        let body = self.send(req).await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        envelope::parse_ack(&body)
    }
}

#[async_trait]
impl TodoBackend for RestBackend {
    fn describe(&self) -> String {
        self.endpoint.url()
    }

    async fn list(&self) -> Result<Vec<Todo>> {
        let url = self.endpoint.url();
        let body = self.send(self.http.get(&url)).await?;
        let todos = envelope::parse_list(&body)?;
        log::debug!("Fetched {} todos from {}", todos.len(), url);
        Ok(todos)
    }

    async fn create(&self, text: &str) -> Result<()> {
        let req = self
            .http
            .post(self.endpoint.url())
            .json(&CreatePayload::new(text));
        self.write(req).await?;
        log::info!("Created todo: {}", text);
        Ok(())
    }

    async fn update(&self, id: &str, text: &str) -> Result<()> {
        let req = self
            .http
            .put(self.endpoint.item_url(id)?)
            .json(&UpdatePayload { title: text });
        self.write(req).await?;
        log::info!("Updated todo {}", id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.write(self.http.delete(self.endpoint.item_url(id)?))
            .await?;
        log::info!("Deleted todo {}", id);
        Ok(())
    }
}
