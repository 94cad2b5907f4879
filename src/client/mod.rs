//! HTTP client used by the CLI.

pub mod context;
pub mod gate;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::api::error::ErrorResponse;
use crate::api::{AlertListResponse, SessionListResponse};
use crate::db::{
    Alert, LoginResponse, ParkingSessionResponse, ParkingSpaceWithOccupancy, PaymentMethod,
    SessionStats, UserResponse,
};

pub use context::SessionContext;
pub use gate::{authorize, AccessDecision, Destination};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status}, {code})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Credentials file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// Filters for a session report download
#[derive(Debug, Clone, Default)]
pub struct ExportParams {
    pub format: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-2xx response into `ClientError::Api`
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => (err.error.code, err.error.message),
            Err(_) => ("http_error".to_string(), body),
        };
        Err(ClientError::Api {
            status,
            code,
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .authed(self.http.get(self.url(path)).query(query))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let response = self
            .authed(self.http.post(self.url(path)).json(&body))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(Self::check(response).await?.text().await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        self.post_json(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .authed(self.http.post(self.url("/api/auth/logout")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.get_json("/api/auth/me", &[]).await
    }

    pub async fn sessions(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<ParkingSessionResponse>, ClientError> {
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.to_string())])
            .unwrap_or_default();
        let list: SessionListResponse = self.get_json("/api/sessions", &query).await?;
        Ok(list.sessions)
    }

    pub async fn enter(
        &self,
        plate: &str,
        vehicle_type: &str,
        space_number: &str,
    ) -> Result<ParkingSessionResponse, ClientError> {
        self.post_json(
            "/api/sessions",
            json!({
                "plate": plate,
                "vehicle_type": vehicle_type,
                "space_number": space_number,
            }),
        )
        .await
    }

    pub async fn exit(&self, session_id: &str) -> Result<ParkingSessionResponse, ClientError> {
        self.post_json(&format!("/api/sessions/{}/exit", session_id), json!({}))
            .await
    }

    pub async fn pay(
        &self,
        session_id: &str,
        method: PaymentMethod,
    ) -> Result<ParkingSessionResponse, ClientError> {
        self.post_json(
            &format!("/api/sessions/{}/pay", session_id),
            json!({ "payment_method": method }),
        )
        .await
    }

    pub async fn stats(&self) -> Result<SessionStats, ClientError> {
        self.get_json("/api/stats", &[]).await
    }

    pub async fn alerts(&self, limit: Option<i64>) -> Result<Vec<Alert>, ClientError> {
        let query: Vec<(&str, String)> = limit
            .map(|l| vec![("limit", l.to_string())])
            .unwrap_or_default();
        let list: AlertListResponse = self.get_json("/api/alerts", &query).await?;
        Ok(list.alerts)
    }

    pub async fn spaces(&self) -> Result<Vec<ParkingSpaceWithOccupancy>, ClientError> {
        self.get_json("/api/spaces", &[]).await
    }

    /// Download a report; returns the raw file body
    pub async fn export(&self, params: &ExportParams) -> Result<Vec<u8>, ClientError> {
        let mut query = vec![("format", params.format.clone())];
        if let Some(start) = &params.start_date {
            query.push(("start_date", start.clone()));
        }
        if let Some(end) = &params.end_date {
            query.push(("end_date", end.clone()));
        }
        if let Some(status) = &params.status {
            query.push(("status", status.clone()));
        }

        let response = self
            .authed(self.http.get(self.url("/api/sessions/export")).query(&query))
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
