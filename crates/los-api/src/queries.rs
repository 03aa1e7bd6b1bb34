//! Query thread and message endpoints.

use los_common::{QueryCounts, QueryId, QueryThread, ThreadMessage};
use reqwest::Method;
use serde_json::Value;

use crate::{ApiClient, ApiError};

impl ApiClient {
    /// List queries for a dashboard tab (`main`) and sub-tab (`sub`).
    pub async fn queries(
        &self,
        main: Option<&str>,
        sub: Option<&str>,
    ) -> Result<Vec<QueryThread>, ApiError> {
        let mut params = Vec::new();
        if let Some(main) = main {
            params.push(("main", main));
        }
        if let Some(sub) = sub {
            params.push(("sub", sub));
        }
        self.send_json(self.request(Method::GET, "/queries").query(&params))
            .await
    }

    pub async fn query_counts(&self) -> Result<QueryCounts, ApiError> {
        self.send_json(self.request(Method::GET, "/queries/counts"))
            .await
    }

    pub async fn query(&self, id: &QueryId) -> Result<QueryThread, ApiError> {
        self.send_json(self.request(Method::GET, &format!("/queries/{id}")))
            .await
    }

    /// All messages of one thread, oldest first.
    pub async fn messages(&self, id: &QueryId) -> Result<Vec<ThreadMessage>, ApiError> {
        self.send_json(self.request(Method::GET, &format!("/queries/{id}/messages")))
            .await
    }

    pub async fn send_message(&self, id: &QueryId, text: &str) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "message": text });
        self.send_json(
            self.request(Method::POST, &format!("/queries/{id}/messages"))
                .json(&body),
        )
        .await
    }

    pub async fn close_query(&self, id: &QueryId, body: &Value) -> Result<Value, ApiError> {
        self.send_json(
            self.request(Method::POST, &format!("/queries/{id}/close"))
                .json(body),
        )
        .await
    }

    pub async fn update_query_status(&self, id: &QueryId, status: &str) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "status": status });
        self.send_json(
            self.request(Method::PATCH, &format!("/queries/{id}/status"))
                .json(&body),
        )
        .await
    }
}
