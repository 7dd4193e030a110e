// src/deploy/client.rs
use super::DeployError;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Fields n8n manages itself and rejects on create/update.
pub const READ_ONLY_WORKFLOW_FIELDS: &[&str] = &["id", "versionId", "meta", "tags", "active"];

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSummary {
    #[serde(default, deserialize_with = "id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "id_string"
    )]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// n8n has used both numeric and string ids.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Thin client over the n8n public REST API (`/api/v1`).
#[derive(Clone)]
pub struct N8nClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl N8nClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DeployError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client: Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/v1/{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &'static str,
    ) -> Result<T, DeployError> {
        let response = request.send().await?;
        let response = ensure_success(response, action).await?;
        Ok(response.json().await?)
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, DeployError> {
        let list: ListResponse<WorkflowSummary> = self
            .send(self.request(Method::GET, "workflows"), "fetch workflows")
            .await?;
        Ok(list.data)
    }

    pub async fn find_workflow_by_name(
        &self,
        name: &str,
    ) -> Result<Option<WorkflowSummary>, DeployError> {
        let workflows = self.list_workflows().await?;
        Ok(workflows
            .into_iter()
            .find(|w| w.name.as_deref() == Some(name)))
    }

    pub async fn create_workflow(&self, workflow: &Value) -> Result<WorkflowSummary, DeployError> {
        let body = writable_workflow(workflow);
        self.send(
            self.request(Method::POST, "workflows").json(&body),
            "create workflow",
        )
        .await
    }

    pub async fn update_workflow(
        &self,
        id: &str,
        workflow: &Value,
    ) -> Result<WorkflowSummary, DeployError> {
        let body = writable_workflow(workflow);
        self.send(
            self.request(Method::PUT, &format!("workflows/{}", id)).json(&body),
            "update workflow",
        )
        .await
    }

    pub async fn activate_workflow(&self, id: &str) -> Result<(), DeployError> {
        let response = self
            .request(Method::PATCH, &format!("workflows/{}", id))
            .json(&json!({ "active": true }))
            .send()
            .await?;
        ensure_success(response, "activate workflow").await?;
        Ok(())
    }

    pub async fn list_credentials(&self) -> Result<Vec<Credential>, DeployError> {
        let list: ListResponse<Credential> = self
            .send(self.request(Method::GET, "credentials"), "fetch credentials")
            .await?;
        Ok(list.data)
    }

    pub async fn find_credential_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Credential>, DeployError> {
        let credentials = self.list_credentials().await?;
        Ok(credentials.into_iter().find(|c| c.name == name))
    }

    pub async fn create_credential(&self, credential: &Credential) -> Result<Credential, DeployError> {
        self.send(
            self.request(Method::POST, "credentials").json(credential),
            "create credential",
        )
        .await
    }

    pub async fn update_credential(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<Credential, DeployError> {
        self.send(
            self.request(Method::PATCH, &format!("credentials/{}", id))
                .json(credential),
            "update credential",
        )
        .await
    }
}

async fn ensure_success(response: Response, action: &'static str) -> Result<Response, DeployError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeployError::Api {
        action,
        status,
        body,
    })
}

/// Copy of `workflow` without the read-only fields.
pub fn writable_workflow(workflow: &Value) -> Value {
    match workflow {
        Value::Object(fields) => {
            let writable: Map<String, Value> = fields
                .iter()
                .filter(|(key, _)| !READ_ONLY_WORKFLOW_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(writable)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_workflow_strips_read_only_fields() {
        let workflow = json!({
            "id": "12",
            "versionId": "abc",
            "meta": {"instanceId": "x"},
            "tags": ["scraper"],
            "active": false,
            "name": "Remote OK Scraper",
            "nodes": [],
            "connections": {},
            "settings": {"timezone": "UTC"}
        });

        assert_eq!(
            writable_workflow(&workflow),
            json!({
                "name": "Remote OK Scraper",
                "nodes": [],
                "connections": {},
                "settings": {"timezone": "UTC"}
            })
        );
    }

    #[test]
    fn test_numeric_and_string_ids() {
        let list: ListResponse<WorkflowSummary> = serde_json::from_value(json!({
            "data": [{"id": 7, "name": "a"}, {"id": "x9", "name": "b"}, {"name": "c"}]
        }))
        .unwrap();
        let ids: Vec<Option<String>> = list.data.into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![Some("7".to_string()), Some("x9".to_string()), None]);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = N8nClient::new("http://n8n.local:5678/", "key").unwrap();
        assert_eq!(client.base_url(), "http://n8n.local:5678");
    }
}
