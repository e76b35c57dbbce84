//! Request descriptors handed to [`ApiClient::call`](super::ApiClient::call).

use crate::envelope::ApplicationFailure;
use crate::resilience::retry::RetryPolicy;
use crate::transport::{Method, PreparedRequest};
use crate::utils::normalize::FieldAliases;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Call-site rule turning one specific application failure into success,
/// e.g. "exam already submitted" on a resubmission.
pub type CompletionPredicate = Arc<dyn Fn(&ApplicationFailure) -> bool + Send + Sync>;

/// Method, path, optional body/params/headers, plus per-call policy.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub policy: Option<RetryPolicy>,
    pub(crate) accept_completed: Option<CompletionPredicate>,
    pub(crate) aliases: Option<FieldAliases>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            policy: None,
            accept_completed: None,
            aliases: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> crate::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn accept_completed(
        mut self,
        predicate: impl Fn(&ApplicationFailure) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.accept_completed = Some(Arc::new(predicate));
        self
    }

    /// Normalize variant payload field names before deserializing `data`.
    pub fn normalize(mut self, aliases: FieldAliases) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub(crate) fn prepare(&self, token: Option<&str>, timeout: Option<Duration>) -> PreparedRequest {
        let mut prepared = PreparedRequest::new(self.method.clone(), self.path.clone());
        prepared.query = self.query.clone();
        prepared.headers = self.headers.clone();
        prepared.body = self.body.clone();
        prepared.timeout = timeout;
        if let Some(token) = token {
            prepared
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        prepared
    }
}

impl std::fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("policy", &self.policy)
            .field("accept_completed", &self.accept_completed.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_attaches_bearer_token() {
        let req = RequestDescriptor::get("/users/me").query("lang", "vi");
        let prepared = req.prepare(Some("abc"), None);
        assert_eq!(prepared.header("authorization"), Some("Bearer abc"));
        assert_eq!(prepared.query, vec![("lang".to_string(), "vi".to_string())]);

        let anonymous = req.prepare(None, None);
        assert!(anonymous.header("authorization").is_none());
    }

    #[test]
    fn json_body_is_serialized() {
        #[derive(Serialize)]
        struct Answer {
            question_id: u32,
            choice: &'static str,
        }
        let req = RequestDescriptor::post("/exams/3/answers")
            .json(&Answer {
                question_id: 7,
                choice: "B",
            })
            .unwrap();
        assert_eq!(req.body, Some(json!({"question_id": 7, "choice": "B"})));
    }
}
