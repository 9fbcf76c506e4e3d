use httpmock::Mock;
use httpmock::prelude::*;
use serde_json::{
    Value,
    json,
};

/// A fake control plane: one httpmock server standing in for every service endpoint.
pub struct FakeApi {
    pub server: MockServer,
}

impl FakeApi {
    pub async fn start() -> FakeApi {
        FakeApi { server: MockServer::start_async().await }
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    pub async fn get_ok<'a>(&'a self, path: &str, body: Value) -> Mock<'a> {
        let path = path.to_string();
        self.server
            .mock_async(move |when, then| {
                when.method(GET).path(path.as_str());
                then.status(200).json_body(body.clone());
            })
            .await
    }

    pub async fn post_ok<'a>(&'a self, path: &str, body: Value) -> Mock<'a> {
        let path = path.to_string();
        self.server
            .mock_async(move |when, then| {
                when.method(POST).path(path.as_str());
                then.status(200).json_body(body.clone());
            })
            .await
    }

    pub async fn delete_ok<'a>(&'a self, path: &str, body: Value) -> Mock<'a> {
        let path = path.to_string();
        self.server
            .mock_async(move |when, then| {
                when.method(DELETE).path(path.as_str());
                then.status(200).json_body(body.clone());
            })
            .await
    }

    pub async fn get_fails<'a>(&'a self, path: &str, status: u16, message: &str) -> Mock<'a> {
        let path = path.to_string();
        let body = api_error(status, message);
        self.server
            .mock_async(move |when, then| {
                when.method(GET).path(path.as_str());
                then.status(status).json_body(body.clone());
            })
            .await
    }

    pub async fn post_fails<'a>(&'a self, path: &str, status: u16, message: &str) -> Mock<'a> {
        let path = path.to_string();
        let body = api_error(status, message);
        self.server
            .mock_async(move |when, then| {
                when.method(POST).path(path.as_str());
                then.status(status).json_body(body.clone());
            })
            .await
    }
}

/// The standard error envelope every service returns on failure.
pub fn api_error(code: u16, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "status": match code {
                400 => "INVALID_ARGUMENT",
                403 => "PERMISSION_DENIED",
                404 => "NOT_FOUND",
                409 => "ALREADY_EXISTS",
                429 => "RESOURCE_EXHAUSTED",
                _ => "INTERNAL",
            },
        }
    })
}
