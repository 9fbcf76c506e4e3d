use serde::de::DeserializeOwned;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

// A long-running operation as returned by every mutating call; the server flips `done` once
// and then populates exactly one of `error` or `response`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    #[serde(default)]
    pub done: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl Operation {
    pub fn result(&self) -> Option<Result<Value, Status>> {
        if !self.done {
            return None;
        }

        Some(match &self.error {
            Some(status) => Err(status.clone()),
            None => Ok(self.response.clone().unwrap_or(Value::Null)),
        })
    }

    pub fn metadata_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.metadata
            .as_ref()
            .and_then(|md| serde_json::from_value(md.clone()).ok())
    }

    /// The last path segment of the operation name, which is what users normally type.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOperationRequest {}

#[cfg(test)]
mod tests {
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_result_not_done() {
        let op: Operation = serde_json::from_value(json!({"name": "operations/op-1"})).unwrap();
        assert_eq!(op.result(), None);
    }

    #[rstest]
    fn test_result_error() {
        let op: Operation = serde_json::from_value(json!({
            "name": "operations/op-1",
            "done": true,
            "error": {"code": 9, "message": "quota exceeded"},
        }))
        .unwrap();
        let err = op.result().unwrap().unwrap_err();
        assert_eq!(err.code, 9);
        assert_eq!(err.message, "quota exceeded");
    }

    #[rstest]
    fn test_result_done_without_response() {
        let op = Operation { name: "op".into(), done: true, ..Default::default() };
        assert_eq!(op.result(), Some(Ok(Value::Null)));
    }

    #[rstest]
    fn test_short_name() {
        let op = Operation {
            name: "projects/p/locations/l/operations/op-123".into(),
            ..Default::default()
        };
        assert_eq!(op.short_name(), "op-123");
    }
}
