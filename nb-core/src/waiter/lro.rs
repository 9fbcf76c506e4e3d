use async_trait::async_trait;
use nb_api::Service;
use nb_api::v1::Operation;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    OperationPoller,
    WaitError,
};
use crate::errors::*;
use crate::services::OperationsApi;

/// Polls a generic long-running operation by name until `done` is set.
pub struct LroPoller<'a, A: OperationsApi + ?Sized> {
    api: &'a A,
    service: Service,
    name: String,
    label: String,
}

impl<'a, A: OperationsApi + ?Sized> LroPoller<'a, A> {
    pub fn new(api: &'a A, service: Service, name: &str) -> LroPoller<'a, A> {
        LroPoller { api, service, name: name.into(), label: name.into() }
    }

    /// Names the poller after the resource it affects instead of the operation, so batch
    /// results and error messages read `my-vm: ...` rather than an operation path.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.into();
        self
    }

    pub fn operation_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<A: OperationsApi + ?Sized> OperationPoller for LroPoller<'_, A> {
    type State = Operation;
    type Output = Value;

    fn name(&self) -> &str {
        &self.label
    }

    async fn poll(&mut self) -> anyhow::Result<Operation> {
        self.api.get_operation(self.service, &self.name).await
    }

    fn is_done(&self, op: &Operation) -> bool {
        op.done
    }

    fn get_result(&self, op: Operation) -> anyhow::Result<Value> {
        match op.result() {
            Some(Ok(value)) => Ok(value),
            Some(Err(status)) => Err(WaitError::operation_failed(&format!("{}: {}", status.code, status.message))),
            None => bail!("operation {} is not done", self.name),
        }
    }

    async fn cancel(&mut self) -> EmptyResult {
        self.api.cancel_operation(self.service, &self.name).await
    }

    fn status_detail(&self, op: &Operation) -> Option<String> {
        op.metadata
            .as_ref()
            .and_then(|md| md.get("statusMessage"))
            .and_then(Value::as_str)
            .map(String::from)
    }
}

/// Decodes the response of a finished operation, e.g. the `Cluster` a create call produced.
pub fn response_as<T: DeserializeOwned>(value: Value) -> anyhow::Result<T> {
    serde_json::from_value(value).map_err(|e| anyhow!("could not decode operation response: {e}"))
}
