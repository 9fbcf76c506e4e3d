use anyhow::bail;
use nb_core::interrupt::Interrupts;
use nb_core::output::{
    OperationRow,
    print_list,
};
use nb_core::prelude::*;
use nb_core::progress::Progress;
use nb_core::waiter::{
    BatchOutcome,
    LroPoller,
    WaitOptions,
    wait_for_all,
};
use serde_json::Value;

/// Splits per-resource request results into the operations that started and the requests
/// that were rejected outright.
pub(crate) fn partition<T>(results: Vec<(String, anyhow::Result<T>)>) -> BatchOutcome<T> {
    let mut outcome = BatchOutcome { succeeded: vec![], failed: vec![] };
    for (name, res) in results {
        match res {
            Ok(value) => outcome.succeeded.push((name, value)),
            Err(err) => outcome.failed.push((name, err)),
        }
    }
    outcome
}

/// Waits on every started operation.  Requests that never started are carried into the
/// result as failures so the caller reports one combined outcome.
pub(crate) async fn wait_started(
    client: &RestClient,
    service: Service,
    started: BatchOutcome<Operation>,
    opts: &WaitOptions,
    interrupts: Interrupts,
    progress: &dyn Progress,
) -> BatchOutcome<Value> {
    let pollers = started
        .succeeded
        .iter()
        .map(|(name, op)| LroPoller::new(client, service, &op.name).with_label(name))
        .collect();

    let mut outcome = wait_for_all(pollers, opts, interrupts, progress).await;
    let mut failed = started.failed;
    failed.append(&mut outcome.failed);
    outcome.failed = failed;
    outcome
}

/// `--async` handling: show what was started and fail if anything could not be.
pub(crate) fn report_started(format: OutputFormat, started: BatchOutcome<Operation>) -> EmptyResult {
    let ops: Vec<_> = started.succeeded.iter().map(|(_, op)| op.clone()).collect();
    print_list(format, &ops, |op| OperationRow::from(op))?;

    if !started.failed.is_empty() {
        let total = ops.len() + started.failed.len();
        let details: Vec<_> = started.failed.iter().map(|(name, err)| format!("  - {name}: {err:#}")).collect();
        bail!("{} of {total} requests failed:\n{}", started.failed.len(), details.join("\n"));
    }
    Ok(())
}
