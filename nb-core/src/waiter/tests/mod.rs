
use std::collections::VecDeque;
use std::sync::Mutex;

use reqwest::Method;
use tokio::time::Instant;

use super::*;
use crate::client::ApiError;
use crate::interrupt::InterruptSender;
use crate::progress::NoProgress;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ScriptState {
    Running,
    Done(u32),
    Failed,
}

struct ScriptedPoller {
    name: String,
    script: VecDeque<anyhow::Result<ScriptState>>,
    poll_times: Vec<Instant>,
    interrupt_on: Vec<usize>,
    sender: Option<InterruptSender>,
    cancel_calls: usize,
    cancel_fails: bool,
    finished: bool,
}

impl ScriptedPoller {
    fn new(name: &str, script: Vec<anyhow::Result<ScriptState>>) -> ScriptedPoller {
        ScriptedPoller {
            name: name.into(),
            script: script.into(),
            poll_times: vec![],
            interrupt_on: vec![],
            sender: None,
            cancel_calls: 0,
            cancel_fails: false,
            finished: false,
        }
    }

    // Delivers an interrupt while handling each of the given (1-based) polls; a poll listed
    // twice gets two interrupts
    fn interrupting(mut self, sender: InterruptSender, polls: &[usize]) -> ScriptedPoller {
        self.sender = Some(sender);
        self.interrupt_on = polls.to_vec();
        self
    }

    fn failing_cancel(mut self) -> ScriptedPoller {
        self.cancel_fails = true;
        self
    }

    fn polls(&self) -> usize {
        self.poll_times.len()
    }
}

#[async_trait]
impl OperationPoller for ScriptedPoller {
    type State = ScriptState;
    type Output = u32;

    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> anyhow::Result<ScriptState> {
        self.poll_times.push(Instant::now());
        if let Some(tx) = &self.sender {
            for _ in self.interrupt_on.iter().filter(|p| **p == self.polls()) {
                tx.interrupt();
            }
        }
        self.script.pop_front().unwrap_or(Ok(ScriptState::Running))
    }

    fn is_done(&self, state: &ScriptState) -> bool {
        *state != ScriptState::Running
    }

    fn get_result(&self, state: ScriptState) -> anyhow::Result<u32> {
        match state {
            ScriptState::Done(v) => Ok(v),
            _ => Err(WaitError::operation_failed(&self.name)),
        }
    }

    async fn cancel(&mut self) -> EmptyResult {
        self.cancel_calls += 1;
        if self.cancel_fails {
            bail!("cancelling {} is not allowed", self.name);
        }
        Ok(())
    }

    async fn finish(&mut self) {
        self.finished = true;
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
    details: Mutex<Vec<String>>,
}

impl RecordingProgress {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn details(&self) -> Vec<String> {
        self.details.lock().unwrap().clone()
    }
}

impl Progress for RecordingProgress {
    fn tick(&self, detail: Option<&str>) {
        self.events.lock().unwrap().push("tick".into());
        if let Some(d) = detail {
            self.details.lock().unwrap().push(d.into());
        }
    }

    fn done(&self) {
        self.events.lock().unwrap().push("done".into());
    }

    fn fail(&self, _msg: &str) {
        self.events.lock().unwrap().push("fail".into());
    }
}

fn unavailable() -> anyhow::Error {
    anyhow!(ApiError::Http {
        method: Method::GET,
        url: "http://localhost/v1/operations/op".into(),
        status: 503,
        message: "backend unavailable".into(),
    })
}

fn fixed_opts(secs: u64) -> WaitOptions {
    WaitOptions::default().with_fixed_interval(Duration::from_secs(secs))
}
