use std::io::Write;

use lazy_static::lazy_static;
use nb_api::v1::Build;
use tracing::*;

use crate::client::{
    RangeRead,
    http_status,
    is_transient,
};
use crate::constants::*;
use crate::errors::*;
use crate::services::StorageApi;

lazy_static! {
    static ref STEP_LINE: Regex = Regex::new(r"^Starting Step #\d+").expect("step regex is valid");
}

/// Follows a build's log object by repeatedly reading everything past the last byte seen.
/// Only complete lines are written to the sink; a trailing partial line is held back until more
/// data arrives or the final poll flushes it.
pub struct LogTailer<'a, S: StorageApi + ?Sized> {
    storage: &'a S,
    bucket: String,
    object: String,
    cursor: u64,
    pending: Vec<u8>,
    filter: Option<Regex>,
    out: Box<dyn Write + Send>,
    header_printed: bool,
    footer_printed: bool,
    disabled: bool,
}

impl<'a, S: StorageApi + ?Sized> LogTailer<'a, S> {
    pub fn new(storage: &'a S, bucket: &str, object: &str, out: Box<dyn Write + Send>) -> LogTailer<'a, S> {
        LogTailer {
            storage,
            bucket: bucket.into(),
            object: object.into(),
            cursor: 0,
            pending: vec![],
            filter: None,
            out,
            header_printed: false,
            footer_printed: false,
            disabled: false,
        }
    }

    /// `None` if the build does not say where its logs go.
    pub fn for_build(storage: &'a S, build: &Build, out: Box<dyn Write + Send>) -> Option<LogTailer<'a, S>> {
        let (bucket, object) = build.log_object()?;
        Some(LogTailer::new(storage, &bucket, &object, out))
    }

    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub async fn poll(&mut self, is_last: bool) -> EmptyResult {
        if self.disabled {
            return Ok(());
        }

        match self.storage.read_from(&self.bucket, &self.object, self.cursor).await {
            Ok(RangeRead::Data(data)) => {
                self.cursor += data.len() as u64;
                self.pending.extend_from_slice(&data);
            },
            Ok(RangeRead::NoNewData | RangeRead::NotFound) => (),
            Err(err) if http_status(&err) == Some(403) => {
                warn!(
                    "the build log in gs://{}/{} cannot be streamed with your credentials; \
                    the build continues and its status will be reported when it finishes",
                    self.bucket, self.object
                );
                self.disabled = true;
            },
            Err(err) if is_transient(&err) => debug!("could not read build log, will retry: {err}"),
            Err(err) => debug!("could not read build log: {err:#}"),
        }

        self.emit_complete_lines()?;
        if is_last {
            self.flush_partial()?;
        }
        Ok(())
    }

    /// Writes the closing rule, if anything was printed.
    pub fn finish(&mut self) -> EmptyResult {
        if self.header_printed && !self.footer_printed {
            writeln!(self.out, "{LOG_OUTPUT_FOOTER}")?;
            self.footer_printed = true;
        }
        self.out.flush()?;
        Ok(())
    }

    fn emit_complete_lines(&mut self) -> EmptyResult {
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(());
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        let text = String::from_utf8_lossy(&complete);
        for line in text.lines() {
            self.emit(line)?;
        }
        Ok(())
    }

    fn flush_partial(&mut self) -> EmptyResult {
        if self.pending.is_empty() {
            return Ok(());
        }

        let partial = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&partial);
        self.emit(&line)
    }

    fn emit(&mut self, line: &str) -> EmptyResult {
        if !self.keep(line) {
            return Ok(());
        }

        if !self.header_printed {
            writeln!(self.out, "{LOG_OUTPUT_HEADER}")?;
            self.header_printed = true;
        }
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    // Step boundaries are kept even when filtering so the output stays readable
    fn keep(&self, line: &str) -> bool {
        match &self.filter {
            Some(re) => re.is_match(line) || STEP_LINE.is_match(line),
            None => true,
        }
    }
}
