mod logs_test;

use std::io::{
    self,
    Write,
};
use std::sync::{
    Arc,
    Mutex,
};

use bytes::Bytes;
use nb_testutils::*;

use super::*;
use crate::client::{
    ApiError,
    RangeRead,
};
use crate::services::{
    MockBuildsApi,
    MockStorageApi,
};

// Cloneable in-memory sink so a test can keep reading what the tailer wrote
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    fn sink(&self) -> Box<dyn Write + Send> {
        Box::new(self.clone())
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn data(s: &'static str) -> anyhow::Result<RangeRead> {
    Ok(RangeRead::Data(Bytes::from_static(s.as_bytes())))
}

fn http_error(status: u16) -> anyhow::Error {
    anyhow!(ApiError::Http {
        method: reqwest::Method::GET,
        url: format!("http://localhost/storage/v1/b/{TEST_LOGS_BUCKET}/o/log.txt"),
        status,
        message: "nope".into(),
    })
}

// Serves the given reads in order, then reports no new data forever
fn scripted_storage(reads: Vec<anyhow::Result<RangeRead>>) -> MockStorageApi {
    let reads = Mutex::new(std::collections::VecDeque::from(reads));
    let mut storage = MockStorageApi::new();
    storage
        .expect_read_from()
        .returning(move |_, _, _| reads.lock().unwrap().pop_front().unwrap_or(Ok(RangeRead::NoNewData)));
    storage
}
