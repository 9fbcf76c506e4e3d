use assertables::*;
use nb_api::v1::Build;
use tracing_test::traced_test;

use super::*;
use crate::constants::*;

#[rstest]
#[tokio::test]
async fn test_tailer_holds_partial_lines() {
    let storage = scripted_storage(vec![data("Step #0: hello\nStep #0: wor"), data("ld\n")]);
    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());

    tailer.poll(false).await.unwrap();
    assert_eq!(buf.contents(), format!("{LOG_OUTPUT_HEADER}\nStep #0: hello\n"));
    assert_eq!(tailer.cursor(), 27);

    tailer.poll(false).await.unwrap();
    tailer.finish().unwrap();
    assert_eq!(
        buf.contents(),
        format!("{LOG_OUTPUT_HEADER}\nStep #0: hello\nStep #0: world\n{LOG_OUTPUT_FOOTER}\n")
    );
    assert_eq!(tailer.cursor(), 30);
}

#[rstest]
#[tokio::test]
async fn test_tailer_reads_from_cursor() {
    let mut storage = MockStorageApi::new();
    let mut seq = mockall::Sequence::new();
    storage
        .expect_read_from()
        .withf(|bucket, object, offset| bucket == TEST_LOGS_BUCKET && object == "log.txt" && *offset == 0)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| data("abc\n"));
    storage
        .expect_read_from()
        .withf(|_, _, offset| *offset == 4)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(RangeRead::NoNewData));

    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());
    tailer.poll(false).await.unwrap();
    tailer.poll(false).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_tailer_flushes_partial_line_on_last_poll() {
    let storage = scripted_storage(vec![data("DONE")]);
    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());

    tailer.poll(true).await.unwrap();
    assert_ends_with!(buf.contents(), "DONE\n");
}

#[rstest]
#[tokio::test]
async fn test_tailer_no_output_without_data() {
    let storage = scripted_storage(vec![Ok(RangeRead::NotFound), Ok(RangeRead::NoNewData)]);
    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());

    tailer.poll(false).await.unwrap();
    tailer.poll(true).await.unwrap();
    tailer.finish().unwrap();
    assert_eq!(buf.contents(), "");
}

#[rstest]
#[tokio::test]
async fn test_tailer_filter_keeps_step_lines() {
    let storage = scripted_storage(vec![data(
        "Starting Step #0\nStep #0: downloading deps\nStep #0: ERROR: compile failed\nFinished Step #0\n",
    )]);
    let buf = SharedBuf::default();
    let filter = Regex::new("ERROR").unwrap();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink()).with_filter(Some(filter));

    tailer.poll(true).await.unwrap();
    let out = buf.contents();
    assert_contains!(out, "Starting Step #0\n");
    assert_contains!(out, "Step #0: ERROR: compile failed\n");
    assert_not_contains!(out, "downloading deps");
    assert_not_contains!(out, "Finished Step #0");
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn test_tailer_forbidden_disables_once() {
    let mut storage = MockStorageApi::new();
    storage
        .expect_read_from()
        .times(1)
        .returning(|_, _, _| Err(http_error(403)));

    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());
    tailer.poll(false).await.unwrap();
    tailer.poll(false).await.unwrap();
    tailer.poll(true).await.unwrap();

    assert!(tailer.is_disabled());
    assert!(logs_contain("cannot be streamed"));
    assert_eq!(buf.contents(), "");
}

#[rstest]
#[tokio::test]
async fn test_tailer_retries_after_transient_error() {
    let storage = scripted_storage(vec![Err(http_error(503)), data("line\n")]);
    let buf = SharedBuf::default();
    let mut tailer = LogTailer::new(&storage, TEST_LOGS_BUCKET, "log.txt", buf.sink());

    tailer.poll(false).await.unwrap();
    assert!(!tailer.is_disabled());
    tailer.poll(false).await.unwrap();
    assert_contains!(buf.contents(), "line\n");
}

#[rstest]
fn test_tailer_for_build(test_build: Build) {
    let storage = MockStorageApi::new();
    assert!(LogTailer::for_build(&storage, &test_build, Box::new(std::io::sink())).is_some());

    let no_logs = Build { logs_bucket: None, ..test_build };
    assert!(LogTailer::for_build(&storage, &no_logs, Box::new(std::io::sink())).is_none());
}
