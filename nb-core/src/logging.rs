use tracing_subscriber::EnvFilter;

pub const HTTP_LOG_DIRECTIVE: &str = "nb_core::client=debug";

pub fn setup_for_cli(verbosity: &str, log_http: bool) {
    let filter = build_filter(verbosity, log_http);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

pub(crate) fn build_filter(verbosity: &str, log_http: bool) -> String {
    if log_http {
        format!("{verbosity},{HTTP_LOG_DIRECTIVE}")
    } else {
        verbosity.into()
    }
}
