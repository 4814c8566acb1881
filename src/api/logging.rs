use slog::Drain;

/// Root logger writing to the terminal, for binaries and tests.
pub fn terminal_logger(application: &str) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("Application" => application.to_string()))
}
