use simple_logger::SimpleLogger;

/// Initializes process-wide logging once, at node construction time —
/// no module-level singleton loggers, matching the "no global mutable
/// state" design note.
pub fn init(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    SimpleLogger::new().with_level(level).init()
}
