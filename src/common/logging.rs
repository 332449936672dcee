use env_logger::{Builder, Env};
use log::SetLoggerError;
use std::io::Write;

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        let file = record.file().unwrap_or("unknown");
        let line = record.line().unwrap_or(0);
        writeln!(
            buf,
            "{} [{}:{}] {}",
            record.level(),
            file,
            line,
            record.args()
        )
    });
    builder
}

/// Installs the global logger, filtered by `RUST_LOG` and defaulting to `info`.
///
/// Panics if a logger was already installed; use [`try_init_logging`] from
/// code that may run more than once, such as tests.
pub fn init_logging() {
    builder().init();
}

/// Same as [`init_logging`] but reports an already-installed logger instead of panicking.
pub fn try_init_logging() -> Result<(), SetLoggerError> {
    builder().try_init()
}
