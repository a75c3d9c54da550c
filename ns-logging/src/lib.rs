use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

// --- Writer that duplicates output to two sinks ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A, B> Write for Tee<A, B>
where
    A: Write,
    B: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B, W1, W2> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a, Writer = W1>,
    B: MakeWriter<'a, Writer = W2>,
    W1: Write + 'a,
    W2: Write + 'a,
{
    type Writer = Tee<W1, W2>;
    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

/// Logging settings resolved from `NS_LOG_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub file_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            format: LogFormat::Human,
            file_path: PathBuf::from("/tmp/ns-provisioner.log"),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let output = match lookup("NS_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Console,
        };
        let format = match lookup("NS_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Self {
            level: lookup("NS_LOG_LEVEL").unwrap_or(defaults.level),
            output,
            format,
            file_path: lookup("NS_LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in ["hyper=warn", "tokio=warn", "sqlx=warn"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

/// Initializes the global tracing subscriber from the environment.
///
/// The returned guard flushes the file appender on drop and must be held for
/// the lifetime of the process when file output is enabled.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogConfig::from_env())
}

pub fn init_with(config: &LogConfig) -> Option<WorkerGuard> {
    let subscriber = registry().with(config.env_filter());
    let is_json = config.format == LogFormat::Json;

    let log_dir = config
        .file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/tmp"));
    let log_filename = config
        .file_path
        .file_name()
        .unwrap_or("ns-provisioner.log".as_ref());

    match config.output {
        LogOutput::Console => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(io::stdout);
            if is_json {
                subscriber.with(fmt_layer.json()).init();
            } else {
                subscriber.with(fmt_layer.pretty()).init();
            }
            None
        }
        LogOutput::File => {
            let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if is_json {
                subscriber.with(fmt_layer.json()).init();
            } else {
                subscriber.with(fmt_layer.pretty()).init();
            }
            Some(guard)
        }
        LogOutput::Both => {
            let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let tee_writer = MakeTee {
                make_a: io::stdout,
                make_b: non_blocking,
            };
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(tee_writer);
            if is_json {
                subscriber.with(fmt_layer.json()).init();
            } else {
                subscriber.with(fmt_layer.pretty()).init();
            }
            Some(guard)
        }
    }
}
