use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Tees every formatted log line to stdout and a broadcast channel, so the
/// daemon can persist its own log without a second subscriber.
#[derive(Clone)]
pub(crate) struct LogTapMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for LogTapMakeWriter {
    type Writer = LogTapWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogTapWriter {
            sender: self.sender.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct LogTapWriter {
    sender: broadcast::Sender<String>,
    suppress_stdout: bool,
}

impl std::io::Write for LogTapWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // no receivers is fine
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

/// Installs the global subscriber and returns the log tap sender.
pub(crate) fn init(level: Level, suppress_stdout: bool) -> broadcast::Sender<String> {
    let (log_tx, _) = broadcast::channel::<String>(500);
    let make_writer = LogTapMakeWriter {
        sender: log_tx.clone(),
        suppress_stdout,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // already set in tests
    log_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn writer_forwards_lines_to_channel() {
        let (tx, mut rx) = broadcast::channel(4);
        let make = LogTapMakeWriter {
            sender: tx,
            suppress_stdout: true,
        };
        let mut w = make.make_writer();
        assert_eq!(w.write(b"hello\n").unwrap(), 6);
        assert_eq!(rx.try_recv().unwrap(), "hello\n");
    }
}
