//! Append-only text logger: `[TYPE] [unix-timestamp] message\n`, `TYPE`
//! collapsing `log`'s five levels onto a two-level EVENT/ERROR taxonomy.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use log::{Level, Log, Metadata, Record};

pub struct AppendFileLogger {
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl AppendFileLogger {
    pub fn open(path: &str) -> std::io::Result<AppendFileLogger> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(AppendFileLogger { writer: Mutex::new(BufWriter::new(file)) })
    }

    fn tag(level: Level) -> &'static str {
        match level {
            Level::Warn | Level::Error => "ERROR",
            Level::Info | Level::Debug | Level::Trace => "EVENT",
        }
    }
}

impl Log for AppendFileLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let ts = p2p_overlay::unix_timestamp();
        let line = format!("[{}] [{}] {}\n", Self::tag(record.level()), ts, record.args());

        let mut writer = self.writer.lock().unwrap();
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap();
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn event_and_error_tags_collapse_log_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        let logger = AppendFileLogger::open(path.to_str().unwrap()).unwrap();

        let record = Record::builder()
            .args(format_args!("hello"))
            .level(Level::Info)
            .build();
        logger.log(&record);

        let record = Record::builder()
            .args(format_args!("uh oh"))
            .level(Level::Error)
            .build();
        logger.log(&record);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[EVENT] ["));
        assert!(lines[0].ends_with("hello"));
        assert!(lines[1].starts_with("[ERROR] ["));
        assert!(lines[1].ends_with("uh oh"));
    }

    #[test]
    fn opening_an_existing_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        std::fs::write(&path, "[EVENT] [1] previous run\n").unwrap();

        let logger = AppendFileLogger::open(path.to_str().unwrap()).unwrap();
        let record = Record::builder().args(format_args!("this run")).level(Level::Info).build();
        logger.log(&record);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("previous run"));
    }
}
