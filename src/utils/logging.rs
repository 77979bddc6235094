use crate::core::message::{MessageRecord, Role};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const USER_HEADER: &str = "] You:";
const ASSISTANT_HEADER: &str = "] Assistant:";

/// Plain-text transcript of the conversation, appended as messages are
/// committed.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// A log given on the command line starts active.
    pub fn new(file_path: Option<PathBuf>) -> Self {
        let is_active = file_path.is_some();
        Self {
            file_path,
            is_active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active && self.file_path.is_some()
    }

    pub fn toggle(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        let Some(path) = &self.file_path else {
            return Err("No transcript file. Start murmur with --transcript <file>.".into());
        };
        self.is_active = !self.is_active;
        if self.is_active {
            Ok(format!("Transcript log resumed: {}", path.display()))
        } else {
            Ok(format!("Transcript log paused: {}", path.display()))
        }
    }

    pub fn status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "off".to_string(),
            (Some(path), active) => format!(
                "{} ({})",
                if active { "on" } else { "paused" },
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }

    pub fn log_record(&self, record: &MessageRecord) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = self.active_path() else {
            return Ok(());
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        write_entry(&mut writer, record)?;
        writer.flush()?;
        Ok(())
    }

    /// Drops the newest assistant entry from the file. Used when that
    /// response is regenerated.
    pub fn remove_last_response(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = self.active_path() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let contents = fs::read_to_string(path)?;
        let mut blocks = split_entries(&contents);
        let Some(last_assistant) = blocks
            .iter()
            .rposition(|block| is_header(block.lines().next().unwrap_or(""), ASSISTANT_HEADER))
        else {
            return Ok(());
        };
        blocks.remove(last_assistant);

        let parent = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent)?;
        for block in blocks {
            temp_file.write_all(block.as_bytes())?;
        }
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(path)?;
        Ok(())
    }

    fn active_path(&self) -> Option<&Path> {
        if self.is_active {
            self.file_path.as_deref()
        } else {
            None
        }
    }
}

fn write_entry<W: Write>(writer: &mut W, record: &MessageRecord) -> std::io::Result<()> {
    let speaker = match record.role {
        Role::User => USER_HEADER,
        Role::Assistant => ASSISTANT_HEADER,
    };
    writeln!(writer, "[{}{speaker}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    for line in record.content.lines() {
        writeln!(writer, "{line}")?;
    }
    if let Some(files) = &record.attached_files_meta {
        for file in files {
            writeln!(writer, "(attached: {})", file.name)?;
        }
    }
    writeln!(writer)
}

fn is_header(line: &str, speaker: &str) -> bool {
    line.starts_with('[') && line.ends_with(speaker)
}

/// Splits the file into entries, each starting at a header line. Text before
/// the first header is kept as its own block.
fn split_entries(contents: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    for line in contents.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        let starts_entry = is_header(bare, USER_HEADER) || is_header(bare, ASSISTANT_HEADER);
        match blocks.last_mut() {
            Some(block) if !starts_entry => block.push_str(line),
            _ => blocks.push(line.to_string()),
        }
    }
    blocks
}
