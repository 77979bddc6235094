//! Files and images waiting to go out with the next message.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::core::capabilities::ModelCapabilities;
use crate::core::message::{AttachedFileMeta, MessageRecord};

pub const MAX_FILES: usize = 5;
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ATTACHMENT_PROMPT: &str = "Please analyze the provided content.";

#[derive(Debug)]
pub enum AttachmentError {
    TooManyFiles,
    UnsupportedFileType { name: String },
    UnsupportedImageType { name: String },
    TooLarge { name: String },
    Duplicate { name: String },
    ImagesNotSupported { model: String },
    NotText { name: String },
    Read { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::TooManyFiles => {
                write!(f, "You can attach a maximum of {MAX_FILES} files.")
            }
            AttachmentError::UnsupportedFileType { name } => {
                write!(f, "File type not supported for \"{name}\". Allowed: TXT, MD.")
            }
            AttachmentError::UnsupportedImageType { .. } => {
                f.write_str("Please upload a JPG or PNG image.")
            }
            AttachmentError::TooLarge { name } => write!(
                f,
                "File \"{name}\" exceeds the {}MB size limit.",
                MAX_ATTACHMENT_BYTES / 1024 / 1024
            ),
            AttachmentError::Duplicate { name } => {
                write!(f, "File \"{name}\" is already attached.")
            }
            AttachmentError::ImagesNotSupported { model } => {
                write!(f, "{model} does not accept images.")
            }
            AttachmentError::NotText { name } => {
                write!(f, "File \"{name}\" is not valid UTF-8 text.")
            }
            AttachmentError::Read { path, source } => {
                write!(f, "Could not read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for AttachmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttachmentError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Whether an attachment is a text file or an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Image,
}

impl AttachmentKind {
    /// Guess from the extension; anything that is not a known image type is
    /// treated as a file and validated as one.
    pub fn for_path(path: &Path) -> Self {
        if image_mime(&file_name(path)).is_some() {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub name: String,
    pub data_url: String,
}

/// What a submission turns into: the record for history plus what the
/// transcript shows for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub record: MessageRecord,
    pub display_text: String,
    pub attachment_names: Vec<String>,
    pub has_image: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PendingAttachments {
    files: Vec<PendingFile>,
    image: Option<PendingImage>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn text_mime(name: &str) -> Option<&'static str> {
    match extension(name).as_str() {
        "txt" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        _ => None,
    }
}

fn image_mime(name: &str) -> Option<&'static str> {
    match extension(name).as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

fn read_limited(path: &Path, name: &str) -> Result<Vec<u8>, AttachmentError> {
    let read_err = |source| AttachmentError::Read {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(read_err)?;
    if metadata.len() > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            name: name.to_string(),
        });
    }
    fs::read(path).map_err(read_err)
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn image(&self) -> Option<&PendingImage> {
        self.image.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.image.is_none()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.image = None;
    }

    /// Names of everything pending, image first.
    pub fn names(&self) -> Vec<String> {
        self.image
            .iter()
            .map(|image| image.name.clone())
            .chain(self.files.iter().map(|file| file.name.clone()))
            .collect()
    }

    pub fn add_file(&mut self, path: &Path) -> Result<&PendingFile, AttachmentError> {
        let name = file_name(path);
        self.check_file(&name)?;
        let bytes = read_limited(path, &name)?;
        self.add_file_bytes(&name, bytes)
    }

    pub fn add_file_bytes(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<&PendingFile, AttachmentError> {
        let kind = self.check_file(name)?;
        if bytes.len() as u64 > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge {
                name: name.to_string(),
            });
        }
        let content = String::from_utf8(bytes).map_err(|_| AttachmentError::NotText {
            name: name.to_string(),
        })?;
        self.files.push(PendingFile {
            name: name.to_string(),
            kind: kind.to_string(),
            content,
        });
        Ok(&self.files[self.files.len() - 1])
    }

    fn check_file(&self, name: &str) -> Result<&'static str, AttachmentError> {
        if self.files.len() >= MAX_FILES {
            return Err(AttachmentError::TooManyFiles);
        }
        let kind = text_mime(name).ok_or_else(|| AttachmentError::UnsupportedFileType {
            name: name.to_string(),
        })?;
        if self.files.iter().any(|f| f.name == name) {
            return Err(AttachmentError::Duplicate {
                name: name.to_string(),
            });
        }
        Ok(kind)
    }

    pub fn remove_file(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        self.files.len() != before
    }

    /// Replaces any pending image.
    pub fn set_image(
        &mut self,
        path: &Path,
        model: &str,
        capabilities: ModelCapabilities,
    ) -> Result<&PendingImage, AttachmentError> {
        let name = file_name(path);
        Self::check_image(&name, model, capabilities)?;
        let bytes = read_limited(path, &name)?;
        self.set_image_bytes(&name, &bytes, model, capabilities)
    }

    pub fn set_image_bytes(
        &mut self,
        name: &str,
        bytes: &[u8],
        model: &str,
        capabilities: ModelCapabilities,
    ) -> Result<&PendingImage, AttachmentError> {
        let mime = Self::check_image(name, model, capabilities)?;
        if bytes.len() as u64 > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge {
                name: name.to_string(),
            });
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(self.image.insert(PendingImage {
            name: name.to_string(),
            data_url: format!("data:{mime};base64,{encoded}"),
        }))
    }

    fn check_image(
        name: &str,
        model: &str,
        capabilities: ModelCapabilities,
    ) -> Result<&'static str, AttachmentError> {
        if !capabilities.supports_images {
            return Err(AttachmentError::ImagesNotSupported {
                model: model.to_string(),
            });
        }
        image_mime(name).ok_or_else(|| AttachmentError::UnsupportedImageType {
            name: name.to_string(),
        })
    }

    pub fn take_image(&mut self) -> Option<PendingImage> {
        self.image.take()
    }

    /// Builds the user record and empties the pending set.
    ///
    /// File contents come first, separated by blank lines, followed by the
    /// typed text (or a default prompt when only attachments were given).
    pub fn compose(&mut self, text: &str) -> ComposedMessage {
        let text = text.trim();
        let files = std::mem::take(&mut self.files);
        let image = self.image.take();

        let contents: Vec<&str> = files
            .iter()
            .map(|f| f.content.as_str())
            .filter(|c| !c.is_empty())
            .collect();
        let (content, text_offset) = if contents.is_empty() {
            (text.to_string(), 0)
        } else {
            let prompt = if text.is_empty() {
                DEFAULT_ATTACHMENT_PROMPT
            } else {
                text
            };
            let prefix = format!("{}\n\n", contents.join("\n\n"));
            let offset = prefix.len();
            (format!("{prefix}{prompt}"), offset)
        };

        let mut record = MessageRecord::user(content).with_text_offset(text_offset);
        let has_image = image.is_some();
        if let Some(image) = image {
            record = record.with_image(image.data_url);
        }
        let attachment_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        if !files.is_empty() {
            record = record.with_attachments(
                files
                    .into_iter()
                    .map(|f| AttachedFileMeta {
                        name: f.name,
                        kind: f.kind,
                    })
                    .collect(),
            );
        }

        ComposedMessage {
            record,
            display_text: text.to_string(),
            attachment_names,
            has_image,
        }
    }
}
