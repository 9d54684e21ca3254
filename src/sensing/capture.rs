use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::process::Command;

use crate::error::CaptureError;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Produces the current screen as a base64 PNG data URI.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn capture(&self) -> Result<String, CaptureError>;
}

/// A validated screenshot: the base64 payload handed to the classifier and
/// the decoded PNG bytes used for fingerprinting.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    encoded: String,
    bytes: Vec<u8>,
}

impl CapturedImage {
    /// Validates a `data:image/png;base64,` URI.
    pub fn from_data_uri(data_uri: &str) -> Result<Self, CaptureError> {
        if data_uri.is_empty() {
            return Err(CaptureError::Empty);
        }
        let payload = data_uri
            .strip_prefix(PNG_DATA_URI_PREFIX)
            .ok_or(CaptureError::NotPngDataUri)?;
        Self::from_base64(payload)
    }

    pub fn from_base64(payload: &str) -> Result<Self, CaptureError> {
        if payload.is_empty() {
            return Err(CaptureError::Empty);
        }
        let bytes = STANDARD.decode(payload)?;
        Ok(Self {
            encoded: payload.to_string(),
            bytes,
        })
    }

    pub fn from_png_bytes(bytes: Vec<u8>) -> Result<Self, CaptureError> {
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(Self {
            encoded: STANDARD.encode(&bytes),
            bytes,
        })
    }

    /// Base64 payload without the data URI prefix.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_data_uri(&self) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", self.encoded)
    }
}

/// Captures the screen by running an external program that writes a PNG to stdout,
/// e.g. `screencapture -x -t png /dev/stdout` or `grim -`.
pub struct CommandScreenshotSource {
    program: String,
    args: Vec<String>,
}

impl CommandScreenshotSource {
    /// Builds a source from an argv; `None` when the argv is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ScreenshotSource for CommandScreenshotSource {
    async fn capture(&self) -> Result<String, CaptureError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let image = CapturedImage::from_png_bytes(output.stdout)?;
        Ok(image.to_data_uri())
    }
}
