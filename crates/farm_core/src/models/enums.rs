//! Core enums used throughout the client.

use serde::{Deserialize, Serialize};

/// Kind of render job. At most one job of each kind runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// A single frame, rendered as N independent samples and averaged.
    Image,
    /// A frame range, one output file per frame.
    Animation,
}

impl JobKind {
    /// Registry key for this kind.
    pub fn key(&self) -> &'static str {
        match self {
            JobKind::Image => "image",
            JobKind::Animation => "animation",
        }
    }

    /// The opposing kind (cleared whenever a job of this kind starts).
    pub fn other(&self) -> JobKind {
        match self {
            JobKind::Image => JobKind::Animation,
            JobKind::Animation => JobKind::Image,
        }
    }

    /// Human label used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Image => "current frame",
            JobKind::Animation => "animation",
        }
    }

    pub fn all() -> &'static [JobKind] {
        &[JobKind::Image, JobKind::Animation]
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Status of the current job of one kind, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderStatus {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "Preparing files...")]
    Preparing,
    #[serde(rename = "Rendering...")]
    Rendering,
    #[serde(rename = "Finishing...")]
    Finishing,
    #[serde(rename = "Complete!")]
    Complete,
    #[serde(rename = "Partial completion")]
    Partial,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "ERROR")]
    Error,
}

impl RenderStatus {
    /// Display string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Preparing => "Preparing files...",
            Self::Rendering => "Rendering...",
            Self::Finishing => "Finishing...",
            Self::Complete => "Complete!",
            Self::Partial => "Partial completion",
            Self::Cancelled => "Cancelled",
            Self::Error => "ERROR",
        }
    }

    /// Whether a job in this status is still non-terminal.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Preparing | Self::Rendering | Self::Finishing)
    }
}

impl std::fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity attached to validation results and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Render engine family of the scene being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Stochastic path tracer; single frames can be split into samples.
    #[default]
    Sampling,
    /// Deterministic rasterizer; samples cannot be averaged.
    Raster,
}

impl RenderEngine {
    pub fn is_sampling(&self) -> bool {
        matches!(self, RenderEngine::Sampling)
    }
}

/// Output file format configured in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputFormat {
    Bmp,
    #[default]
    Png,
    Targa,
    Jpeg,
    #[serde(rename = "JPEG2000")]
    Jpeg2000,
    Tiff,
    Iris,
    Cineon,
    Hdr,
    Dpx,
    OpenExr,
    OpenExrMultilayer,
    AviJpeg,
    AviRaw,
    #[serde(rename = "FRAMESERVER")]
    FrameServer,
    H264,
    Ffmpeg,
    Theora,
    #[serde(rename = "QUICKTIME")]
    QuickTime,
    Xvid,
}

impl OutputFormat {
    /// Movie containers produce one file for the whole range and cannot be
    /// assembled from per-frame results.
    pub fn is_movie(&self) -> bool {
        matches!(
            self,
            Self::AviJpeg
                | Self::AviRaw
                | Self::FrameServer
                | Self::H264
                | Self::Ffmpeg
                | Self::Theora
                | Self::QuickTime
                | Self::Xvid
        )
    }

    /// Formats whose samples can be decoded and averaged for image jobs.
    pub fn supports_averaging(&self) -> bool {
        matches!(
            self,
            Self::Bmp | Self::Png | Self::Targa | Self::Jpeg | Self::Tiff
        )
    }

    /// File extension (without dot) written by the renderer.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Png => "png",
            Self::Targa => "tga",
            Self::Jpeg => "jpg",
            Self::Jpeg2000 => "jp2",
            Self::Tiff => "tif",
            Self::Iris => "rgb",
            Self::Cineon => "cin",
            Self::Hdr => "hdr",
            Self::Dpx => "dpx",
            Self::OpenExr | Self::OpenExrMultilayer => "exr",
            Self::AviJpeg | Self::AviRaw => "avi",
            Self::FrameServer => "",
            Self::H264 | Self::Ffmpeg | Self::Xvid => "mkv",
            Self::Theora => "ogv",
            Self::QuickTime => "mov",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_display() {
        assert_eq!(RenderStatus::Preparing.to_string(), "Preparing files...");
        assert_eq!(RenderStatus::Complete.as_str(), "Complete!");
        assert_eq!(RenderStatus::Error.as_str(), "ERROR");
    }

    #[test]
    fn running_statuses() {
        assert!(RenderStatus::Rendering.is_running());
        assert!(RenderStatus::Finishing.is_running());
        assert!(!RenderStatus::Cancelled.is_running());
        assert!(!RenderStatus::None.is_running());
    }

    #[test]
    fn kinds_oppose_each_other() {
        assert_eq!(JobKind::Image.other(), JobKind::Animation);
        assert_eq!(JobKind::Animation.other(), JobKind::Image);
    }

    #[test]
    fn output_format_uses_scene_names() {
        let fmt: OutputFormat = serde_json::from_str("\"QUICKTIME\"").unwrap();
        assert!(fmt.is_movie());
        let fmt: OutputFormat = serde_json::from_str("\"OPEN_EXR\"").unwrap();
        assert!(!fmt.is_movie());
        assert!(!fmt.supports_averaging());
        assert_eq!(OutputFormat::Targa.extension(), "tga");
    }
}
