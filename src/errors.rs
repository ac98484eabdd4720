// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the compositing engine, decoder adapters and player

use std::fmt;

/// Result type alias for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type alias for frame source / decoder operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type alias for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Shader pipeline stage an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Shader compile and link errors
///
/// All of these are fatal for the surface they occurred on.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// WGSL source failed to parse
    Parse { stage: ShaderStage, message: String },
    /// Module parsed but failed validation
    Validation { stage: ShaderStage, message: String },
    /// Required entry point is missing from the module
    MissingEntryPoint {
        stage: ShaderStage,
        name: &'static str,
    },
    /// Pipeline creation rejected the program (stage interfaces, layout, formats)
    Link(String),
}

/// Rendering errors
#[derive(Debug, Clone)]
pub enum RenderError {
    /// Native surface could not be wrapped
    SurfaceCreation(String),
    /// No adapter or device for the surface
    DeviceCreation(String),
    /// Shader program failed to compile or link
    Shader(ShaderError),
    /// Surface texture could not be acquired (lost, outdated, timeout)
    SurfaceLost(String),
    /// Packed frame could not be uploaded
    Upload(String),
    /// Operation called in the wrong lifecycle state
    InvalidState(&'static str),
}

/// Frame source and decoder errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Local media file does not exist
    NotFound(String),
    /// Location string could not be turned into a media URI
    InvalidLocation(String),
    /// Decoder pipeline could not be built or started
    Pipeline(String),
    /// Error reported by the decoder while running
    Decode(String),
    /// Source has been shut down
    Closed,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    Io(String),
    /// Config file is not valid JSON for `Config`
    Parse(String),
}

/// Player errors
#[derive(Debug, Clone)]
pub enum PlayerError {
    /// Rendering errors
    Render(RenderError),
    /// Decoder / source errors
    Source(SourceError),
    /// Configuration errors
    Config(ConfigError),
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Parse { stage, message } => {
                write!(f, "Failed to parse {} shader: {}", stage, message)
            }
            ShaderError::Validation { stage, message } => {
                write!(f, "Invalid {} shader: {}", stage, message)
            }
            ShaderError::MissingEntryPoint { stage, name } => {
                write!(f, "{} shader has no entry point '{}'", stage, name)
            }
            ShaderError::Link(msg) => write!(f, "Failed to link shader program: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::SurfaceCreation(msg) => write!(f, "Surface creation failed: {}", msg),
            RenderError::DeviceCreation(msg) => write!(f, "GPU device creation failed: {}", msg),
            RenderError::Shader(e) => write!(f, "Shader error: {}", e),
            RenderError::SurfaceLost(msg) => write!(f, "Surface unavailable: {}", msg),
            RenderError::Upload(msg) => write!(f, "Frame upload failed: {}", msg),
            RenderError::InvalidState(msg) => write!(f, "Invalid renderer state: {}", msg),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound(path) => write!(f, "File does not exist: {}", path),
            SourceError::InvalidLocation(loc) => write!(f, "Invalid media location: {}", loc),
            SourceError::Pipeline(msg) => write!(f, "Decoder pipeline error: {}", msg),
            SourceError::Decode(msg) => write!(f, "{}", msg),
            SourceError::Closed => write!(f, "Frame source closed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::Render(e) => write!(f, "Render error: {}", e),
            PlayerError::Source(e) => write!(f, "Source error: {}", e),
            PlayerError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ShaderError {}
impl std::error::Error for RenderError {}
impl std::error::Error for SourceError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for PlayerError {}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Shader(err)
    }
}

impl From<RenderError> for PlayerError {
    fn from(err: RenderError) -> Self {
        PlayerError::Render(err)
    }
}

impl From<SourceError> for PlayerError {
    fn from(err: SourceError) -> Self {
        PlayerError::Source(err)
    }
}

impl From<ConfigError> for PlayerError {
    fn from(err: ConfigError) -> Self {
        PlayerError::Config(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for SourceError {
    fn from(err: gstreamer::glib::Error) -> Self {
        SourceError::Pipeline(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for SourceError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        SourceError::Pipeline(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_error_wraps_into_render_error() {
        let err: RenderError = ShaderError::MissingEntryPoint {
            stage: ShaderStage::Fragment,
            name: "fs_main",
        }
        .into();
        assert!(matches!(err, RenderError::Shader(_)));
        assert_eq!(
            err.to_string(),
            "Shader error: fragment shader has no entry point 'fs_main'"
        );
    }

    #[test]
    fn test_decode_error_is_forwarded_verbatim() {
        let err = SourceError::Decode("Internal data stream error.".into());
        assert_eq!(err.to_string(), "Internal data stream error.");
    }
}
