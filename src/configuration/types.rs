use clap::ValueEnum;
use serde::Deserialize;

/// Pretrained weight set loaded by the engine.
#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Artistic,
    Stable,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Artistic => "artistic",
            ModelVariant::Stable => "stable",
        }
    }

    /// File name of the generator weights for this variant.
    pub fn model_file(&self) -> &'static str {
        match self {
            ModelVariant::Artistic => "ColorizeArtistic_gen.pth",
            ModelVariant::Stable => "ColorizeStable_gen.pth",
        }
    }

    /// Render factor used when none is configured.
    pub fn default_render_factor(&self) -> u32 {
        match self {
            ModelVariant::Artistic => 25,
            ModelVariant::Stable => 21,
        }
    }
}

/// What happens to a staged upload once the engine call has finished.
#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingRetention {
    Keep,
    Delete,
}

/// How the sample image is picked among the files of the sample directory.
#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOrder {
    /// Smallest file name first.
    Lexicographic,
    /// Whatever order the directory enumeration yields.
    Listing,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Builtin,
    External,
}
