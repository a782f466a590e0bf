use crate::error_handling::types::ServiceError;

/// Extensions accepted for uploads and sample images, compared case-insensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Ceiling applied to every render factor handed to the engine. Bounds the
/// engine's memory use on a 4GB device whatever the configuration says.
pub const SAFE_MAX_RENDER_FACTOR: u32 = 20;

pub const MISSING_FILE_MESSAGE: &str = "No file uploaded";
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Only JPG, JPEG and PNG files are supported";

pub fn has_accepted_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Checks that an upload carries a filename with an accepted extension.
pub fn validate_filename(filename: Option<&str>) -> Result<&str, ServiceError> {
    match filename {
        None | Some("") => Err(ServiceError::Validation(MISSING_FILE_MESSAGE.to_string())),
        Some(name) if !has_accepted_extension(name) => {
            Err(ServiceError::Validation(UNSUPPORTED_TYPE_MESSAGE.to_string()))
        }
        Some(name) => Ok(name),
    }
}

pub fn clamp_render_factor(configured: u32) -> u32 {
    configured.min(SAFE_MAX_RENDER_FACTOR)
}
