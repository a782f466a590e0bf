use std::convert::Infallible;
use std::sync::Arc;

use bytes::Buf;
use futures_util::TryStreamExt;
use log::{error, info, warn};
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::{reject, reply, Filter, Rejection, Reply};

use super::types::{ApiError, ColorizationResponse, StatusResponse};
use crate::colorization::validation::{validate_filename, MISSING_FILE_MESSAGE};
use crate::colorization::ColorizationService;
use crate::error_handling::types::ServiceError;
use crate::storage::{ResultArtifact, UploadedImage};

pub type SharedService = Arc<ColorizationService>;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Full API: liveness, sample self-test, upload and result retrieval.
pub fn routes(
    service: SharedService,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    health_route()
        .or(test_route(service.clone()))
        .or(colorize_route(service.clone(), max_upload_bytes))
        .or(results_route(service))
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("colorizer::http"))
}

fn with_service(
    service: SharedService,
) -> impl Filter<Extract = (SharedService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// GET /
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).map(|| {
        info!("Health check endpoint called");
        reply::json(&StatusResponse {
            status: "Colorizer API is live".to_string(),
        })
    })
}

/// GET /test
pub fn test_route(
    service: SharedService,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("test")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service))
        .and_then(|service: SharedService| async move {
            let outcome = service.colorize_sample().await;
            if let Err(e) = &outcome {
                error!("Test endpoint error: {}", e);
            }
            Ok::<_, Rejection>(colorization_reply(
                outcome,
                "Test image colorized successfully",
            ))
        })
}

/// POST /colorize
pub fn colorize_route(
    service: SharedService,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("colorize")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_service(service))
        .and_then(|form: FormData, service: SharedService| async move {
            let upload = match read_upload(form).await {
                Ok(upload) => upload,
                Err(e) => {
                    error!("No file uploaded: {}", e);
                    return Ok::<_, Rejection>(error_reply(&e));
                }
            };

            // Rejected here and again inside the service.
            if let Err(e) = validate_filename(upload.filename.as_deref()) {
                error!("Invalid file type: {:?}", upload.filename);
                return Ok(error_reply(&e));
            }

            let outcome = service.colorize_upload(upload).await;
            match &outcome {
                Ok(artifact) => info!("Colorization complete: {}", artifact.path.display()),
                Err(e) => error!("Colorization error: {}", e),
            }
            Ok(colorization_reply(outcome, "Image colorized successfully"))
        })
}

/// GET /results/:filename
pub fn results_route(
    service: SharedService,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("results" / String)
        .and(warp::get())
        .and(with_service(service))
        .and_then(|name: String, service: SharedService| async move {
            match service.result_bytes(&name) {
                Ok((path, bytes)) => {
                    let mime = mime_guess::from_path(&path).first_or_octet_stream();
                    Ok::<_, Rejection>(
                        reply::with_header(bytes, "Content-Type", mime.to_string())
                            .into_response(),
                    )
                }
                Err(e) => {
                    warn!("Result file not available: {} ({})", name, e);
                    Ok(error_reply(&e))
                }
            }
        })
}

/// Extracts the `file` part of a multipart upload.
async fn read_upload(form: FormData) -> Result<UploadedImage, ServiceError> {
    let invalid = |e: warp::Error| ServiceError::Validation(format!("Invalid multipart body: {}", e));
    let mut form = std::pin::pin!(form);

    while let Some(part) = form.try_next().await.map_err(invalid)? {
        if part.name() != UPLOAD_FIELD {
            continue;
        }
        let filename = part.filename().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(chunk.chunk());
                Ok(acc)
            })
            .await
            .map_err(invalid)?;

        return Ok(UploadedImage {
            filename,
            content_type,
            bytes,
        });
    }

    Err(ServiceError::Validation(MISSING_FILE_MESSAGE.to_string()))
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Storage(_) | ServiceError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(err: &ServiceError) -> reply::Response {
    reply::with_status(
        reply::json(&ApiError {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
        status_for(err),
    )
    .into_response()
}

fn colorization_reply(
    outcome: Result<ResultArtifact, ServiceError>,
    message: &str,
) -> reply::Response {
    match outcome {
        Ok(artifact) => reply::with_status(
            reply::json(&ColorizationResponse {
                output_path: artifact.url(),
                message: message.to_string(),
            }),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => error_reply(&e),
    }
}

/// Turns filter rejections into the same JSON error shape as handler failures.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Uploaded file is too large")
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length is required")
    } else {
        warn!("Rejected request: {:?}", err);
        (
            StatusCode::BAD_REQUEST,
            "Expected a multipart/form-data body with a file field",
        )
    };

    let kind = if status == StatusCode::NOT_FOUND {
        "not_found"
    } else {
        "validation"
    };
    Ok(reply::with_status(
        reply::json(&ApiError {
            error: message.to_string(),
            kind: kind.to_string(),
        }),
        status,
    )
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorization::service::ServiceOptions;
    use crate::configuration::{ModelVariant, SampleOrder, StagingRetention};
    use crate::engine::{shared, BuiltinEngine};
    use crate::storage::ArtifactStore;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;
    use tempfile::TempDir;

    const BOUNDARY: &str = "colorizer-test-boundary";

    struct Fixture {
        dir: TempDir,
        service: SharedService,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let weights = dir.path().join("ColorizeArtistic_gen.pth");
            std::fs::write(&weights, b"weights").unwrap();
            let store =
                ArtifactStore::new(dir.path().join("temp"), dir.path().join("outputs")).unwrap();
            let engine =
                BuiltinEngine::new(ModelVariant::Artistic, &weights, store.clone()).unwrap();
            let options = ServiceOptions {
                default_render_factor: 35,
                staging_retention: StagingRetention::Keep,
                sample_dir: dir.path().join("test_images"),
                sample_order: SampleOrder::Lexicographic,
            };
            let service = Arc::new(ColorizationService::new(
                store,
                shared(Box::new(engine)),
                options,
            ));
            Self { dir, service }
        }

        fn api(&self, max_upload_bytes: u64) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
            routes(self.service.clone(), max_upload_bytes)
        }

        fn count(&self, sub: &str) -> usize {
            std::fs::read_dir(self.dir.path().join(sub)).unwrap().count()
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = GrayImage::from_fn(10, 10, |x, y| Luma([(x * 25 + y * 3) as u8]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn multipart(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post_colorize(body: Vec<u8>) -> warp::test::RequestBuilder {
        warp::test::request()
            .method("POST")
            .path("/colorize")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
    }

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::new();
        let res = warp::test::request().path("/").reply(&fx.api(1024)).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: StatusResponse = serde_json::from_slice(res.body()).unwrap();
        assert!(body.status.contains("live"));
    }

    #[tokio::test]
    async fn test_upload_then_fetch_result() {
        let fx = Fixture::new();
        let api = fx.api(1024 * 1024);
        let input = png_bytes();

        let res = post_colorize(multipart("file", "a.png", &input))
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: ColorizationResponse = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.message, "Image colorized successfully");
        let pattern = regex::Regex::new(r"^/results/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.png$").unwrap();
        assert!(pattern.is_match(&body.output_path), "{}", body.output_path);

        let fetched = warp::test::request().path(&body.output_path).reply(&api).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(fetched.headers()["content-type"], "image/png");
        assert!(!fetched.body().is_empty());
        assert_ne!(fetched.body().as_ref(), input.as_slice());
        let decoded = image::load_from_memory(fetched.body()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected_without_side_effects() {
        let fx = Fixture::new();

        let res = post_colorize(multipart("file", "a.txt", b"hello"))
            .reply(&fx.api(1024))
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = serde_json::from_slice(res.body()).unwrap();
        assert!(body.error.contains("PNG"));
        assert_eq!(body.kind, "validation");
        assert_eq!(fx.count("temp"), 0);
        assert_eq!(fx.count("outputs"), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let fx = Fixture::new();

        let res = post_colorize(multipart("picture", "a.png", &png_bytes()))
            .reply(&fx.api(1024 * 1024))
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.error, MISSING_FILE_MESSAGE);
    }

    #[tokio::test]
    async fn test_oversized_upload() {
        let fx = Fixture::new();

        let res = post_colorize(multipart("file", "a.png", &[0u8; 4096]))
            .reply(&fx.api(512))
            .await;

        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(fx.count("temp"), 0);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_server_error() {
        let fx = Fixture::new();

        let res = post_colorize(multipart("file", "a.png", b"not really a png"))
            .reply(&fx.api(1024))
            .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ApiError = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.kind, "processing");
        assert!(body.error.starts_with("Image colorization failed"));
        assert_eq!(fx.count("outputs"), 0);
    }

    #[tokio::test]
    async fn test_oversized_dimensions_are_processing_error() {
        let fx = Fixture::new();
        let wide = GrayImage::new(crate::engine::builtin::MAX_IMAGE_SIDE + 1, 1);
        let mut encoded = Cursor::new(Vec::new());
        wide.write_to(&mut encoded, ImageFormat::Png).unwrap();

        let res = post_colorize(multipart("file", "wide.png", encoded.get_ref()))
            .reply(&fx.api(1024 * 1024))
            .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ApiError = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.kind, "processing");
        assert_eq!(fx.count("outputs"), 0);
    }

    #[tokio::test]
    async fn test_missing_and_traversing_results_are_not_found() {
        let fx = Fixture::new();
        std::fs::write(fx.dir.path().join("secret.txt"), b"secret").unwrap();
        let api = fx.api(1024);

        for path in [
            "/results/missing.png",
            "/results/..%2Fsecret.txt",
            "/results/%2E%2E",
            "/results/../secret.txt",
        ] {
            let res = warp::test::request().path(path).reply(&api).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_sample_endpoint_without_images() {
        let fx = Fixture::new();

        let res = warp::test::request().path("/test").reply(&fx.api(1024)).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: ApiError = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.kind, "not_found");
        assert!(fx.dir.path().join("test_images").is_dir());
    }

    #[tokio::test]
    async fn test_sample_endpoint_colorizes_first_image() {
        let fx = Fixture::new();
        let samples = fx.dir.path().join("test_images");
        std::fs::create_dir_all(&samples).unwrap();
        std::fs::write(samples.join("old_photo.png"), png_bytes()).unwrap();
        let api = fx.api(1024);

        let res = warp::test::request().path("/test").reply(&api).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: ColorizationResponse = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.message, "Test image colorized successfully");
        let fetched = warp::test::request().path(&body.output_path).reply(&api).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(fx.count("temp"), 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let fx = Fixture::new();

        let res = warp::test::request().path("/nope").reply(&fx.api(1024)).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
