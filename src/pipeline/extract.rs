//! Extraction Stage: image bytes → [`ExtractionResult`] via the vision model.
//!
//! Always returns a result. A service failure or an empty reply produces a
//! zero-confidence placeholder with the matching method tag instead of an
//! error; downstream stages treat the text as authoritative regardless.

use tracing::{info, warn};

use crate::client::{ChatClient, ChatRequest};
use crate::config::PipelineConfig;
use crate::model::ExtractionResult;
use crate::pipeline::encode;
use crate::prompts::EXTRACTION_PROMPT;

/// Confidence reported for a successful vision extraction.
const VISION_OCR_CONFIDENCE: f64 = 0.9;

/// Run OCR over the image bytes.
pub async fn extract(
    vision: &dyn ChatClient,
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> ExtractionResult {
    if image_bytes.is_empty() {
        warn!("no image bytes to extract from");
        return ExtractionResult::placeholder("No text extracted from image", "ocr_no_text");
    }

    let request = ChatRequest {
        system: None,
        user_text: EXTRACTION_PROMPT.to_string(),
        image: Some(encode::to_attachment(image_bytes)),
        temperature: config.extraction_temperature,
        max_tokens: config.extraction_max_tokens,
    };

    match vision.chat(request).await {
        Ok(reply) => {
            let text = reply.trim();
            if text.is_empty() {
                warn!(client = vision.name(), "vision model returned no text");
                return ExtractionResult::placeholder(
                    "No text extracted from image",
                    "ocr_no_text",
                );
            }
            info!(
                client = vision.name(),
                chars = text.len(),
                "extraction succeeded"
            );
            ExtractionResult {
                text: text.to_string(),
                notation: None,
                confidence: VISION_OCR_CONFIDENCE,
                method: "vision_ocr".to_string(),
            }
        }
        Err(e) => {
            warn!(client = vision.name(), error = %e, "extraction failed");
            ExtractionResult::placeholder("OCR processing failed", "ocr_error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, ClientError>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<String, ClientError>) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatClient for Scripted {
        fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>> {
            self.seen.lock().unwrap().push(request);
            let out = self.reply.clone();
            Box::pin(async move { out })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nimage-data";

    #[tokio::test]
    async fn successful_extraction_reports_vision_ocr() {
        let client = Scripted::new(Ok("x^2 + 2x + 1 = 0".into()));
        let result = extract(&client, PNG, &PipelineConfig::default()).await;
        assert_eq!(result.text, "x^2 + 2x + 1 = 0");
        assert_eq!(result.method, "vision_ocr");
        assert!((result.confidence - 0.9).abs() < f64::EPSILON);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].image.is_some());
        assert!(seen[0].user_text.contains("verbatim"));
    }

    #[tokio::test]
    async fn blank_reply_becomes_no_text_placeholder() {
        let client = Scripted::new(Ok("   \n".into()));
        let result = extract(&client, PNG, &PipelineConfig::default()).await;
        assert_eq!(result.text, "No text extracted from image");
        assert_eq!(result.method, "ocr_no_text");
        assert!((result.confidence - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn service_failure_becomes_error_placeholder() {
        let client = Scripted::new(Err(ClientError::Timeout { secs: 60 }));
        let result = extract(&client, PNG, &PipelineConfig::default()).await;
        assert_eq!(result.text, "OCR processing failed");
        assert_eq!(result.method, "ocr_error");
        assert!((result.confidence - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_bytes_never_reach_the_client() {
        let client = Scripted::new(Ok("should not be called".into()));
        let result = extract(&client, &[], &PipelineConfig::default()).await;
        assert_eq!(result.method, "ocr_no_text");
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
