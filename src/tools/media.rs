//! Gemini-backed multimodal tools - audio transcription and file analysis

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;
use url::Url;
use crate::Result;
use crate::agent::llm::{GeminiResponse, GEMINI_API_URL};
use crate::error::Error;
use super::{required_str, Tool};

const DEFAULT_ANALYSIS_PROMPT: &str =
    "Analyze this file and provide detailed information about its contents.";
const TRANSCRIBE_PROMPT: &str =
    "Transcribe this audio file. Return ONLY the transcribed text, nothing else.";

/// Lowercased extension (with dot) of the URL path, if any.
fn extension_of(file_url: &str) -> Option<String> {
    let path = Url::parse(file_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| file_url.to_string());
    let name = path.rsplit('/').next()?;
    let dot = name.rfind('.')?;
    Some(name[dot..].to_lowercase())
}

/// MIME type for an extension such as `.png`.
pub(crate) fn mime_type_for(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".pdf" => "application/pdf",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".mp4" => "video/mp4",
        ".avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Downloads a file and asks Gemini about it using inline data.
#[derive(Clone)]
pub struct GeminiMedia {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl GeminiMedia {
    pub fn new(client: Client, api_key: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn download(&self, file_url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(file_url).send().await
            .map_err(|e| Error::Tool(format!("Failed to download {}: {}", file_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error downloading {}: {}", file_url, status)));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Send `prompt` plus the downloaded file to Gemini and return its text.
    pub async fn ask(&self, file_url: &str, prompt: &str, mime_type: &str) -> Result<String> {
        let bytes = self.download(file_url).await?;
        info!("Sending {} bytes ({}) to {}", bytes.len(), mime_type, self.model);

        let request = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inlineData": {"mimeType": mime_type, "data": STANDARD.encode(&bytes)}}
                ]
            }]
        });

        let response = self.client
            .post(format!("{}/{}:generateContent", self.api_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tool(format!("Gemini API error {}: {}", status.as_u16(), body)));
        }

        let parsed: GeminiResponse = response.json().await?;
        parsed.first_texts()
            .first()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Error::Tool("Gemini returned no text".to_string()))
    }
}

/// Transcribe an audio file
pub struct TranscribeAudioTool {
    media: GeminiMedia,
}

impl TranscribeAudioTool {
    pub fn new(media: GeminiMedia) -> Self {
        Self { media }
    }
}

#[async_trait]
impl Tool for TranscribeAudioTool {
    fn name(&self) -> &str { "transcribe_audio" }
    fn description(&self) -> &str {
        "Transcribe an audio file (MP3, WAV, ...) from a URL using Gemini"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "audio_url": {
                    "type": "string",
                    "description": "Direct URL of the audio file"
                }
            },
            "required": ["audio_url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let audio_url = required_str(&params, "audio_url")?;
        let mime_type = match extension_of(audio_url).as_deref() {
            Some(".mp3") | None => "audio/mpeg",
            _ => "audio/wav",
        };

        self.media.ask(audio_url, TRANSCRIBE_PROMPT, mime_type).await
            .map_err(|e| Error::Tool(format!("Error transcribing audio: {}", e)))
    }
}

/// Analyze any file (image, PDF, audio, video) with Gemini
pub struct AnalyzeWithGeminiTool {
    media: GeminiMedia,
}

impl AnalyzeWithGeminiTool {
    pub fn new(media: GeminiMedia) -> Self {
        Self { media }
    }
}

#[async_trait]
impl Tool for AnalyzeWithGeminiTool {
    fn name(&self) -> &str { "analyze_with_gemini" }
    fn description(&self) -> &str {
        "Analyze an image, PDF, audio or video file from a URL using Gemini's multimodal model"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_url": {
                    "type": "string",
                    "description": "Direct URL of the file"
                },
                "prompt": {
                    "type": "string",
                    "description": "What you want to know about the file"
                },
                "file_type": {
                    "type": "string",
                    "description": "Extension hint such as .png or .pdf (auto-detected if omitted)"
                }
            },
            "required": ["file_url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let file_url = required_str(&params, "file_url")?;
        let prompt = params.get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT);
        let extension = params.get("file_type")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| extension_of(file_url))
            .unwrap_or_default();

        self.media.ask(file_url, prompt, mime_type_for(&extension)).await
            .map_err(|e| Error::Tool(format!("Error analyzing file with Gemini: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_extension_and_mime() {
        assert_eq!(extension_of("http://quiz.test/a/chart.PNG?v=2").as_deref(), Some(".png"));
        assert_eq!(extension_of("http://quiz.test/a/noext"), None);
        assert_eq!(mime_type_for(".jpeg"), "image/jpeg");
        assert_eq!(mime_type_for(".PDF"), "application/pdf");
        assert_eq!(mime_type_for(".xyz"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_analyze_sends_inline_data() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/chart.png")
            .with_status(200)
            .with_body("PNGDATA")
            .create_async()
            .await;
        let gemini = server.mock("POST", "/gemini-2.0-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "g-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"parts": [
                    {"text": "What is the total?"},
                    {"inlineData": {"mimeType": "image/png", "data": STANDARD.encode("PNGDATA")}}
                ]}]
            })))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":" 42 \n"}]}}]}"#)
            .create_async()
            .await;

        let media = GeminiMedia::new(Client::new(), "g-key", "gemini-2.0-flash").with_api_url(&server.url());
        let tool = AnalyzeWithGeminiTool::new(media);
        let result = tool.execute(json!({
            "file_url": format!("{}/chart.png", server.url()),
            "prompt": "What is the total?"
        })).await.unwrap();

        gemini.assert_async().await;
        assert_eq!(result, "42");
    }

    #[tokio::test]
    async fn test_transcribe_reports_download_failure() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/clip.mp3")
            .with_status(404)
            .create_async()
            .await;

        let media = GeminiMedia::new(Client::new(), "g-key", "gemini-2.0-flash").with_api_url(&server.url());
        let err = TranscribeAudioTool::new(media)
            .execute(json!({"audio_url": format!("{}/clip.mp3", server.url())}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Error transcribing audio"));
    }
}
