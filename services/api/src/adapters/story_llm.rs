//! services/api/src/adapters/story_llm.rs
//!
//! This module contains the adapter for the vision-language story writer.
//! It implements the `StoryGenerationService` port from the `core` crate by sending
//! the current image to an OpenAI-compatible chat model.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use restoration_core::domain::PhotoKind;
use restoration_core::ports::{PortError, PortResult, StoryGenerationService, StoryRequest};

const SYSTEM_INSTRUCTIONS: &str = "You write short, warm stories about restored family photographs. \
Describe only what is visible in the picture, stay factual and avoid exaggeration. \
Answer in two or three sentences.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StoryGenerationService` using an OpenAI vision model.
#[derive(Clone)]
pub struct OpenAiStoryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiStoryAdapter {
    /// Creates a new `OpenAiStoryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// The user-facing prompt, including the optional hint and the steps applied.
    fn prompt(request: &StoryRequest<'_>) -> String {
        let kind = match request.photo_kind {
            PhotoKind::Monochrome => "an old black-and-white photo",
            PhotoKind::Color => "an old colour photo",
        };
        let mut prompt = format!(
            "This is {} after restoration (colorized {}x, upscaled {}x, denoised {}x). \
             Tell its story.",
            kind, request.counts.colorize, request.counts.upscale, request.counts.denoise
        );
        if let Some(hint) = request.hint.map(str::trim).filter(|h| !h.is_empty()) {
            prompt.push_str(&format!(" (Hint from the owner: {})", hint));
        }
        prompt
    }

    fn data_url(image: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(image))
    }
}

//=========================================================================================
// `StoryGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoryGenerationService for OpenAiStoryAdapter {
    /// Sends the image and prompt to the model and returns its answer.
    async fn generate_story(&self, request: StoryRequest<'_>) -> PortResult<String> {
        let to_port = |e: OpenAIError| PortError::Unexpected(e.to_string());

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(Self::data_url(request.image))
                    .detail(ImageDetail::Low)
                    .build()
                    .map_err(to_port)?,
            )
            .build()
            .map_err(to_port)?;
        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(Self::prompt(&request))
            .build()
            .map_err(to_port)?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(to_port)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(vec![
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
                    ChatCompletionRequestUserMessageContentPart::Text(text_part),
                ]))
                .build()
                .map_err(to_port)?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(200u32)
            .n(1)
            .build()
            .map_err(to_port)?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(to_port)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Story model returned no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restoration_core::domain::OperationCounts;

    #[test]
    fn test_prompt_mentions_steps_and_hint() {
        let request = StoryRequest {
            image: &[],
            photo_kind: PhotoKind::Color,
            counts: OperationCounts {
                colorize: 0,
                upscale: 2,
                denoise: 1,
                story: 0,
            },
            hint: Some(" 1990s, seaside "),
        };
        let prompt = OpenAiStoryAdapter::prompt(&request);

        assert!(prompt.starts_with("This is an old colour photo"));
        assert!(prompt.contains("upscaled 2x"));
        assert!(prompt.ends_with("(Hint from the owner: 1990s, seaside)"));
    }

    #[test]
    fn test_data_url_is_png_base64() {
        let url = OpenAiStoryAdapter::data_url(&[0x89, b'P', b'N', b'G']);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }
}
