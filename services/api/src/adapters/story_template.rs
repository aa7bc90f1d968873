//! services/api/src/adapters/story_template.rs
//!
//! The default story writer: fills a fixed template from the photo type, the
//! restoration steps applied so far and the user's optional hint.

use async_trait::async_trait;
use restoration_core::domain::{Operation, OperationCounts, PhotoKind};
use restoration_core::ports::{PortResult, StoryGenerationService, StoryRequest};

/// A deterministic `StoryGenerationService` that needs no external model.
#[derive(Debug, Clone, Default)]
pub struct TemplateStoryAdapter;

impl TemplateStoryAdapter {
    pub fn new() -> Self {
        Self
    }

    fn opening(kind: PhotoKind) -> &'static str {
        match kind {
            PhotoKind::Monochrome => {
                "This black-and-white photograph has waited a long time in an album, its edges softened by the years."
            }
            PhotoKind::Color => {
                "The colours in this photograph have faded the way summer afternoons do in memory."
            }
        }
    }

    fn steps(counts: &OperationCounts) -> Vec<String> {
        [Operation::Colorize, Operation::Upscale, Operation::Denoise]
            .into_iter()
            .filter_map(|op| {
                let n = counts.get(op);
                if n == 0 {
                    return None;
                }
                let what = match op {
                    Operation::Colorize => "colour returned to it",
                    Operation::Upscale => "its details sharpened",
                    _ => "the grain of old film smoothed away",
                };
                Some(if n == 1 {
                    what.to_string()
                } else {
                    format!("{} ({} passes)", what, n)
                })
            })
            .collect()
    }

    /// Renders the story text; pure so it can be tested without an executor.
    pub fn render(request: &StoryRequest<'_>) -> String {
        let mut story = String::from(Self::opening(request.photo_kind));

        let steps = Self::steps(&request.counts);
        story.push(' ');
        match steps.as_slice() {
            [] => story.push_str(
                "Even untouched, it holds a quiet moment that someone once decided was worth keeping.",
            ),
            [only] => story.push_str(&format!("Today it had {}.", only)),
            [init @ .., last] => {
                story.push_str(&format!("Today it had {} and {}.", init.join(", "), last))
            }
        }

        if let Some(hint) = request.hint.map(str::trim).filter(|h| !h.is_empty()) {
            story.push_str(&format!(
                " Looking closer, it feels like {}, a scene the people in it would surely recognise.",
                hint
            ));
        }

        story.push_str(" Whoever framed this shot could not have known it would be looked at again, this carefully, so many years later.");
        story
    }
}

#[async_trait]
impl StoryGenerationService for TemplateStoryAdapter {
    async fn generate_story(&self, request: StoryRequest<'_>) -> PortResult<String> {
        Ok(Self::render(&request))
    }
}
