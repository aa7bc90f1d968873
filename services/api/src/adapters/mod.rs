pub mod filters;
pub mod kakao;
pub mod memory_store;
pub mod story_llm;
pub mod story_template;

pub use filters::PlaceholderFilters;
pub use kakao::KakaoOAuthAdapter;
pub use memory_store::InMemorySessionStore;
pub use story_llm::OpenAiStoryAdapter;
pub use story_template::TemplateStoryAdapter;
