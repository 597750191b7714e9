pub mod conversation;
pub mod detector;
pub mod fallback;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod scraper;
pub mod text;

pub use conversation::{ConversationState, ConversationTurn};
pub use detector::{Detection, EntityDetector, Topic};
pub use fallback::FallbackResponder;
pub use pipeline::{ChatInput, ChatOutcome, ChatPipeline, ResponseOrigin};
pub use prompt::PromptAssembler;
pub use retrieval::{ContextSource, RetrievalOrchestrator, RetrievalOutcome};
pub use self::scraper::{PageScraper, SiteScraper};
