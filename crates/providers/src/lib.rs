pub mod anthropic;
pub mod openrouter;
pub mod select;
pub mod sse;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use select::select_provider;
pub use sse::{aggregate, FrameFormat};
pub use traits::{CompletionRequest, LlmProvider, ProviderKind};
pub use util::read_credential;
