//! Conversation memory
//!
//! Not routed through the coordinator; the application layer records each
//! turn here after the LLM has answered.

pub mod embedding;
pub mod index;
pub mod store;
pub mod types;

pub use embedding::{cosine_similarity, EmbeddingService, HashEmbedding, VertexEmbedding};
pub use index::{InMemoryIndex, MatchingEngineIndex, VectorIndex};
pub use store::{datapoint_id, storage_key, MemoryStore, MAX_KEY_LEN};
pub use types::{ConversationEntry, Neighbor, Role, SummaryRecord};
