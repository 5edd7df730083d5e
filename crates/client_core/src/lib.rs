//! Client-side orchestration for the ATT&CK ↔ NIST mapper: debounced lookups,
//! the password/MFA audit form and the chat session, all talking to the
//! mapper API through a [`QueryTransport`].

pub mod audit;
pub mod chat;
pub mod debounce;
pub mod error;
pub mod generation;
pub mod lookup;
pub mod render;
pub mod transport;

pub use audit::{submit_audit, AuditFormModel, AuditSnapshot};
pub use chat::{input_style, placeholder, ChatSession, ChatSnapshot, InputStyle};
pub use debounce::Debouncer;
pub use error::QueryError;
pub use generation::{GenerationGuard, GenerationToken};
pub use lookup::{
    qualifying_query, LookupController, LookupEvent, LookupPhase, LookupSnapshot,
    DEFAULT_DEBOUNCE,
};
pub use render::{dispatch, render_audit, render_lookup, ChatView};
pub use transport::{fetch_json, QueryClient, QueryMethod, QueryRequest, QueryTransport};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
