//! Core data model: sessions, rules, flows, settings, and responses.
//!
//! These types carry no behavior beyond small helpers; the engine in
//! [`crate::engine`] is where they are interpreted.

pub mod flow;
pub mod response;
pub mod rule;
pub mod session;
pub mod settings;

pub use flow::{ConversationFlow, FlowOption, FlowStep, FlowStepType};
pub use response::{AgentResponse, ErrorCode, ResponseAction, ResponseMetadata, ResponseSource};
pub use rule::{KeywordRule, MatchType, ResponseType};
pub use session::{ActiveFlow, Message, Role, Session};
pub use settings::{AiConfig, BusinessHours, ChatbotSettings, DayOfWeek, DaySchedule, FallbackProvider};
