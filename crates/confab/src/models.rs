//! These models represent the objects passed around by the conversation loop
//!
//! There are a few related formats we need to interact with:
//! - anthropic messages/tools, sent over the wire to the LLM
//! - openai messages/tools, sent over the wire to the LLM
//! - tool invocations, sent to the functions held by the registry
//!
//! Wire data is converted into these internal structs immediately on
//! receipt, so the rest of the crate never sees a vendor format.
pub mod message;
pub mod tool;
