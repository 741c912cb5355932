//! Wire types for every dialect the gateway speaks.
//!
//! [`anthropic`] is the source dialect: what the client tool sends and what
//! every response must look like, regardless of which upstream served it.
//! [`openai`] is the common "chat" target family shared by most providers;
//! [`responses`] is the alternate envelope used by reasoning-class models on
//! dual-envelope providers.

pub mod anthropic;
pub mod openai;
pub mod responses;
