//! Integration tests for query-chat.

pub mod chat_flow_test;
pub mod http_gateway_test;
