//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod configured_session_token_provider;
mod http_org_rest_transport;
mod in_memory_org;

pub use configured_session_token_provider::ConfiguredSessionTokenProvider;
pub use http_org_rest_transport::HttpOrgRestTransport;
pub use in_memory_org::InMemoryOrg;
