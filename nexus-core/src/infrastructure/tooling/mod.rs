mod error;
#[cfg(feature = "http-gateways")]
mod http;
mod interface;
mod retry;

pub use error::ToolInvokeError;
#[cfg(feature = "http-gateways")]
pub use http::HttpToolGateway;
pub use interface::{ToolGateway, ToolResponse};
pub use retry::{RETRYABLE_PATTERNS, RetryPolicy, invoke_with_retry, is_retryable};
