pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod exception;
pub mod factory;
pub mod handlers;
pub mod identity;
pub mod param;
pub mod render;
pub mod request;
pub mod resources;
pub mod response;
pub mod store;
pub mod target;
pub mod util;

pub use auth::{AccessPolicy, Authenticator, BasicAuthenticator, WebUser};
pub use cache::{ExpiryPolicy, NeverExpire, ResponseCache, TimeToLive};
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use exception::{AuthFailure, Exception, FailReason, GenerationError, WebException};
pub use factory::ResponseFactory;
pub use handlers::PageHandler;
pub use identity::{PageKind, ResourceIdentity};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use store::{Database, MemoryDatabase, StoreState, UuidResolver};
pub use target::RequestTarget;
pub use util::HtmlBuilder;
