#[path = "core/error.rs"]
pub mod error;
#[path = "render/encoding.rs"]
pub mod encoding;
#[path = "core/logging.rs"]
pub mod logging;
pub mod prelude;
pub mod runtime;
#[path = "render/viewport.rs"]
pub mod viewport;

pub use error::RemoteError;
pub use runtime::dispatcher::Dispatcher;
pub use runtime::web_api::WebApi;
