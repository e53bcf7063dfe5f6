pub use crate::error::RemoteError;
pub use crate::logging::init_logger;
pub use crate::logging::{debug, error, info, trace, warn};
pub use crate::runtime::capture::{CaptureParams, CapturePhase};
pub use crate::runtime::command_queue::ScriptExecutor;
pub use crate::runtime::dispatcher::{Dispatcher, Landing};
pub use crate::runtime::log_buffer::{LogEntry, Severity};
pub use crate::runtime::settings::RemoteSettings;
pub use crate::runtime::web_api::WebApi;
pub use crate::viewport::{FramebufferOrigin, Viewport};
