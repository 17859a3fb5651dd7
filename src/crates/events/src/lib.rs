/// Events Layer
///
/// Independent event definition layer, providing:
/// - EventEmitter trait (event sending interface)
/// - Event name constants and payload shapes
/// - Event abstraction independent of platforms
pub mod emitter;
pub mod types;

pub use emitter::{EventEmitter, LoggingEmitter, NullEmitter};
pub use types::*;
