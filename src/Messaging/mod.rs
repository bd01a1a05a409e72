pub mod callback;
pub mod default_cb;
pub mod message;
pub mod messenger;

pub use callback::{Callback, CallbackInfo, CallbackRegistry, Handler, MsgKey};
pub use default_cb::{HEALTH_CHECK_REQ, HEALTH_CHECK_RESP};
pub use message::{Message, SendKind};
pub use messenger::{ListenerState, Messenger, StopHandle};
