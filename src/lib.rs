// Module naming follows project convention (capitalised layer modules)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Transport;
#[allow(non_snake_case)]
pub mod Messaging;
#[allow(non_snake_case)]
pub mod Xapp;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;
pub mod logging;

pub use config::XappConfig;
pub use error::{Result, XappError};
pub use Messaging::{CallbackInfo, Message, Messenger, MsgKey, SendKind, StopHandle};
pub use Transport::{Mbuf, MsgState, RingTransport};
pub use Xapp::XappBuilder;
