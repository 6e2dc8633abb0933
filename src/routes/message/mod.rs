mod handler;
mod model;

pub use handler::{contacts, conversation, send_message};
pub use model::{Message, SendMessageRequest};
