pub mod dispatcher;
pub mod nats;
pub mod outcome;
pub mod worker;

pub use dispatcher::*;
pub use nats::*;
pub use outcome::*;
pub use worker::*;
