pub mod clock;
pub mod dir;
pub mod logging;
pub mod share;
pub mod time;
