pub mod clock;
pub mod reminder;
