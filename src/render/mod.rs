//! Document rendering: one paginated PDF per message.

pub mod pdf;
