mod check;
mod upgrade;

pub use check::check_command;
pub use upgrade::upgrade_command;
