//! Library half of the `elementkit` binary, split out so commands can be
//! driven from tests.

pub mod commands;
pub mod error;
pub mod logging;
pub mod router;
