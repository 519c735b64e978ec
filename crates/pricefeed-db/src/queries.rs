//! Database query functions organized by table.

pub mod history;
pub mod prices;
pub mod settings;
