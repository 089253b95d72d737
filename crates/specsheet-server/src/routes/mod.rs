pub mod consent;
pub mod drive;
pub mod email;
pub mod generate;
pub mod meta;
pub mod search;
pub mod specs;
