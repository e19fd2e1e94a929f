pub mod ask;
pub mod repl;
