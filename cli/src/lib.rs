pub mod clonality_commands;
pub mod pipeline;
