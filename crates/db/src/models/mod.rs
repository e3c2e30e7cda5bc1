pub mod ai_model;
pub mod character;
pub mod dialogue;
pub mod project;
pub mod prompt;
pub mod shot;
pub mod task;
