pub mod llm;
pub mod suggest;
pub mod vision;
