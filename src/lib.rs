pub mod cli;
pub mod extractor;
pub mod infra;
pub mod llm;
pub mod prompts;
