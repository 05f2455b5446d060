pub mod openai;

pub use openai::OpenAiGateway;
