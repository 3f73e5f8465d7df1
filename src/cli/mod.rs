mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{OutputMode, run, run_with_writer};
pub use util::{parse_json_document, parse_json_documents, to_json_line};
