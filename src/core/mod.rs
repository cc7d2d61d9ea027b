mod parser;
mod recoder;
mod runloops;
pub use parser::Checker;
pub use recoder::build_log_config;
pub use runloops::run;
