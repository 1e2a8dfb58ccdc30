// Library surface of the cardrecon CLI: report parsers and the run pipeline.

pub mod parse;
pub mod pipeline;
