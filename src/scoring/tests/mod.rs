mod common;
mod engine;
mod merge_fallbacks;
