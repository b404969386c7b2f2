//! Pipewright - a sandboxed script execution engine and the pipeline that
//! drives generated scripts from page rendering to answer submission.

pub mod build_info;
pub mod config;
pub mod fs_util;
pub mod generate;
pub mod handlers;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod sandbox;
pub mod server;
pub mod store;
pub mod submit;
