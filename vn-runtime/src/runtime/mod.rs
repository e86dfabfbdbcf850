//! # Runtime 模块
//!
//! 叙事状态机：驱动脚本线程，并把脚本状态与玩家输入同步。
//!
//! ## 模块结构
//!
//! - [`engine`]：核心执行引擎

pub mod engine;

pub use engine::VNRuntime;
