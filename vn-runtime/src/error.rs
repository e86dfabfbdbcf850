//! # Error 模块
//!
//! 定义 vn-runtime 中使用的错误类型。

use thiserror::Error;

/// 运行时错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// 脚本加载失败（读取或编译）
    #[error("无法加载脚本 '{name}'：{message}")]
    ScriptLoad { name: String, message: String },

    /// 脚本执行期间抛出的 Lua 错误
    #[error("脚本执行错误：{message}")]
    Script { message: String },

    /// 在不可恢复的状态下尝试恢复脚本线程
    ///
    /// 脚本已执行完毕、尚未开始或仍在主菜单时都会触发。
    #[error("无法恢复脚本线程：当前状态为 {state}")]
    InvalidScriptResume { state: String },

    /// 状态不匹配
    #[error("当前状态不允许此操作：期望 {expected}，实际 {actual}")]
    StateMismatch { expected: String, actual: String },

    /// 无效的选择索引（从 1 开始）
    #[error("无效的选择索引 {index}，有效范围是 1..={max}")]
    InvalidChoiceIndex { index: usize, max: usize },
}

impl RuntimeError {
    /// 从 Lua 错误构造脚本执行错误
    pub(crate) fn script(err: mlua::Error) -> Self {
        RuntimeError::Script {
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type VnResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::InvalidScriptResume {
            state: "End".to_string(),
        };
        assert!(err.to_string().contains("End"));

        let err = RuntimeError::InvalidChoiceIndex { index: 4, max: 3 };
        assert!(err.to_string().contains('4'));
        assert!(err.to_string().contains("1..=3"));
    }
}
