//! 音频命令处理

use tracing::{debug, info, warn};
use vn_runtime::Command;

use super::super::AppState;
use crate::audio::{AudioBackend, SilentAudio, execute_audio_command};
use crate::config::AppConfig;
use crate::render::RenderBackend;

/// 处理音频命令
///
/// 返回该指令是否为音频指令。
pub fn handle_audio_command<B: RenderBackend>(app: &mut AppState<B>, cmd: &Command) -> bool {
    let handled = execute_audio_command(app.audio.as_mut(), cmd);
    if handled {
        debug!(command = ?cmd, "音频指令");
    }
    handled
}

/// 按配置创建音频后端
///
/// 静音或未启用 `rodio-audio` feature 时使用 [`SilentAudio`]；
/// 音频设备初始化失败同样回退到静音实现。
pub fn create_audio(config: &AppConfig) -> Box<dyn AudioBackend> {
    if config.audio.muted {
        info!("音频已静音");
        return Box::new(SilentAudio::new());
    }

    #[cfg(feature = "rodio-audio")]
    {
        match crate::audio::AudioManager::new(&config.assets_root) {
            Ok(am) => {
                info!("音频系统初始化成功");
                return Box::new(am);
            }
            Err(e) => {
                warn!(error = %e, "音频系统初始化失败，使用静音输出");
            }
        }
    }

    #[cfg(not(feature = "rodio-audio"))]
    warn!("未启用 rodio-audio，使用静音输出");

    Box::new(SilentAudio::new())
}
