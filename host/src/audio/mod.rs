//! # Audio 模块
//!
//! 音频适配层。Runtime 发出的音频指令对核心而言是“发出即忘”的：
//! 播放 / 停止 / 暂停 / 继续音乐，播放一次性音效。
//!
//! ## 实现
//!
//! - [`SilentAudio`]：只记录日志与状态，默认实现
//! - [`RecordingAudio`]：记录调用序列，用于测试
//! - `AudioManager`：基于 rodio 的实际播放（需启用 `rodio-audio` feature）

#[cfg(feature = "rodio-audio")]
mod rodio_backend;

#[cfg(feature = "rodio-audio")]
pub use rodio_backend::AudioManager;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};
use vn_runtime::Command;

/// 音频适配器
pub trait AudioBackend {
    /// 播放音乐；若已有音乐在播放，先停止
    fn play_music(&mut self, path: &str, looping: bool);
    fn stop_music(&mut self);
    fn pause_music(&mut self);
    fn resume_music(&mut self);
    /// 播放一次性音效
    fn play_sound(&mut self, path: &str);
}

/// 把音频类指令转发给适配器
///
/// 返回该指令是否为音频指令。
pub fn execute_audio_command(audio: &mut dyn AudioBackend, cmd: &Command) -> bool {
    match cmd {
        Command::PlayMusic { path, looping } => audio.play_music(path, *looping),
        Command::StopMusic => audio.stop_music(),
        Command::PauseMusic => audio.pause_music(),
        Command::ResumeMusic => audio.resume_music(),
        Command::PlaySound { path } => audio.play_sound(path),
        _ => return false,
    }
    true
}

/// 不输出声音的音频实现
#[derive(Debug, Default)]
pub struct SilentAudio {
    current_music: Option<String>,
    paused: bool,
}

impl SilentAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_music(&self) -> Option<&str> {
        self.current_music.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl AudioBackend for SilentAudio {
    fn play_music(&mut self, path: &str, looping: bool) {
        if let Some(old) = self.current_music.take() {
            debug!(path = %old, "停止当前音乐");
        }
        info!(path = %path, looping, "播放音乐（静音）");
        self.current_music = Some(path.to_string());
        self.paused = false;
    }

    fn stop_music(&mut self) {
        if let Some(old) = self.current_music.take() {
            info!(path = %old, "停止音乐");
        }
        self.paused = false;
    }

    fn pause_music(&mut self) {
        if self.current_music.is_some() && !self.paused {
            debug!("暂停音乐");
            self.paused = true;
        }
    }

    fn resume_music(&mut self) {
        if self.current_music.is_some() && self.paused {
            debug!("继续音乐");
            self.paused = false;
        }
    }

    fn play_sound(&mut self, path: &str) {
        debug!(path = %path, "播放音效（静音）");
    }
}

/// 一次音频调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    PlayMusic { path: String, looping: bool },
    StopMusic,
    PauseMusic,
    ResumeMusic,
    PlaySound { path: String },
}

/// 记录所有调用的音频实现
///
/// 克隆体共享同一份记录，交给 App 后仍可在外部检查。
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    calls: Rc<RefCell<Vec<AudioCall>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: AudioCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl AudioBackend for RecordingAudio {
    fn play_music(&mut self, path: &str, looping: bool) {
        self.record(AudioCall::PlayMusic {
            path: path.to_string(),
            looping,
        });
    }

    fn stop_music(&mut self) {
        self.record(AudioCall::StopMusic);
    }

    fn pause_music(&mut self) {
        self.record(AudioCall::PauseMusic);
    }

    fn resume_music(&mut self) {
        self.record(AudioCall::ResumeMusic);
    }

    fn play_sound(&mut self, path: &str) {
        self.record(AudioCall::PlaySound {
            path: path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_audio_state() {
        let mut audio = SilentAudio::new();
        audio.pause_music();
        assert!(!audio.is_paused());

        audio.play_music("a.ogg", true);
        audio.play_music("b.ogg", false);
        assert_eq!(audio.current_music(), Some("b.ogg"));

        audio.pause_music();
        assert!(audio.is_paused());
        audio.resume_music();
        assert!(!audio.is_paused());

        audio.stop_music();
        assert_eq!(audio.current_music(), None);
        audio.resume_music();
        assert!(!audio.is_paused());
    }

    #[test]
    fn test_execute_audio_command() {
        let recorder = RecordingAudio::new();
        let mut audio = recorder.clone();

        assert!(execute_audio_command(
            &mut audio,
            &Command::PlayMusic {
                path: "bgm.ogg".to_string(),
                looping: true,
            }
        ));
        assert!(execute_audio_command(&mut audio, &Command::PauseMusic));
        assert!(!execute_audio_command(
            &mut audio,
            &Command::Narrate {
                text: "x".to_string(),
                style: Default::default(),
            }
        ));

        assert_eq!(
            recorder.calls(),
            vec![
                AudioCall::PlayMusic {
                    path: "bgm.ogg".to_string(),
                    looping: true,
                },
                AudioCall::PauseMusic,
            ]
        );
    }
}
