//! 基于 rodio 的音频播放

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{error, info, warn};

use super::AudioBackend;

/// 音频管理器
///
/// 同一时间只有一首音乐；音效直接混入输出流。
pub struct AudioManager {
    /// 音频输出流（必须保持存活）
    stream: OutputStream,
    music: Option<Sink>,
    current_music: Option<String>,
    base_path: PathBuf,
}

impl AudioManager {
    /// 打开默认输出设备
    pub fn new(base_path: &Path) -> Result<Self, String> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| format!("无法初始化音频输出: {e}"))?;
        Ok(Self {
            stream,
            music: None,
            current_music: None,
            base_path: base_path.to_path_buf(),
        })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_path.join(p)
        }
    }

    fn decode(&self, path: &str) -> Option<Decoder<BufReader<File>>> {
        let full_path = self.resolve_path(path);
        let file = match File::open(&full_path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %full_path.display(), error = %e, "无法打开音频文件");
                return None;
            }
        };
        match Decoder::new(BufReader::new(file)) {
            Ok(source) => Some(source),
            Err(e) => {
                error!(path = %full_path.display(), error = %e, "无法解码音频文件");
                None
            }
        }
    }
}

impl AudioBackend for AudioManager {
    fn play_music(&mut self, path: &str, looping: bool) {
        self.stop_music();

        let Some(source) = self.decode(path) else {
            return;
        };
        let sink = Sink::connect_new(self.stream.mixer());
        if looping {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }
        self.music = Some(sink);
        self.current_music = Some(path.to_string());
        info!(path = %path, looping, "开始播放音乐");
    }

    fn stop_music(&mut self) {
        if let Some(sink) = self.music.take() {
            sink.stop();
            info!(path = ?self.current_music, "音乐已停止");
        }
        self.current_music = None;
    }

    fn pause_music(&mut self) {
        if let Some(sink) = &self.music {
            sink.pause();
        }
    }

    fn resume_music(&mut self) {
        if let Some(sink) = &self.music {
            sink.play();
        }
    }

    fn play_sound(&mut self, path: &str) {
        match self.decode(path) {
            Some(source) => self.stream.mixer().add(source),
            None => warn!(path = %path, "音效播放失败"),
        }
    }
}
