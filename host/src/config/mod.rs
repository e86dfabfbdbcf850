//! # Config 模块
//!
//! 运行时配置管理，集中管理所有配置项。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）
//!
//! 配置文件中的相对路径都相对于 `assets_root` 解析；`assets_root` 本身若为相对路径，
//! 则相对于配置文件所在目录。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// 支持的分辨率（高度）
pub const SUPPORTED_RESOLUTIONS: [u32; 4] = [720, 1080, 2160, 4320];

/// 对话面板宽度比例的回退值
pub const DEFAULT_PANEL_WIDTH: f64 = 0.3;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 读取失败
    #[error("配置 IO 错误 {path}: {message}")]
    Io { path: String, message: String },

    /// 解析失败
    #[error("配置解析失败 {path}: {message}")]
    Parse { path: String, message: String },

    /// 不支持的分辨率
    #[error("不支持分辨率 {0}！支持的分辨率: 720(HD), 1080(Full HD), 2160(4K), 4320(8K)")]
    UnsupportedResolution(u32),

    /// 验证失败
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 帧率
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// 游戏版本
    #[serde(default = "default_game_version")]
    pub game_version: String,

    /// 是否全屏
    #[serde(default)]
    pub fullscreen: bool,

    /// 逻辑分辨率（高度），宽度按 16:9 推算
    #[serde(default = "default_resolution")]
    pub resolution: u32,

    /// 资源根目录
    #[serde(default = "default_assets_root")]
    pub assets_root: PathBuf,

    /// 默认字体路径（相对于 assets_root）
    #[serde(default = "default_font_path")]
    pub default_font: String,

    #[serde(default = "default_font_size")]
    pub default_font_size: u32,

    /// 默认文本颜色（#rrggbb）
    #[serde(default = "default_text_color")]
    pub default_text_color: String,

    /// **入口脚本路径**（相对于 assets_root）
    #[serde(default = "default_script")]
    pub script: String,

    /// 全屏背景图（可选）
    #[serde(default)]
    pub background: Option<String>,

    /// 对话面板配置
    #[serde(default)]
    pub dialog_panel: DialogPanelConfig,

    /// 主菜单配置
    #[serde(default)]
    pub main_menu: MainMenuConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,
}

/// 对话面板所在的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSide {
    Left,
    Right,
}

/// 对话面板配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogPanelConfig {
    /// `left` 或 `right`
    #[serde(default = "default_panel_direction")]
    pub direction: String,

    /// 面板背景色
    #[serde(default = "default_panel_color")]
    pub color: String,

    /// 面板宽度占屏幕宽度的比例（0.1 - 1.0）
    #[serde(default = "default_panel_width")]
    pub width: f64,
}

impl DialogPanelConfig {
    pub fn side(&self) -> PanelSide {
        if self.direction == "right" {
            PanelSide::Right
        } else {
            PanelSide::Left
        }
    }
}

/// 主菜单配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainMenuConfig {
    /// 是否在启动时显示主菜单
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 按钮文字颜色
    #[serde(default = "default_menu_color")]
    pub color: String,

    #[serde(default = "default_menu_color_hover")]
    pub color_hover: String,

    /// 按钮背景色
    #[serde(default = "default_menu_background_color")]
    pub background_color: String,

    #[serde(default = "default_menu_background_color_hover")]
    pub background_color_hover: String,

    /// 主菜单背景图（可选）
    #[serde(default)]
    pub background: Option<String>,
}

/// 音频配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// 是否静音
    #[serde(default)]
    pub muted: bool,
}

// 默认值函数
fn default_title() -> String {
    "Fufu Visual Novel Engine".to_string()
}

fn default_fps() -> u32 {
    30
}

fn default_game_version() -> String {
    "undefined".to_string()
}

fn default_resolution() -> u32 {
    1080
}

fn default_assets_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_font_path() -> String {
    "assets/UbuntuSans-Regular.ttf".to_string()
}

fn default_font_size() -> u32 {
    16
}

fn default_text_color() -> String {
    "#ffffff".to_string()
}

fn default_script() -> String {
    "main.lua".to_string()
}

fn default_panel_direction() -> String {
    "left".to_string()
}

fn default_panel_color() -> String {
    "#202020".to_string()
}

fn default_panel_width() -> f64 {
    DEFAULT_PANEL_WIDTH
}

fn default_true() -> bool {
    true
}

fn default_menu_color() -> String {
    "#ffffff".to_string()
}

fn default_menu_color_hover() -> String {
    "#000000".to_string()
}

fn default_menu_background_color() -> String {
    "#045147".to_string()
}

fn default_menu_background_color_hover() -> String {
    "#ffffff".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            fps: default_fps(),
            game_version: default_game_version(),
            fullscreen: false,
            resolution: default_resolution(),
            assets_root: default_assets_root(),
            default_font: default_font_path(),
            default_font_size: default_font_size(),
            default_text_color: default_text_color(),
            script: default_script(),
            background: None,
            dialog_panel: DialogPanelConfig::default(),
            main_menu: MainMenuConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Default for DialogPanelConfig {
    fn default() -> Self {
        Self {
            direction: default_panel_direction(),
            color: default_panel_color(),
            width: default_panel_width(),
        }
    }
}

impl Default for MainMenuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: default_menu_color(),
            color_hover: default_menu_color_hover(),
            background_color: default_menu_background_color(),
            background_color_hover: default_menu_background_color_hover(),
            background: None,
        }
    }
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 文件不存在时返回默认配置并打印警告；读取或解析失败返回错误。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            let mut config = Self::default();
            config.assets_root = base.join(&config.assets_root);
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        if config.assets_root.is_relative() {
            config.assets_root = base.join(&config.assets_root);
        }
        config.normalize();

        info!(path = %path.display(), "配置文件加载成功");
        Ok(config)
    }

    /// 把越界或非法的取值修正为回退值
    pub fn normalize(&mut self) {
        let panel = &mut self.dialog_panel;
        if !(0.1..=1.0).contains(&panel.width) {
            warn!(width = panel.width, "对话面板宽度越界，使用 {}", DEFAULT_PANEL_WIDTH);
            panel.width = DEFAULT_PANEL_WIDTH;
        }
        if panel.direction != "left" && panel.direction != "right" {
            warn!(direction = %panel.direction, "对话面板方向无效，使用 \"left\"");
            panel.direction = "left".to_string();
        }
    }

    /// 逻辑分辨率（宽，高）
    pub fn resolution(&self) -> Result<(u32, u32), ConfigError> {
        let width = match self.resolution {
            720 => 1280,
            1080 => 1920,
            2160 => 3840,
            4320 => 7680,
            other => return Err(ConfigError::UnsupportedResolution(other)),
        };
        Ok((width, self.resolution))
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolution()?;

        if self.fps == 0 {
            return Err(ConfigError::ValidationFailed("fps 必须大于 0".to_string()));
        }

        if self.default_font_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "default_font_size 必须大于 0".to_string(),
            ));
        }

        // **必须配置入口脚本**
        if self.script.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "必须配置 script（入口脚本路径）".to_string(),
            ));
        }

        let script = self.script_path();
        if !script.exists() {
            return Err(ConfigError::ValidationFailed(format!(
                "入口脚本不存在: {:?}",
                script
            )));
        }

        Ok(())
    }

    /// 相对于资源根目录解析路径
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.assets_root.join(path)
    }

    /// 入口脚本完整路径
    pub fn script_path(&self) -> PathBuf {
        self.resolve(&self.script)
    }

    /// 默认字体完整路径
    pub fn default_font_path(&self) -> PathBuf {
        self.resolve(&self.default_font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.fps, 30);
        assert_eq!(config.resolution, 1080);
        assert_eq!(config.default_text_color, "#ffffff");
        assert_eq!(config.dialog_panel.width, 0.3);
        assert_eq!(config.dialog_panel.side(), PanelSide::Left);
        assert_eq!(config.main_menu.background_color, "#045147");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{ "title": "测试", "fps": 60 }"#);

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.title, "测试");
        assert_eq!(config.fps, 60);
        assert_eq!(config.script, "main.lua");
        assert_eq!(config.script_path(), dir.path().join("./main.lua"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config.title, "Fufu Visual Novel Engine");
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json");
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_panel_width_out_of_range_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{ "dialog_panel": { "width": 1.5 } }"#);
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.dialog_panel.width, DEFAULT_PANEL_WIDTH);

        let path = write_config(dir.path(), r#"{ "dialog_panel": { "width": 0.5 } }"#);
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.dialog_panel.width, 0.5);
    }

    #[test]
    fn test_invalid_direction_falls_back_to_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{ "dialog_panel": { "direction": "up" } }"#);
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.dialog_panel.direction, "left");

        let path = write_config(dir.path(), r#"{ "dialog_panel": { "direction": "right" } }"#);
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.dialog_panel.side(), PanelSide::Right);
    }

    #[test]
    fn test_resolution_mapping() {
        let mut config = AppConfig::default();
        assert_eq!(config.resolution().unwrap(), (1920, 1080));
        config.resolution = 720;
        assert_eq!(config.resolution().unwrap(), (1280, 720));
        config.resolution = 4320;
        assert_eq!(config.resolution().unwrap(), (7680, 4320));
        config.resolution = 900;
        assert_eq!(
            config.resolution(),
            Err(ConfigError::UnsupportedResolution(900))
        );
    }

    #[test]
    fn test_config_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            assets_root: dir.path().to_path_buf(),
            ..AppConfig::default()
        };

        // 入口脚本不存在
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));

        fs::write(dir.path().join("main.lua"), "narrate('hi')").unwrap();
        assert!(config.validate().is_ok());

        config.resolution = 1000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedResolution(1000))
        );
    }
}
