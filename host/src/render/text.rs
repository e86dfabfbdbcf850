//! # 文本光栅化
//!
//! [`TextRasterizer`] 负责“测量并把文字画到像素表面”；
//! [`FontManager`] 在其上做字体缓存与回退。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use vn_runtime::{FontSpec, MAX_FONT_SIZE};

use super::Rgba;

/// 字体错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FontError {
    /// 字体文件不存在或不可读
    #[error("字体文件 '{path}' 不存在：{message}")]
    NotFound { path: String, message: String },

    /// 字体文件无效
    #[error("无效的字体 '{path}'：{message}")]
    Invalid { path: String, message: String },

    /// 字体句柄未注册
    #[error("未知的字体句柄 {0:?}")]
    UnknownFont(FontId),

    /// 排版结果超过单张表面允许的尺寸
    #[error("文本表面过大：{width}x{height}")]
    TooLarge { width: u64, height: u64 },
}

/// 单张文本表面允许的最大边长
pub const MAX_TEXT_DIMENSION: u32 = 16384;

/// 检查排版尺寸，超限时在分配像素前报错
pub(crate) fn checked_extent(width: u64, height: u64) -> Result<(u32, u32), FontError> {
    let limit = MAX_TEXT_DIMENSION as u64;
    if width > limit || height > limit {
        return Err(FontError::TooLarge { width, height });
    }
    Ok(((width as u32).max(1), (height as u32).max(1)))
}

/// 字体句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub u32);

/// 文本光栅化适配器
pub trait TextRasterizer {
    /// 加载字体
    fn load_font(&mut self, name: &str, path: &Path, size: u32) -> Result<FontId, FontError>;

    /// 测量并光栅化文本；`wrap_width` 为最大行宽（像素）
    fn render_text(
        &mut self,
        font: FontId,
        text: &str,
        color: Rgba,
        wrap_width: Option<u32>,
    ) -> Result<RgbaImage, FontError>;
}

/// 等宽方块光栅化器
///
/// 不解析字形：每个非空白字符画成一个实心方块，字宽为字号的一半，行高为字号。
/// 输出尺寸与换行结果是确定的，适合无窗口运行与测试。
#[derive(Debug, Default)]
pub struct BlockRasterizer {
    fonts: Vec<BlockFont>,
}

#[derive(Debug, Clone)]
struct BlockFont {
    name: String,
    size: u32,
}

impl BlockRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 字宽与行高
    pub fn cell_size(size: u32) -> (u32, u32) {
        ((size / 2).max(1), size.max(1))
    }
}

/// 按单词贪心换行；超长单词按字符拆分
fn wrap_lines(text: &str, max_chars: Option<usize>) -> Vec<Vec<char>> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let Some(max) = max_chars else {
            lines.push(paragraph.chars().collect());
            continue;
        };

        let mut line: Vec<char> = Vec::new();
        for word in paragraph.split(' ') {
            let word: Vec<char> = word.chars().collect();
            let needed = if line.is_empty() {
                word.len()
            } else {
                line.len() + 1 + word.len()
            };
            if needed <= max {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.extend(word);
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut chunks = word.chunks(max).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    lines.push(chunk.to_vec());
                } else {
                    line = chunk.to_vec();
                }
            }
        }
        lines.push(line);
    }
    lines
}

impl TextRasterizer for BlockRasterizer {
    fn load_font(&mut self, name: &str, path: &Path, size: u32) -> Result<FontId, FontError> {
        let meta = fs::metadata(path).map_err(|e| FontError::NotFound {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(FontError::Invalid {
                path: path.display().to_string(),
                message: "不是有效的字体文件".to_string(),
            });
        }

        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(BlockFont {
            name: name.to_string(),
            size,
        });
        Ok(id)
    }

    fn render_text(
        &mut self,
        font: FontId,
        text: &str,
        color: Rgba,
        wrap_width: Option<u32>,
    ) -> Result<RgbaImage, FontError> {
        let block = self
            .fonts
            .get(font.0 as usize)
            .ok_or(FontError::UnknownFont(font))?;
        let (cell_w, cell_h) = Self::cell_size(block.size);

        let max_chars = wrap_width.map(|w| ((w / cell_w) as usize).max(1));
        let lines = wrap_lines(text, max_chars);
        let longest = lines.iter().map(Vec::len).max().unwrap_or(0);

        let (width, height) = checked_extent(
            longest as u64 * cell_w as u64,
            lines.len() as u64 * cell_h as u64,
        )?;
        let mut image = RgbaImage::new(width, height);

        let pixel = color.to_pixel();
        for (row, line) in lines.iter().enumerate() {
            for (col, ch) in line.iter().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let x0 = col as u32 * cell_w;
                let y0 = row as u32 * cell_h;
                // 方块留一像素边距，便于区分相邻字符
                for y in y0..y0 + cell_h.saturating_sub(1).max(1) {
                    for x in x0..x0 + cell_w.saturating_sub(1).max(1) {
                        image.put_pixel(x, y, pixel);
                    }
                }
            }
        }

        debug!(font = %block.name, lines = lines.len(), width, height, "文本光栅化");
        Ok(image)
    }
}

/// 字体管理器
///
/// 以（名称，字号）为键缓存字体句柄。默认字体在构造时显式加载，失败即启动失败；
/// 单行文本的自定义字体加载失败时静默回退到默认字体。
pub struct FontManager {
    rasterizer: Box<dyn TextRasterizer>,
    cache: HashMap<(String, u32), FontId>,
    default_name: String,
    default_path: PathBuf,
    default_size: u32,
    default_font: FontId,
}

impl FontManager {
    /// 名称 `default` 保留给默认字体
    pub const DEFAULT_NAME: &'static str = "default";

    /// 创建字体管理器并加载默认字体
    pub fn new(
        mut rasterizer: Box<dyn TextRasterizer>,
        default_path: &Path,
        default_size: u32,
    ) -> Result<Self, FontError> {
        let default_font = rasterizer.load_font(Self::DEFAULT_NAME, default_path, default_size)?;
        info!(path = %default_path.display(), size = default_size, "默认字体加载成功");

        let mut cache = HashMap::new();
        cache.insert((Self::DEFAULT_NAME.to_string(), default_size), default_font);

        Ok(Self {
            rasterizer,
            cache,
            default_name: Self::DEFAULT_NAME.to_string(),
            default_path: default_path.to_path_buf(),
            default_size,
            default_font,
        })
    }

    pub fn default_font(&self) -> FontId {
        self.default_font
    }

    pub fn default_size(&self) -> u32 {
        self.default_size
    }

    /// 加载字体，命中缓存时直接返回
    pub fn load_font(&mut self, name: &str, path: &Path, size: u32) -> Result<FontId, FontError> {
        let key = (name.to_string(), size);
        if let Some(id) = self.cache.get(&key) {
            return Ok(*id);
        }
        let id = self.rasterizer.load_font(name, path, size)?;
        debug!(font = %name, size, "字体已缓存");
        self.cache.insert(key, id);
        Ok(id)
    }

    /// 根据样式覆盖解析字体
    ///
    /// 字号截断到 `1..=MAX_FONT_SIZE`。
    /// 自定义字体加载失败时回退到同字号的默认字体，再失败则使用默认字体。
    pub fn resolve(&mut self, font: Option<&FontSpec>, size: Option<u32>) -> FontId {
        let size = size.unwrap_or(self.default_size).clamp(1, MAX_FONT_SIZE);
        let fallback = self.default_at(size);

        let Some(spec) = font else {
            return fallback;
        };
        match self.load_font(&spec.name, Path::new(&spec.path), size) {
            Ok(id) => id,
            Err(e) => {
                warn!(font = %spec.name, error = %e, "字体加载失败，回退到默认字体");
                fallback
            }
        }
    }

    fn default_at(&mut self, size: u32) -> FontId {
        let name = self.default_name.clone();
        let path = self.default_path.clone();
        match self.load_font(&name, &path, size) {
            Ok(id) => id,
            Err(e) => {
                warn!(size, error = %e, "默认字体无法以该字号加载");
                self.default_font
            }
        }
    }

    pub fn render(
        &mut self,
        font: FontId,
        text: &str,
        color: Rgba,
        wrap_width: Option<u32>,
    ) -> Result<RgbaImage, FontError> {
        self.rasterizer.render_text(font, text, color, wrap_width)
    }
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("cached", &self.cache.len())
            .field("default_size", &self.default_size)
            .finish()
    }
}
