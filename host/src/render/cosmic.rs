//! 基于 cosmic-text 的文本光栅化
//!
//! 字体文件由 fontdb 解析，排版与换行交给 cosmic-text，字形由 swash 光栅化。
//! 只使用显式加载的字体，不扫描系统字体目录。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache};
use image::{Pixel, RgbaImage};
use tracing::{debug, info};

use super::text::{FontError, FontId, TextRasterizer, checked_extent};
use super::Rgba;

/// 行高相对字号的倍数
const LINE_HEIGHT_FACTOR: f32 = 1.25;

#[derive(Debug, Clone)]
struct LoadedFont {
    family: String,
    size: u32,
}

/// cosmic-text 文本光栅化器
pub struct CosmicRasterizer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    /// 字体文件 → 字族名，同一文件只解析一次
    families: HashMap<PathBuf, String>,
    fonts: Vec<LoadedFont>,
}

impl CosmicRasterizer {
    pub fn new() -> Self {
        let db = cosmic_text::fontdb::Database::new();
        Self {
            font_system: FontSystem::new_with_locale_and_db("zh-CN".to_string(), db),
            swash_cache: SwashCache::new(),
            families: HashMap::new(),
            fonts: Vec::new(),
        }
    }

    /// 解析字体文件并注册到字体库，返回其字族名
    fn register(&mut self, path: &Path) -> Result<String, FontError> {
        if let Some(family) = self.families.get(path) {
            return Ok(family.clone());
        }

        let bytes = fs::read(path).map_err(|e| FontError::NotFound {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let db = self.font_system.db_mut();
        let known: HashSet<_> = db.faces().map(|face| face.id).collect();
        db.load_font_data(bytes);
        let family = db
            .faces()
            .find(|face| !known.contains(&face.id))
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .ok_or_else(|| FontError::Invalid {
                path: path.display().to_string(),
                message: "无法解析字体数据".to_string(),
            })?;

        info!(path = %path.display(), family = %family, "字体解析成功");
        self.families.insert(path.to_path_buf(), family.clone());
        Ok(family)
    }
}

impl Default for CosmicRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CosmicRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmicRasterizer")
            .field("families", &self.families.len())
            .field("fonts", &self.fonts.len())
            .finish()
    }
}

impl TextRasterizer for CosmicRasterizer {
    fn load_font(&mut self, name: &str, path: &Path, size: u32) -> Result<FontId, FontError> {
        let family = self.register(path)?;
        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(LoadedFont {
            family,
            size: size.max(1),
        });
        debug!(font = %name, size, "字体已注册");
        Ok(id)
    }

    fn render_text(
        &mut self,
        font: FontId,
        text: &str,
        color: Rgba,
        wrap_width: Option<u32>,
    ) -> Result<RgbaImage, FontError> {
        let loaded = self
            .fonts
            .get(font.0 as usize)
            .cloned()
            .ok_or(FontError::UnknownFont(font))?;

        let font_size = loaded.size as f32;
        let metrics = Metrics::new(font_size, (font_size * LINE_HEIGHT_FACTOR).ceil());
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(
            &mut self.font_system,
            wrap_width.map(|w| w.max(1) as f32),
            None,
        );
        let attrs = Attrs::new().family(Family::Name(&loaded.family));
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let (mut width, mut height) = (0f32, 0f32);
        for run in buffer.layout_runs() {
            width = width.max(run.line_w);
            height = height.max(run.line_top + run.line_height);
        }
        let (width, height) = checked_extent(width.ceil() as u64, height.ceil() as u64)?;

        let mut image = RgbaImage::new(width, height);
        let fill = Color::rgba(color.r, color.g, color.b, color.a);
        buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            fill,
            |x, y, w, h, c| {
                let src = image::Rgba([c.r(), c.g(), c.b(), c.a()]);
                for py in y.max(0)..y.saturating_add(h as i32) {
                    for px in x.max(0)..x.saturating_add(w as i32) {
                        if (px as u32) < width && (py as u32) < height {
                            image.get_pixel_mut(px as u32, py as u32).blend(&src);
                        }
                    }
                }
            },
        );

        debug!(family = %loaded.family, width, height, "文本光栅化");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 常见发行版自带的字体；不存在时跳过依赖真实字形的测试
    fn system_font() -> Option<PathBuf> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    }

    #[test]
    fn test_non_font_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.ttf");
        fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        let mut r = CosmicRasterizer::new();
        let err = r.load_font("fake", &path, 16).unwrap_err();
        assert!(matches!(err, FontError::Invalid { .. }));
    }

    #[test]
    fn test_missing_font_file() {
        let mut r = CosmicRasterizer::new();
        let err = r
            .load_font("x", Path::new("/nonexistent/font.ttf"), 16)
            .unwrap_err();
        assert!(matches!(err, FontError::NotFound { .. }));
    }

    #[test]
    fn test_font_manager_rejects_non_font_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.ttf");
        fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();

        let err = crate::render::FontManager::new(Box::new(CosmicRasterizer::new()), &path, 16)
            .err()
            .unwrap();
        assert!(matches!(err, FontError::Invalid { .. }));
    }

    #[test]
    fn test_renders_glyphs_and_wraps() {
        let Some(path) = system_font() else {
            return;
        };
        let mut r = CosmicRasterizer::new();
        let font = r.load_font("sans", &path, 20).unwrap();
        // 同一文件再次加载不重复解析
        let again = r.load_font("sans", &path, 32).unwrap();
        assert_ne!(font, again);
        assert_eq!(r.families.len(), 1);

        let line = r.render_text(font, "Hello world", Rgba::WHITE, None).unwrap();
        assert!(line.width() > 20);
        assert!(line.pixels().any(|p| p.0[3] > 0));

        let wrapped = r
            .render_text(font, "Hello world", Rgba::WHITE, Some(line.width() / 2))
            .unwrap();
        assert!(wrapped.height() > line.height());
        assert!(wrapped.width() <= line.width());
    }
}
