//! # Render 模块
//!
//! 渲染表面适配层。控件树只依赖这里定义的 [`RenderBackend`] 与
//! [`TextRasterizer`] 两个 trait，窗口与 GPU 细节由具体后端负责。
//!
//! ## 模块结构
//!
//! - [`software`]：基于 `image::RgbaImage` 的软件后端（无窗口、可截图）
//! - [`text`]：文本光栅化与字体管理

pub mod cosmic;
pub mod software;
pub mod text;

pub use cosmic::CosmicRasterizer;
pub use software::SoftwareBackend;
pub use text::{
    BlockRasterizer, FontError, FontId, FontManager, MAX_TEXT_DIMENSION, TextRasterizer,
};

use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

/// 渲染后端错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// 无法分配渲染目标
    #[error("无法分配 {width}x{height} 的渲染目标：{message}")]
    AllocationFailed {
        width: u32,
        height: u32,
        message: String,
    },

    /// 渲染目标不存在（已销毁或从未创建）
    #[error("渲染目标 {0:?} 不存在")]
    UnknownTarget(TargetId),

    /// 图片加载失败
    #[error("无法加载图片 '{path}'：{message}")]
    ImageLoad { path: String, message: String },

    /// 截图保存失败
    #[error("无法保存图片 '{path}'：{message}")]
    ImageSave { path: String, message: String },

    /// 尺寸无效（宽或高为 0）
    #[error("无效的尺寸 {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const RED: Rgba = Rgba::rgb(255, 0, 0);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// 解析 `#rrggbb` 或 `#rrggbbaa`（`#` 可省略）
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }

    /// 解析失败时使用 `fallback`
    pub fn from_hex_or(hex: &str, fallback: Rgba) -> Self {
        Self::from_hex(hex).unwrap_or(fallback)
    }

    pub fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

/// 矩形区域（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// 点是否落在矩形内（右、下边界不含）
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && py >= self.y
            && (px as i64) < self.x as i64 + self.w as i64
            && (py as i64) < self.y as i64 + self.h as i64
    }

    /// 两矩形的交集；不相交时宽高为 0
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x as i64 + self.w as i64).min(other.x as i64 + other.w as i64);
        let y1 = (self.y as i64 + self.h as i64).min(other.y as i64 + other.h as i64);
        Rect {
            x: x0,
            y: y0,
            w: (x1 - x0 as i64).max(0) as u32,
            h: (y1 - y0 as i64).max(0) as u32,
        }
    }
}

/// 渲染目标句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// 直接覆盖
    None,
    /// Alpha 混合
    #[default]
    Blend,
}

/// 渲染表面适配器
///
/// `set_draw_target(None)` 表示绘制到屏幕。
pub trait RenderBackend {
    /// 创建离屏渲染目标（初始全透明）
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, RenderError>;

    /// 把 CPU 像素上传为新的渲染目标
    fn upload_surface(&mut self, surface: &RgbaImage) -> Result<TargetId, RenderError>;

    /// 释放渲染目标
    fn destroy_target(&mut self, target: TargetId) -> Result<(), RenderError>;

    /// 切换绘制目标
    fn set_draw_target(&mut self, target: Option<TargetId>) -> Result<(), RenderError>;

    /// 用颜色填满当前绘制目标
    fn clear(&mut self, color: Rgba) -> Result<(), RenderError>;

    /// 在当前绘制目标上填充矩形
    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), RenderError>;

    /// 把 `src` 的 `src_rect` 区域（None 为整张）复制到当前绘制目标的 `dst`
    fn copy(&mut self, src: TargetId, src_rect: Option<Rect>, dst: Rect)
    -> Result<(), RenderError>;

    fn set_blend(&mut self, target: TargetId, mode: BlendMode) -> Result<(), RenderError>;

    /// 设置复制时的整体透明度（0..=255）
    fn set_alpha(&mut self, target: TargetId, alpha: u8) -> Result<(), RenderError>;

    fn query_size(&self, target: TargetId) -> Result<(u32, u32), RenderError>;

    /// 屏幕尺寸
    fn screen_size(&self) -> (u32, u32);

    /// 当前鼠标位置（屏幕坐标）
    fn pointer(&self) -> (i32, i32);

    /// 同步鼠标位置
    ///
    /// 无窗口后端以输入事件携带的坐标为准；窗口后端可以忽略。
    fn sync_pointer(&mut self, x: i32, y: i32);

    /// 从文件加载图片为渲染目标
    fn load_image(&mut self, path: &Path) -> Result<TargetId, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse() {
        assert_eq!(Rgba::from_hex("#ff0000"), Some(Rgba::RED));
        assert_eq!(Rgba::from_hex("202020"), Some(Rgba::rgb(0x20, 0x20, 0x20)));
        assert_eq!(
            Rgba::from_hex("#00000080"),
            Some(Rgba {
                r: 0,
                g: 0,
                b: 0,
                a: 0x80
            })
        );
        assert_eq!(Rgba::from_hex("#fff"), None);
        assert_eq!(Rgba::from_hex("#gg0000"), None);
        assert_eq!(Rgba::from_hex_or("nope", Rgba::WHITE), Rgba::WHITE);
    }

    #[test]
    fn test_rect_contains_and_intersect() {
        let r = Rect::new(10, 10, 20, 10);
        assert!(r.contains(10, 10));
        assert!(r.contains(29, 19));
        assert!(!r.contains(30, 10));
        assert!(!r.contains(9, 15));

        let i = r.intersect(&Rect::new(20, 0, 100, 15));
        assert_eq!(i, Rect::new(20, 10, 10, 5));

        let empty = r.intersect(&Rect::new(100, 100, 5, 5));
        assert_eq!(empty.w, 0);
    }
}
