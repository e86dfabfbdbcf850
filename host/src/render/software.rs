//! 软件渲染后端
//!
//! 所有渲染目标都是内存中的 `RgbaImage`，屏幕也是一张 `RgbaImage`。
//! 用于无窗口运行、截图和测试。

use std::collections::HashMap;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Pixel, RgbaImage};
use tracing::{debug, info};

use super::{BlendMode, Rect, RenderBackend, RenderError, Rgba, TargetId};

/// 单张渲染目标允许的最大边长
const DEFAULT_MAX_DIMENSION: u32 = 16384;

#[derive(Debug)]
struct SoftTarget {
    image: RgbaImage,
    blend: BlendMode,
    alpha: u8,
}

/// 软件渲染后端
#[derive(Debug)]
pub struct SoftwareBackend {
    screen: RgbaImage,
    targets: HashMap<TargetId, SoftTarget>,
    current: Option<TargetId>,
    next_id: u64,
    pointer: (i32, i32),
    max_dimension: u32,
    /// 累计分配次数（含上传）
    allocations: u64,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: RgbaImage::new(width.max(1), height.max(1)),
            targets: HashMap::new(),
            current: None,
            next_id: 1,
            pointer: (0, 0),
            max_dimension: DEFAULT_MAX_DIMENSION,
            allocations: 0,
        }
    }

    /// 限制单张渲染目标的最大边长，超出时分配失败
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// 当前存活的渲染目标数量
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// 累计分配次数
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    /// 读取渲染目标的像素
    pub fn pixels(&self, target: TargetId) -> Option<&RgbaImage> {
        self.targets.get(&target).map(|t| &t.image)
    }

    pub fn target_alpha(&self, target: TargetId) -> Option<u8> {
        self.targets.get(&target).map(|t| t.alpha)
    }

    /// 把屏幕保存为 PNG
    pub fn save_screenshot(&self, path: &Path) -> Result<(), RenderError> {
        self.screen
            .save(path)
            .map_err(|e| RenderError::ImageSave {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        info!(path = %path.display(), "截图已保存");
        Ok(())
    }

    fn insert(&mut self, image: RgbaImage) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.allocations += 1;
        self.targets.insert(
            id,
            SoftTarget {
                image,
                blend: BlendMode::Blend,
                alpha: 255,
            },
        );
        debug!(target = id.0, live = self.targets.len(), "分配渲染目标");
        id
    }

    fn check_size(&self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(RenderError::AllocationFailed {
                width,
                height,
                message: format!("超过最大边长 {}", self.max_dimension),
            });
        }
        Ok(())
    }

    fn canvas_mut(&mut self) -> Result<&mut RgbaImage, RenderError> {
        match self.current {
            None => Ok(&mut self.screen),
            Some(id) => self
                .targets
                .get_mut(&id)
                .map(|t| &mut t.image)
                .ok_or(RenderError::UnknownTarget(id)),
        }
    }

    fn target(&self, id: TargetId) -> Result<&SoftTarget, RenderError> {
        self.targets.get(&id).ok_or(RenderError::UnknownTarget(id))
    }

    fn target_mut(&mut self, id: TargetId) -> Result<&mut SoftTarget, RenderError> {
        self.targets
            .get_mut(&id)
            .ok_or(RenderError::UnknownTarget(id))
    }
}

/// 把像素写入画布（越界忽略）
fn put(canvas: &mut RgbaImage, x: i32, y: i32, src: [u8; 4], mode: BlendMode) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    match mode {
        BlendMode::None => *dst = image::Rgba(src),
        BlendMode::Blend => dst.blend(&image::Rgba(src)),
    }
}

impl RenderBackend for SoftwareBackend {
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, RenderError> {
        self.check_size(width, height)?;
        Ok(self.insert(RgbaImage::new(width, height)))
    }

    fn upload_surface(&mut self, surface: &RgbaImage) -> Result<TargetId, RenderError> {
        self.check_size(surface.width(), surface.height())?;
        Ok(self.insert(surface.clone()))
    }

    fn destroy_target(&mut self, target: TargetId) -> Result<(), RenderError> {
        self.targets
            .remove(&target)
            .ok_or(RenderError::UnknownTarget(target))?;
        if self.current == Some(target) {
            self.current = None;
        }
        debug!(target = target.0, live = self.targets.len(), "释放渲染目标");
        Ok(())
    }

    fn set_draw_target(&mut self, target: Option<TargetId>) -> Result<(), RenderError> {
        if let Some(id) = target {
            self.target(id)?;
        }
        self.current = target;
        Ok(())
    }

    fn clear(&mut self, color: Rgba) -> Result<(), RenderError> {
        let pixel = color.to_pixel();
        for p in self.canvas_mut()?.pixels_mut() {
            *p = pixel;
        }
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), RenderError> {
        let canvas = self.canvas_mut()?;
        let bounds = Rect::new(0, 0, canvas.width(), canvas.height());
        let area = rect.intersect(&bounds);
        let src = color.to_pixel().0;
        for y in area.y..area.y + area.h as i32 {
            for x in area.x..area.x + area.w as i32 {
                put(canvas, x, y, src, BlendMode::Blend);
            }
        }
        Ok(())
    }

    fn copy(
        &mut self,
        src: TargetId,
        src_rect: Option<Rect>,
        dst: Rect,
    ) -> Result<(), RenderError> {
        if dst.w == 0 || dst.h == 0 {
            return Ok(());
        }

        let (region, blend, alpha) = {
            let source = self.target(src)?;
            let full = Rect::new(0, 0, source.image.width(), source.image.height());
            let area = src_rect.unwrap_or(full).intersect(&full);
            if area.w == 0 || area.h == 0 {
                return Ok(());
            }
            let region =
                imageops::crop_imm(&source.image, area.x as u32, area.y as u32, area.w, area.h)
                    .to_image();
            (region, source.blend, source.alpha)
        };

        let region = if region.dimensions() == (dst.w, dst.h) {
            region
        } else {
            imageops::resize(&region, dst.w, dst.h, FilterType::Nearest)
        };

        let canvas = self.canvas_mut()?;
        for (px, py, pixel) in region.enumerate_pixels() {
            let mut value = pixel.0;
            value[3] = ((value[3] as u16 * alpha as u16) / 255) as u8;
            put(canvas, dst.x + px as i32, dst.y + py as i32, value, blend);
        }
        Ok(())
    }

    fn set_blend(&mut self, target: TargetId, mode: BlendMode) -> Result<(), RenderError> {
        self.target_mut(target)?.blend = mode;
        Ok(())
    }

    fn set_alpha(&mut self, target: TargetId, alpha: u8) -> Result<(), RenderError> {
        self.target_mut(target)?.alpha = alpha;
        Ok(())
    }

    fn query_size(&self, target: TargetId) -> Result<(u32, u32), RenderError> {
        Ok(self.target(target)?.image.dimensions())
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen.dimensions()
    }

    fn pointer(&self) -> (i32, i32) {
        self.pointer
    }

    fn sync_pointer(&mut self, x: i32, y: i32) {
        self.pointer = (x, y);
    }

    fn load_image(&mut self, path: &Path) -> Result<TargetId, RenderError> {
        let image = image::open(path)
            .map_err(|e| RenderError::ImageLoad {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .to_rgba8();
        info!(path = %path.display(), width = image.width(), height = image.height(), "图片加载成功");
        self.upload_surface(&image)
    }
}
