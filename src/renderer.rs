// ============================================================================
// renderer.rs — lifegrid
// HUD text overlay via glyphon, drawn inside the cell render pass.
// ============================================================================

use glyphon::{
    Attrs, Buffer as TextBuffer, Cache as GlyphCache, Color as GlyphColor, Family, FontSystem,
    Metrics, Resolution, Shaping, SwashCache, TextArea, TextAtlas, TextBounds, TextRenderer,
    Viewport as GlyphViewport,
};

use crate::config::SimulationParams;
use crate::frame_loop::LoopState;
use crate::grid::Grid;

/// All glyphon resources needed for HUD text rendering.
pub struct HudRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    glyph_viewport: GlyphViewport,
    text_atlas: TextAtlas,
    text_renderer: TextRenderer,
    text_buffer: TextBuffer,
}

impl HudRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let mut font_system = FontSystem::new();
        let swash_cache = SwashCache::new();
        let glyph_cache = GlyphCache::new(device);
        let glyph_viewport = GlyphViewport::new(device, &glyph_cache);
        let mut text_atlas = TextAtlas::new(device, queue, &glyph_cache, surface_format);
        let text_renderer =
            TextRenderer::new(&mut text_atlas, device, wgpu::MultisampleState::default(), None);
        let text_buffer = TextBuffer::new(&mut font_system, Metrics::new(14.0, 18.0));

        Self {
            font_system,
            swash_cache,
            glyph_viewport,
            text_atlas,
            text_renderer,
            text_buffer,
        }
    }

    /// Shape and upload `text` for the next render pass.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        text: &str,
        win_w: u32,
        win_h: u32,
    ) {
        self.glyph_viewport.update(
            queue,
            Resolution {
                width: win_w,
                height: win_h,
            },
        );

        self.text_buffer
            .set_size(&mut self.font_system, Some(win_w as f32), Some(win_h as f32));
        self.text_buffer.set_text(
            &mut self.font_system,
            text,
            Attrs::new().family(Family::Monospace),
            Shaping::Basic,
        );
        self.text_buffer
            .shape_until_scroll(&mut self.font_system, false);

        let prepared = self.text_renderer.prepare(
            device,
            queue,
            &mut self.font_system,
            &mut self.text_atlas,
            &self.glyph_viewport,
            [TextArea {
                buffer: &self.text_buffer,
                left: 10.0,
                top: 10.0,
                scale: 1.0,
                bounds: TextBounds {
                    left: 0,
                    top: 0,
                    right: win_w as i32,
                    bottom: win_h as i32,
                },
                default_color: GlyphColor::rgb(230, 230, 230),
                custom_glyphs: &[],
            }],
            &mut self.swash_cache,
        );
        if let Err(e) = prepared {
            log::warn!("HUD prepare failed: {}", e);
        }
    }

    /// Render HUD overlay into an active render pass.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Err(e) = self
            .text_renderer
            .render(&self.text_atlas, &self.glyph_viewport, pass)
        {
            log::warn!("HUD render failed: {}", e);
        }
    }

    /// Trim the glyph atlas after presenting.
    pub fn trim(&mut self) {
        self.text_atlas.trim();
    }
}

// ======================== HUD Text Builder ========================

pub fn build_hud_text(
    params: &SimulationParams,
    state: LoopState,
    generation: u64,
    grid: &Grid,
    alive: Option<u32>,
) -> String {
    let status = match state {
        LoopState::Ticking => "",
        LoopState::Idle => " [PAUSED]",
        LoopState::Halted => " [HALTED]",
    };
    let alive = match alive {
        Some(n) => format!("{}/{}", n, grid.cell_count()),
        None => "-".to_string(),
    };
    format!(
        "Generation: {}{}   Grid: {}x{}   Alive: {}\n\
         Tick: {} ms (Up/Down) | Space: Pause | N: Step | R: Reseed | S: Save | H: HUD",
        generation,
        status,
        grid.width,
        grid.height,
        alive,
        params.tick_interval_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifeConfig;

    #[test]
    fn hud_text_reports_state() {
        let params = SimulationParams::new(&LifeConfig::default());
        let grid = Grid::new(32, 32).unwrap();

        let text = build_hud_text(&params, LoopState::Idle, 12, &grid, Some(100));
        assert!(text.starts_with("Generation: 12 [PAUSED]"));
        assert!(text.contains("Alive: 100/1024"));
        assert!(text.contains("Tick: 200 ms"));

        let text = build_hud_text(&params, LoopState::Ticking, 3, &grid, None);
        assert!(text.starts_with("Generation: 3   Grid: 32x32   Alive: -"));
    }
}
