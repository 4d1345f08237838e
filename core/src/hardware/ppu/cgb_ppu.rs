//! CGB-specific rendering: the attribute plane in VRAM bank 1, the colour
//! palette memories, and the different sprite priority rules. DMG mode
//! rendering lives in ppu/mod.rs.

use itertools::Itertools;

use crate::hardware::ppu::cgb_vram::CgbTileAttribute;
use crate::hardware::ppu::register_flags::{AttributeFlags, LcdControl};
use crate::hardware::ppu::tiledata::row_pixel;
use crate::hardware::ppu::{Ppu, RESOLUTION_WIDTH};

impl Ppu {
    pub(crate) fn draw_cgb_scanline(&mut self) {
        // In CGB mode LCDC.0 no longer blanks the background, it only
        // demotes its priority against sprites.
        self.draw_cgb_bg_scanline();

        if self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) {
            self.draw_cgb_window_scanline();
        }

        if self.lcd_control.contains(LcdControl::SPRITE_DISPLAY_ENABLE) {
            self.draw_cgb_sprite_scanline();
        }
    }

    fn draw_cgb_bg_scanline(&mut self) {
        let y = self.current_y.wrapping_add(self.scroll_y);
        let high_map = self.lcd_control.contains(LcdControl::BG_TILE_MAP_SELECT);

        for x in 0..RESOLUTION_WIDTH as u8 {
            let bx = x.wrapping_add(self.scroll_x);
            let map_index = (y as usize / 8) * 32 + bx as usize / 8;

            let (colour, rgb, priority) =
                self.cgb_tile_pixel(high_map, map_index, (y % 8) as usize, (bx % 8) as usize);
            self.scanline_pixel(x as usize, rgb, colour, priority);
        }
    }

    fn draw_cgb_window_scanline(&mut self) {
        if self.current_y < self.window_y || self.window_x > 166 {
            return;
        }

        let start_x = self.window_x as i16 - 7;
        let line = self.window_counter as usize;
        let high_map = self.lcd_control.contains(LcdControl::WINDOW_MAP_SELECT);
        let mut drew_any = false;

        for x in 0..RESOLUTION_WIDTH as i16 {
            if x < start_x {
                continue;
            }

            let window_x = (x - start_x) as usize;
            let map_index = (line / 8) * 32 + window_x / 8;

            let (colour, rgb, priority) =
                self.cgb_tile_pixel(high_map, map_index, line % 8, window_x % 8);
            self.scanline_pixel(x as usize, rgb, colour, priority);
            drew_any = true;
        }

        if drew_any {
            self.window_counter += 1;
        }
    }

    /// Resolve one background/window pixel through the attribute byte in
    /// VRAM bank 1: palette, tile bank, and both flips.
    fn cgb_tile_pixel(
        &self,
        high_map: bool,
        map_index: usize,
        tile_line: usize,
        tile_x: usize,
    ) -> (u8, crate::hardware::ppu::palette::RGB, bool) {
        let tile_number = self.tile_map_entry(high_map, map_index);
        let attributes = self.tile_map_attributes(high_map, map_index);

        let line = if attributes.contains(CgbTileAttribute::Y_FLIP) {
            7 - tile_line
        } else {
            tile_line
        };
        let pixel_x = if attributes.contains(CgbTileAttribute::X_FLIP) {
            7 - tile_x
        } else {
            tile_x
        };

        let bank = attributes.contains(CgbTileAttribute::TILE_VRAM_BANK_NUMBER) as usize;
        let (low, high) = self.tile_row(self.bg_tile_data_index(tile_number), bank, line);

        let colour = row_pixel(low, high, pixel_x);
        let rgb = self.cgb_bg_palette.rgb(attributes.bg_palette_number(), colour);

        (
            colour,
            rgb,
            attributes.contains(CgbTileAttribute::BG_TO_OAM_PRIORITY),
        )
    }

    fn draw_cgb_sprite_scanline(&mut self) {
        let sprites = self.visible_sprites();
        // The CGB prioritises by OAM position unless OPRI selects the
        // DMG's X-coordinate ordering.
        let x_priority = self.object_priority & 0x1 != 0;
        let sprites_always_win = !self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY);

        for sprite in sprites
            .iter()
            .copied()
            .sorted_by_key(|sprite| {
                if x_priority {
                    (sprite.x_pos, sprite.oam_index)
                } else {
                    (0, sprite.oam_index)
                }
            })
            .rev()
        {
            let palette_number = sprite.attribute_flags.cgb_palette_number();
            let behind_bg = sprite.attribute_flags.contains(AttributeFlags::OBJ_TO_BG_PRIORITY);
            let bank = sprite.attribute_flags.contains(AttributeFlags::TILE_VRAM_BANK) as usize;

            let (tile_index, line) = self.sprite_tile_line(&sprite);
            let (low, high) = self.tile_row(tile_index, bank, line);

            for pixel_x in 0..8i16 {
                let screen_x = sprite.x_pos as i16 - 8 + pixel_x;
                if !(0..RESOLUTION_WIDTH as i16).contains(&screen_x) {
                    continue;
                }

                let tile_x = if sprite.attribute_flags.contains(AttributeFlags::X_FLIP) {
                    7 - pixel_x as usize
                } else {
                    pixel_x as usize
                };

                let colour = row_pixel(low, high, tile_x);
                if colour == 0 {
                    continue;
                }

                let (bg_colour, bg_priority) = self.scanline_attribute(screen_x as usize);
                if !sprites_always_win && (behind_bg || bg_priority) && bg_colour != 0 {
                    continue;
                }

                let rgb = self.cgb_obj_palette.rgb(palette_number, colour);
                self.set_sprite_pixel(screen_x as usize, rgb);
            }
        }
    }

    fn tile_map_attributes(&self, high_map: bool, index: usize) -> CgbTileAttribute {
        let base = if high_map { 0x1C00 } else { 0x1800 };
        CgbTileAttribute::from_bits_truncate(self.vram[1][base + index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ppu::palette::{GRAYSCALE, RGB};
    use crate::hardware::ppu::{Mode, OAM_SEARCH_DURATION, LCD_TRANSFER_DURATION};
    use crate::io::interrupts::InterruptController;
    use pretty_assertions::assert_eq;

    fn cgb_ppu() -> Ppu {
        Ppu::new(true, GRAYSCALE)
    }

    fn render_first_scanline(ppu: &mut Ppu) {
        let mut interrupts = InterruptController::new();
        ppu.tick((OAM_SEARCH_DURATION + LCD_TRANSFER_DURATION) as u64, &mut interrupts);
        assert_eq!(ppu.lcd_status.mode_flag(), Mode::HBlank);
    }

    #[test]
    fn test_bg_uses_attribute_palette_and_bank() {
        let mut ppu = cgb_ppu();

        // Tile 0 in bank 1, all pixels colour 3.
        ppu.vram[1][0] = 0xFF;
        ppu.vram[1][1] = 0xFF;
        // Attribute: palette 2, tile bank 1.
        ppu.vram[1][0x1800] = 0b0000_1010;
        // Palette 2, colour 3 = pure blue (raw 0x7C00).
        ppu.cgb_bg_palette.write_specification(0x80 | (2 * 8 + 3 * 2));
        ppu.cgb_bg_palette.write_data(0x00);
        ppu.cgb_bg_palette.write_data(0x7C);

        render_first_scanline(&mut ppu);

        assert_eq!(ppu.frame_buffer()[0], RGB(0, 0, 0xFF));
    }

    #[test]
    fn test_sprites_win_when_master_priority_off() {
        let mut ppu = cgb_ppu();

        // Background pixel colour 3 with BG-to-OAM priority set.
        ppu.vram[0][0] = 0xFF;
        ppu.vram[0][1] = 0xFF;
        ppu.vram[1][0x1800] = 0b1000_0000;

        // Sprite tile 1, all pixels colour 1, at the top-left corner.
        ppu.vram[0][16] = 0xFF;
        ppu.oam[0] = 16;
        ppu.oam[1] = 8;
        ppu.oam[2] = 1;
        // Sprite palette 0 colour 1 = pure red.
        ppu.cgb_obj_palette.write_specification(0x80 | 2);
        ppu.cgb_obj_palette.write_data(0x1F);
        ppu.cgb_obj_palette.write_data(0x00);

        // With master priority on, the BG attribute hides the sprite.
        render_first_scanline(&mut ppu);
        assert_ne!(ppu.frame_buffer()[0], RGB(0xFF, 0, 0));

        // Clearing LCDC.0 in CGB mode makes sprites always win.
        let mut ppu2 = cgb_ppu();
        ppu2.vram[0][0] = 0xFF;
        ppu2.vram[0][1] = 0xFF;
        ppu2.vram[1][0x1800] = 0b1000_0000;
        ppu2.vram[0][16] = 0xFF;
        ppu2.oam[0] = 16;
        ppu2.oam[1] = 8;
        ppu2.oam[2] = 1;
        ppu2.cgb_obj_palette.write_specification(0x80 | 2);
        ppu2.cgb_obj_palette.write_data(0x1F);
        ppu2.cgb_obj_palette.write_data(0x00);
        ppu2.lcd_control.remove(LcdControl::BG_WINDOW_PRIORITY);

        render_first_scanline(&mut ppu2);
        assert_eq!(ppu2.frame_buffer()[0], RGB(0xFF, 0, 0));
    }
}
