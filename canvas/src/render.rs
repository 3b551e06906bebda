use std::io::Cursor;

use colors_transform::Color;
use image::{ImageOutputFormat, Rgb, RgbImage};
use structures::Grid;

use crate::errors::CanvasError;

/// Render the grid to an image; empty cells come out white.
pub fn render_grid(grid: &Grid) -> Result<RgbImage, CanvasError> {
    let mut canvas = RgbImage::new(grid.width as u32, grid.height as u32);
    canvas.fill(0xff);

    for y in 0..grid.height {
        for x in 0..grid.width {
            if let Some(cell) = grid.cell(x, y) {
                canvas.put_pixel(x as u32, y as u32, parse_hex_color(&cell.color)?);
            }
        }
    }

    Ok(canvas)
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, CanvasError> {
    // needs a seekable writer
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

fn parse_hex_color(color: &str) -> Result<Rgb<u8>, CanvasError> {
    let parsed = colors_transform::Rgb::from_hex_str(color)
        .map_err(|_| CanvasError::Validation(format!("Invalid color format: {}", color)))?;

    Ok(Rgb([
        parsed.get_red() as u8,
        parsed.get_green() as u8,
        parsed.get_blue() as u8,
    ]))
}
