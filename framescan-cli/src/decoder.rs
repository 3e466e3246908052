//! QR detection with `rqrr`.

use framescan_core::{DecodedSymbol, Decoder, DecoderFault, PixelBuffer, Point};
use rqrr::PreparedImage;
use tracing::trace;

/// Finds the first decodable QR code in a frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl Decoder for QrDecoder {
    fn decode(&mut self, frame: &PixelBuffer) -> Result<Option<DecodedSymbol>, DecoderFault> {
        let (width, height) = (frame.width as usize, frame.height as usize);
        if frame.data.len() < frame.byte_len() {
            return Err(DecoderFault(format!(
                "frame holds {} bytes, expected {}",
                frame.data.len(),
                frame.byte_len()
            )));
        }

        let mut prepared = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            frame.luma(x as u32, y as u32)
        });
        let grids = prepared.detect_grids();
        trace!(candidates = grids.len(), "qr grids detected");

        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => {
                    // rqrr orders bounds clockwise from the top-left finder.
                    let corner_points = grid
                        .bounds
                        .map(|p| Point::new(p.x as f64, p.y as f64));
                    return Ok(Some(DecodedSymbol {
                        raw_value: content,
                        format: "qr_code".into(),
                        corner_points,
                    }));
                }
                Err(e) => trace!("grid decode failed: {e:?}"),
            }
        }
        Ok(None)
    }
}
