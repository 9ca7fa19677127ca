//! Two-line status display
//!
//! The panel is cleared and redrawn on every record. Drawing is
//! fire-and-forget: a failed redraw is reported to the sink like any other
//! destination error, and the next interval simply redraws again.

use core::convert::Infallible;
use core::fmt::{Debug, Write};

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use crate::error::SinkError;
use crate::record::{Line, MeasurementRecord, RecordFormat};
use crate::report::Destination;

pub const OLED_WIDTH: u32 = 128;
pub const OLED_HEIGHT: u32 = 64;

const FRAME_BYTES: usize = (OLED_WIDTH * OLED_HEIGHT / 8) as usize;

const LINE_X: i32 = 2;
const FIRST_LINE_Y: i32 = 16;
const LINE_PITCH: i32 = 20;
const MAX_LINES: usize = 2;

const WAITING_TEXT: &str = "Waiting for data";
const WAITING_POSITION: Point = Point::new(0, 29);

/// A monochrome panel that buffers drawing until [`Panel::show`].
pub trait Panel: DrawTarget<Color = BinaryColor> {
    fn show(&mut self) -> Result<(), Self::Error>;
}

/// Draws the first two readings of each record, one per line.
pub struct DisplaySink<P> {
    panel: P,
}

impl<P> DisplaySink<P>
where
    P: Panel,
    P::Error: Debug,
{
    pub fn new(panel: P) -> Self {
        Self { panel }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    fn redraw<'t>(&mut self, lines: impl Iterator<Item = (Point, &'t str)>) -> Result<(), SinkError> {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        self.panel.clear(BinaryColor::Off).map_err(draw_failed)?;
        for (position, text) in lines {
            Text::with_baseline(text, position, style, Baseline::Top)
                .draw(&mut self.panel)
                .map_err(draw_failed)?;
        }
        self.panel.show().map_err(draw_failed)
    }
}

fn draw_failed<E: Debug>(e: E) -> SinkError {
    log::error!("Display draw failed: {:?}", e);
    SinkError::Draw
}

impl<P> Destination for DisplaySink<P>
where
    P: Panel,
    P::Error: Debug,
{
    fn name(&self) -> &'static str {
        "display"
    }

    async fn write_header(&mut self, _format: &RecordFormat) -> Result<(), SinkError> {
        self.redraw(core::iter::once((WAITING_POSITION, WAITING_TEXT)))
    }

    async fn write_record(
        &mut self,
        _format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> Result<(), SinkError> {
        let mut lines: heapless::Vec<Line, MAX_LINES> = heapless::Vec::new();
        for reading in record.readings().iter().take(MAX_LINES) {
            let mut line = Line::new();
            write!(
                line,
                "{} : {:.2} {}",
                reading.quantity.label(),
                reading.value,
                reading.quantity.unit()
            )
            .map_err(|_| SinkError::LineOverflow)?;
            // Capacity equals `take`, so this cannot fail.
            let _ = lines.push(line);
        }

        self.redraw(lines.iter().enumerate().map(|(i, line)| {
            (
                Point::new(LINE_X, FIRST_LINE_Y + LINE_PITCH * i as i32),
                line.as_str(),
            )
        }))
    }
}

/// RAM frame for a 128x64 monochrome OLED.
///
/// Stands in for the panel on hosts, and backs panels whose driver flushes
/// a whole frame at once.
pub struct OledFrame {
    pixels: [u8; FRAME_BYTES],
    frames_shown: u32,
}

impl Default for OledFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl OledFrame {
    pub const fn new() -> Self {
        Self {
            pixels: [0; FRAME_BYTES],
            frames_shown: 0,
        }
    }

    pub fn is_lit(&self, x: u32, y: u32) -> bool {
        if x >= OLED_WIDTH || y >= OLED_HEIGHT {
            return false;
        }
        let index = (y * OLED_WIDTH + x) as usize;
        self.pixels[index / 8] & (1 << (index % 8)) != 0
    }

    /// Number of lit pixels in rows `rows.start..rows.end`.
    pub fn lit_in_rows(&self, rows: core::ops::Range<u32>) -> usize {
        rows.flat_map(|y| (0..OLED_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_lit(x, y))
            .count()
    }

    pub const fn frames_shown(&self) -> u32 {
        self.frames_shown
    }
}

impl OriginDimensions for OledFrame {
    fn size(&self) -> Size {
        Size::new(OLED_WIDTH, OLED_HEIGHT)
    }
}

impl DrawTarget for OledFrame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x >= OLED_WIDTH || y >= OLED_HEIGHT {
                continue;
            }
            let index = (y * OLED_WIDTH + x) as usize;
            let mask = 1 << (index % 8);
            if color.is_on() {
                self.pixels[index / 8] |= mask;
            } else {
                self.pixels[index / 8] &= !mask;
            }
        }
        Ok(())
    }
}

impl Panel for OledFrame {
    fn show(&mut self) -> Result<(), Infallible> {
        self.frames_shown += 1;
        Ok(())
    }
}
