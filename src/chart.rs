//! Minimal candlestick chart renderer
//!
//! The real deployment can plug any renderer behind `ChartRenderer`;
//! this built-in one emits a small self-contained SVG so the pipeline
//! works end to end without an image toolchain. Pixel fidelity is a
//! non-goal.

use crate::error::{Error, Result};
use crate::format::short_num;
use crate::metrics::TokenMetrics;
use crate::providers::{Bar, ChartRenderer};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 40.0;

pub struct SvgChartRenderer;

impl SvgChartRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, metrics: &TokenMetrics, bars: &[Bar]) -> Result<Vec<u8>> {
        if bars.is_empty() {
            return Err(Error::Chart("no bars to render".to_string()));
        }

        let lo = bars.iter().map(|b| b.l).fold(f64::INFINITY, f64::min);
        let hi = bars.iter().map(|b| b.h).fold(f64::NEG_INFINITY, f64::max);
        if !lo.is_finite() || !hi.is_finite() || hi <= 0.0 {
            return Err(Error::Chart("bars contain no usable prices".to_string()));
        }
        let span = if (hi - lo).abs() < f64::EPSILON {
            hi * 0.01
        } else {
            hi - lo
        };

        let plot_w = WIDTH - 2.0 * MARGIN;
        let plot_h = HEIGHT - 2.0 * MARGIN;
        let step = plot_w / bars.len() as f64;
        let body_w = (step * 0.7).max(1.0);
        let y = |price: f64| MARGIN + (hi - price) / span * plot_h;

        let mut svg = String::with_capacity(bars.len() * 160 + 512);
        svg.push_str(&format!(
            "<svg xmlns='http://www.w3.org/2000/svg' width='{}' height='{}'>\
             <rect width='100%' height='100%' fill='#0e1117'/>",
            WIDTH, HEIGHT
        ));
        svg.push_str(&format!(
            "<text x='{}' y='24' fill='#e6e6e6' font-size='16' font-family='monospace'>{} {} ${}</text>",
            MARGIN,
            metrics.symbol,
            metrics.chain,
            short_num(metrics.price_usd),
        ));

        for (i, bar) in bars.iter().enumerate() {
            let x = MARGIN + i as f64 * step + step / 2.0;
            let up = bar.c >= bar.o;
            let color = if up { "#26a69a" } else { "#ef5350" };
            let (body_top, body_bot) = if up { (bar.c, bar.o) } else { (bar.o, bar.c) };
            let body_h = (y(body_bot) - y(body_top)).max(1.0);
            svg.push_str(&format!(
                "<line x1='{x:.1}' y1='{:.1}' x2='{x:.1}' y2='{:.1}' stroke='{color}' stroke-width='1'/>",
                y(bar.h),
                y(bar.l),
            ));
            svg.push_str(&format!(
                "<rect x='{:.1}' y='{:.1}' width='{:.1}' height='{body_h:.1}' fill='{color}'/>",
                x - body_w / 2.0,
                y(body_top),
                body_w,
            ));
        }

        svg.push_str("</svg>");
        Ok(svg.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(t: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { t, o, h, l, c, v: 100.0 }
    }

    #[test]
    fn test_render_produces_svg() {
        let mut m = TokenMetrics::new("solana", "mint");
        m.symbol = "TEST".to_string();
        m.price_usd = Some(0.001);

        let bars = vec![
            bar(0, 1.0, 1.2, 0.9, 1.1),
            bar(60, 1.1, 1.3, 1.0, 1.05),
        ];
        let renderer = SvgChartRenderer::new();
        let bytes = renderer.render(&m, &bars).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("TEST"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_render_empty_bars_is_error() {
        let m = TokenMetrics::new("solana", "mint");
        let err = SvgChartRenderer::new().render(&m, &[]).unwrap_err();
        assert!(matches!(err, Error::Chart(_)));
    }

    #[test]
    fn test_render_flat_prices() {
        let m = TokenMetrics::new("solana", "mint");
        let bars = vec![bar(0, 1.0, 1.0, 1.0, 1.0); 5];
        assert!(SvgChartRenderer::new().render(&m, &bars).is_ok());
    }
}
