use anyhow::{Context, Result, anyhow};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::{ColorU8, Pixmap, PixmapPaint, Transform};
use usvg::{Options, Tree, fontdb};

use super::engine::{OverlayFrame, TextBox};
use super::{OverlayStyle, RegionKind};

/// Scale `image` to the frame size, then stack mask and text layer on top.
/// With `debug` every region box is outlined as well.
pub fn render_overlay(
    image: &DynamicImage,
    frame: &OverlayFrame,
    style: &OverlayStyle,
    debug: bool,
) -> Result<RgbaImage> {
    let scaled = image
        .resize_exact(frame.width, frame.height, FilterType::Triangle)
        .to_rgba8();
    let mut canvas = pixmap_from_rgba(&scaled)?;
    canvas.draw_pixmap(
        0,
        0,
        frame.mask.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    let svg = text_layer_svg(frame.width, frame.height, &frame.boxes, style, debug);
    let tree = parse_svg(&svg, style.font_metrics.as_ref().map(|metrics| metrics.data()))?;
    resvg::render(&tree, Transform::identity(), &mut canvas.as_mut());
    Ok(rgba_from_pixmap(&canvas))
}

/// Transparent SVG holding one centered `<text>` per box.
pub fn text_layer_svg(
    width: u32,
    height: u32,
    boxes: &[TextBox],
    style: &OverlayStyle,
    debug: bool,
) -> String {
    let font_family = style
        .font_metrics
        .as_ref()
        .and_then(|m| m.family())
        .or(style.font.family.as_deref());

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push('\n');

    for text_box in boxes {
        if text_box.lines.iter().all(|line| line.trim().is_empty()) {
            continue;
        }
        let x = fmt_px(text_box.center_x());
        let baselines = text_box.baselines();
        let family_attr = font_family
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-weight="{weight}" letter-spacing="{spacing}" fill="{color}" text-anchor="middle"{family}>"#,
            x = x,
            y = fmt_px(baselines[0]),
            size = fmt_px(text_box.font_size),
            weight = style.font.weight,
            spacing = fmt_px(style.font.letter_spacing_em * text_box.font_size),
            color = escape_xml(&style.text_color),
            family = family_attr
        ));
        for (line, baseline) in text_box.lines.iter().zip(baselines) {
            svg.push_str(&format!(
                r#"<tspan x="{x}" y="{y}">{text}</tspan>"#,
                x = x,
                y = fmt_px(baseline),
                text = escape_xml(line)
            ));
        }
        svg.push_str("</text>\n");
    }

    if debug {
        for text_box in boxes {
            let stroke = match text_box.kind() {
                RegionKind::Bubble => &style.bubble_outline_color,
                RegionKind::Outside => &style.outside_outline_color,
            };
            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="2"/>"#,
                x = fmt_px(text_box.rect.x),
                y = fmt_px(text_box.rect.y),
                w = fmt_px(text_box.rect.w),
                h = fmt_px(text_box.rect.h),
                stroke = escape_xml(stroke)
            ));
            svg.push('\n');
        }
    }

    svg.push_str("</svg>");
    svg
}

pub fn encode_image(image: &RgbaImage, output_mime: &str) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let dynamic = if format == image::ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(dynamic.to_rgb8())
    } else {
        dynamic
    };
    let mut bytes = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut bytes), format)
        .with_context(|| "failed to encode overlay image")?;
    Ok(bytes)
}

pub fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" => Some(image::ImageFormat::Jpeg),
        "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn parse_svg(svg: &str, font_data: Option<&[u8]>) -> Result<Tree> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    Tree::from_str(svg, &options).with_context(|| "failed to parse text layer SVG")
}

fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())
        .ok_or_else(|| anyhow!("empty overlay surface"))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn rgba_from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = image::Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

/// Two decimals at most, trailing zeros dropped.
fn fmt_px(value: f32) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{
        FitPolicy, FontStyle, HeuristicMeasurer, LayoutConfig, OverlayEngine, Panel, Region,
        RegionBox,
    };

    fn frame_for(panels: Vec<Panel>, natural: (u32, u32), display: f32) -> OverlayFrame {
        let mut engine = OverlayEngine::new(
            LayoutConfig::default(),
            FontStyle::default(),
            FitPolicy::Independent,
        );
        engine.load_image(natural.0, natural.1);
        engine.resize_display(display);
        engine.set_panels(panels);
        engine.compute(&HeuristicMeasurer).expect("frame")
    }

    #[test]
    fn mask_covers_scaled_page() {
        let panels = vec![Panel {
            bubbles: vec![Region::bubble(
                RegionBox::new(0.0, 0.0, 100.0, 100.0).expect("bbox"),
                "",
            )],
            outside: Vec::new(),
        }];
        let frame = frame_for(panels, (200, 200), 100.0);
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            200,
            image::Rgba([200, 0, 0, 255]),
        ));
        let out = render_overlay(&page, &frame, &OverlayStyle::default(), false).expect("render");
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(25, 25).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(90, 90).0, [200, 0, 0, 255]);
    }

    #[test]
    fn debug_outlines_every_box() {
        let bbox = RegionBox::new(10.0, 10.0, 60.0, 40.0).expect("bbox");
        let panels = vec![Panel {
            bubbles: vec![Region::bubble(bbox, "")],
            outside: vec![Region::outside(bbox, "")],
        }];
        let frame = frame_for(panels, (100, 100), 100.0);
        let style = OverlayStyle::default();
        let svg = text_layer_svg(100, 100, &frame.boxes, &style, true);
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains(r##"stroke="#00c853""##));
        assert!(svg.contains(r##"stroke="#ff6d00""##));
        assert!(!svg.contains("<text"));
        assert!(!text_layer_svg(100, 100, &frame.boxes, &style, false).contains("<rect"));
    }

    #[test]
    fn text_is_escaped() {
        let bbox = RegionBox::new(0.0, 0.0, 300.0, 100.0).expect("bbox");
        let panels = vec![Panel {
            bubbles: vec![Region::bubble(bbox, "Tom & \"Jerry\" <3")],
            outside: Vec::new(),
        }];
        let frame = frame_for(panels, (300, 100), 300.0);
        let svg = text_layer_svg(300, 100, &frame.boxes, &OverlayStyle::default(), false);
        assert!(svg.contains("Tom &amp; &quot;Jerry&quot; &lt;3"));
        Tree::from_str(&svg, &Options::default()).expect("valid svg");
    }

    #[test]
    fn encodes_png_and_jpeg() {
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
        let png = encode_image(&image, "image/png").expect("png");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert!(!encode_image(&image, "image/jpeg").expect("jpeg").is_empty());
        assert!(encode_image(&image, "text/plain").is_err());
    }

    #[test]
    fn px_formatting_is_compact() {
        assert_eq!(fmt_px(22.0), "22");
        assert_eq!(fmt_px(-0.2), "-0.2");
        assert_eq!(fmt_px(7.126), "7.13");
        assert_eq!(fmt_px(-0.001), "0");
    }
}
