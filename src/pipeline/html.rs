//! HTML renderer: a transcode result as a single-line `<video>` embed.

use super::transcode::TranscodeResult;

/// Render the embed for `result`.
///
/// The wrapper `<div>` caps the box at the video's own size and centres it;
/// the `<video>` fills the wrapper. One `<source>` per variant, in order.
pub fn render_embed(result: &TranscodeResult, wrapper_class: &str) -> String {
    let sources: String = result
        .variants
        .iter()
        .map(|v| {
            format!(
                r#"<source src="{}" type="{}">"#,
                escape_attr(&v.src),
                v.format.mime_type()
            )
        })
        .collect();

    let html = format!(
        r#"<div class="{}" style="{}"><video autoplay loop muted preload playsinline style="{}">{}</video></div>"#,
        escape_attr(wrapper_class),
        wrapper_style(result.width, result.height),
        video_style(result.height),
        sources
    );
    html.replace(['\n', '\r'], "").trim().to_string()
}

fn wrapper_style(width: u32, height: u32) -> String {
    format!(
        "max-width: {width}px; max-height: {height}px; margin-left: auto; margin-right: auto;"
    )
}

fn video_style(height: u32) -> String {
    format!("height: 100%; width: 100%; margin: 0 auto; display: block; max-height: {height}px;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::pipeline::transcode::Variant;

    fn sample() -> TranscodeResult {
        TranscodeResult {
            width: 480,
            height: 270,
            variants: vec![
                Variant::new("/static/clip-a.webm", OutputFormat::Webm),
                Variant::new("/static/clip-b.mp4", OutputFormat::Mp4),
            ],
        }
    }

    #[test]
    fn renders_two_sources_in_order() {
        let html = render_embed(&sample(), "video-aspect-ratio");

        assert!(html.starts_with(r#"<div class="video-aspect-ratio""#));
        assert!(html.ends_with("</video></div>"));
        assert!(!html.contains('\n'));

        let webm = html.find(r#"<source src="/static/clip-a.webm" type="video/webm">"#);
        let mp4 = html.find(r#"<source src="/static/clip-b.mp4" type="video/mp4">"#);
        assert!(webm.unwrap() < mp4.unwrap());

        assert!(html.contains("max-width: 480px; max-height: 270px;"));
        assert_eq!(html.matches("max-height: 270px;").count(), 2);
        assert!(html.contains("<video autoplay loop muted preload playsinline"));
    }

    #[test]
    fn exact_markup() {
        let result = TranscodeResult {
            width: 640,
            height: 360,
            variants: vec![Variant::new("/v.mp4", OutputFormat::Mp4)],
        };
        assert_eq!(
            render_embed(&result, "vid"),
            concat!(
                r#"<div class="vid" style="max-width: 640px; max-height: 360px; margin-left: auto; margin-right: auto;">"#,
                r#"<video autoplay loop muted preload playsinline style="height: 100%; width: 100%; margin: 0 auto; display: block; max-height: 360px;">"#,
                r#"<source src="/v.mp4" type="video/mp4">"#,
                "</video></div>"
            )
        );
    }

    #[test]
    fn escapes_src() {
        let result = TranscodeResult {
            width: 2,
            height: 2,
            variants: vec![Variant::new(r#"/a"b&c.mp4"#, OutputFormat::Mp4)],
        };
        let html = render_embed(&result, "v");
        assert!(html.contains(r#"src="/a&quot;b&amp;c.mp4""#));
    }
}
