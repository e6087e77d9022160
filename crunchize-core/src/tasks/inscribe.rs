//! overlay/slate: composes text and image overlays onto a frame (`burnin`)
//! or a fresh black canvas (`slate`) via `oiiotool`'s `--text`/`--paste`
//! compositing primitives. Ported from `InscribeTask`.

use std::str::FromStr;

use serde_json::{Map, Value};
use strum::EnumString;

use crate::errors::{ConfigError, OperationError};
use crate::pathinfer::{resolve_path, Direction};
use crate::registry::Task;
use crate::sequence;
use crate::tasks::common::{ensure_parent_dir, existing_mode, get_str, get_u64, run_tool, Existing};
use crate::template;

const TOOL: &str = "oiiotool";

pub struct InscribeTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
enum Anchor {
    #[strum(serialize = "top-left")]
    TopLeft,
    #[strum(serialize = "top-right")]
    TopRight,
    #[strum(serialize = "bottom-left")]
    BottomLeft,
    #[strum(serialize = "bottom-right")]
    BottomRight,
    #[strum(serialize = "top")]
    Top,
    #[strum(serialize = "bottom")]
    Bottom,
    #[strum(serialize = "left")]
    Left,
    #[strum(serialize = "right")]
    Right,
    #[strum(serialize = "center")]
    Center,
}

impl Anchor {
    fn parse(s: &str) -> Anchor {
        Anchor::from_str(s).unwrap_or(Anchor::BottomLeft)
    }

    fn has_left(self) -> bool {
        matches!(self, Anchor::TopLeft | Anchor::BottomLeft | Anchor::Left)
    }

    fn has_right(self) -> bool {
        matches!(self, Anchor::TopRight | Anchor::BottomRight | Anchor::Right)
    }

    fn has_top(self) -> bool {
        matches!(self, Anchor::TopLeft | Anchor::TopRight | Anchor::Top)
    }

    fn has_bottom(self) -> bool {
        matches!(self, Anchor::BottomLeft | Anchor::BottomRight | Anchor::Bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Alignment {
    Start,
    Center,
    End,
}

impl Alignment {
    fn parse(s: &str) -> Alignment {
        Alignment::from_str(s).unwrap_or(Alignment::Start)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Draw {
    Text { x: i64, y: i64, size: i64, text: String },
    Image { x: i64, y: i64, size: i64, path: String },
}

impl Task for InscribeTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        if args.get("groups").is_none() {
            return Err(ConfigError::MissingArg {
                task: "inscribe".to_string(),
                arg: "groups".to_string(),
            });
        }
        let kind = get_str(args, "type").unwrap_or("burnin");
        if kind == "burnin" && args.get("input_path").is_none() && args.get("item").is_none() {
            return Err(ConfigError::MissingArg {
                task: "inscribe".to_string(),
                arg: "input_path".to_string(),
            });
        }
        if args.get("output_path").is_none() {
            return Err(ConfigError::MissingArg {
                task: "inscribe".to_string(),
                arg: "output_path".to_string(),
            });
        }
        existing_mode(args, "inscribe")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let kind = get_str(args, "type").unwrap_or("burnin").to_string();
        let width = get_u64(args, "width").unwrap_or(1920);
        let height = get_u64(args, "height").unwrap_or(1080);

        let mut output_path = args["output_path"].as_str().unwrap().to_string();
        if kind == "slate" {
            output_path = force_frame_zero(&output_path);
        }

        let existing = existing_mode(args, "inscribe").unwrap_or(Existing::Replace);
        if existing == Existing::Skip && std::path::Path::new(&output_path).exists() {
            tracing::info!(output_path, "skipping inscribe: output already exists");
            return Ok(Value::String(output_path));
        }

        ensure_parent_dir(&output_path, dry_run)?;

        let ctx = build_frame_context(args);
        let Value::Array(groups) = args.get("groups").cloned().unwrap_or(Value::Array(vec![])) else {
            return Err(OperationError::Io("inscribe: groups must be an array".to_string()));
        };

        let mut draws = Vec::new();
        for group in &groups {
            draws.extend(render_group(group, width as f64, height as f64, &ctx));
        }

        let input_path = if kind == "burnin" {
            get_str(args, "input_path")
                .map(str::to_string)
                .or_else(|| args.get("item").map(|i| resolve_path(i, Direction::Input)))
                .filter(|s| !s.is_empty())
        } else {
            None
        };

        let argv = build_argv(&kind, width, height, input_path.as_deref(), &draws, &output_path);

        if dry_run {
            tracing::info!(cmd = %argv.join(" "), "dry-run: would execute");
            return Ok(prepend_slate(&kind, args, output_path));
        }

        run_tool(TOOL, &argv)?;
        Ok(prepend_slate(&kind, args, output_path))
    }
}

/// In `slate` mode, when the task is fed a sequence, the rendered slate is
/// prepended to the `input_files` list so the result flows straight into a
/// video encoder.
fn prepend_slate(kind: &str, args: &Map<String, Value>, output_path: String) -> Value {
    if kind != "slate" {
        return Value::String(output_path);
    }
    match args.get("input_files") {
        Some(Value::Array(files)) if !files.is_empty() => {
            let mut out = vec![Value::String(output_path)];
            out.extend(files.iter().cloned());
            Value::Array(out)
        }
        _ => Value::String(output_path),
    }
}

fn force_frame_zero(path: &str) -> String {
    match sequence::match_frame(
        std::path::Path::new(path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(path),
    ) {
        Some(m) => {
            let dir = std::path::Path::new(path).parent();
            let name = format!("{}{}0000{}", m.stem, m.separator, m.extension);
            match dir {
                Some(d) if !d.as_os_str().is_empty() => d.join(name).to_string_lossy().into_owned(),
                _ => name,
            }
        }
        None => path.to_string(),
    }
}

/// Extracts the VFX frame number (`.NNNN.ext` or `_NNNN.ext`, falling back to
/// the last run of digits before the extension) out of whatever path an item
/// resolves to. Returns 0 when no frame-shaped path is found.
fn frame_number_of(item: &Value) -> i64 {
    let path = resolve_path(item, Direction::Input);
    if path.is_empty() {
        return 0;
    }
    let filename = std::path::Path::new(&path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&path);
    match sequence::match_frame(filename) {
        Some(m) => m.frame,
        None => 0,
    }
}

/// Builds the text-template context for group rendering: `frame`/`filename`/
/// `basename` derived from the resolved `item` (or the first of `items` in
/// batch/slate mode), `index`/`total` passed through as-is, and
/// `first_frame`/`last_frame` derived the same way from `first_item`/
/// `last_item`. Ported from `InscribeTask._get_frame_context`.
fn build_frame_context(args: &Map<String, Value>) -> Map<String, Value> {
    let mut ctx = Map::new();
    if let Some(Value::Object(vars)) = args.get("_variables") {
        for (k, v) in vars {
            ctx.insert(k.clone(), v.clone());
        }
    }

    let item = args.get("item").cloned().or_else(|| match args.get("items") {
        Some(Value::Array(items)) => items.first().cloned(),
        _ => None,
    });

    if let Some(item) = &item {
        let path = resolve_path(item, Direction::Input);
        let filename = std::path::Path::new(&path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let basename = match sequence::match_frame(&filename) {
            Some(m) => m.stem,
            None => std::path::Path::new(&filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&filename)
                .to_string(),
        };
        ctx.insert("frame".to_string(), Value::from(frame_number_of(item)));
        ctx.insert("filename".to_string(), Value::String(filename));
        ctx.insert("basename".to_string(), Value::String(basename));
    }

    ctx.insert("index".to_string(), args.get("index").cloned().unwrap_or(Value::from(0)));
    ctx.insert("total".to_string(), args.get("total").cloned().unwrap_or(Value::from(1)));

    if let Some(first_item) = args.get("first_item") {
        ctx.insert("first_frame".to_string(), Value::from(frame_number_of(first_item)));
    }
    if let Some(last_item) = args.get("last_item") {
        ctx.insert("last_frame".to_string(), Value::from(frame_number_of(last_item)));
    }

    if let Some(Value::Object(item)) = &item {
        for (k, v) in item {
            ctx.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    ctx
}

fn render_text(template_str: &str, ctx: &Map<String, Value>) -> String {
    match template::resolve(&Value::String(template_str.to_string()), ctx) {
        Value::String(s) => s,
        other => serde_json::to_string(&other).unwrap_or_default(),
    }
}

struct RenderedItem {
    size: i64,
    kind: ItemKind,
}

enum ItemKind {
    Text(String),
    Image(String),
}

/// Lays a group's items out relative to an anchor point. Computes the
/// group's total bounding box first, then derives the anchor origin from it
/// so right/bottom-anchored content stays on-canvas — matching
/// `InscribeTask._render_group`'s two-pass (measure, then place) approach.
/// Text/image sizing is approximated as a `size` fraction of the canvas
/// width on both axes (no real font metrics are available to this
/// oiiotool-backed shell), same as `_render_group`'s `size_px` basis.
fn render_group(group: &Value, canvas_w: f64, canvas_h: f64, ctx: &Map<String, Value>) -> Vec<Draw> {
    let Some(group) = group.as_object() else { return Vec::new() };
    let anchor = Anchor::parse(group.get("anchor").and_then(Value::as_str).unwrap_or("bottom-left"));
    let layout = match group.get("layout").and_then(Value::as_str) {
        Some("horizontal") => Layout::Horizontal,
        _ => Layout::Vertical,
    };
    let alignment = Alignment::parse(group.get("alignment").and_then(Value::as_str).unwrap_or("start"));
    let padding_frac = group.get("padding").and_then(Value::as_f64).unwrap_or(0.02);
    let padding = padding_frac * canvas_w;

    let items = match group.get("items") {
        Some(Value::Array(items)) => items,
        _ => return Vec::new(),
    };

    let rendered: Vec<RenderedItem> = items
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            let size_frac = item.get("size").and_then(Value::as_f64).unwrap_or(0.03);
            let size = (size_frac * canvas_w).round() as i64;
            let kind = match item.get("text") {
                Some(Value::String(tmpl)) => ItemKind::Text(render_text(tmpl, ctx)),
                _ => {
                    let Some(Value::String(tmpl)) = item.get("source") else { return None };
                    ItemKind::Image(render_text(tmpl, ctx))
                }
            };
            Some(RenderedItem { size, kind })
        })
        .collect();

    if rendered.is_empty() {
        return Vec::new();
    }

    let n = rendered.len() as f64;
    let (group_w, group_h) = match layout {
        Layout::Vertical => (
            rendered.iter().map(|i| i.size).max().unwrap_or(0) as f64,
            rendered.iter().map(|i| i.size as f64).sum::<f64>() + padding * (n - 1.0),
        ),
        Layout::Horizontal => (
            rendered.iter().map(|i| i.size as f64).sum::<f64>() + padding * (n - 1.0),
            rendered.iter().map(|i| i.size).max().unwrap_or(0) as f64,
        ),
    };

    let gx = if anchor.has_left() {
        padding
    } else if anchor.has_right() {
        canvas_w - group_w - padding
    } else {
        (canvas_w - group_w) / 2.0
    };
    let gy = if anchor.has_top() {
        padding
    } else if anchor.has_bottom() {
        canvas_h - group_h - padding
    } else {
        (canvas_h - group_h) / 2.0
    };

    let mut draws = Vec::new();
    let mut cx = gx;
    let mut cy = gy;

    for item in &rendered {
        let size = item.size as f64;
        let (x, y) = match layout {
            Layout::Vertical => {
                let dx = match alignment {
                    Alignment::Start => gx,
                    Alignment::Center => gx + (group_w - size) / 2.0,
                    Alignment::End => gx + (group_w - size),
                };
                (dx, cy)
            }
            Layout::Horizontal => {
                let dy = match alignment {
                    Alignment::Start => gy,
                    Alignment::Center => gy + (group_h - size) / 2.0,
                    Alignment::End => gy + (group_h - size),
                };
                (cx, dy)
            }
        };

        match &item.kind {
            ItemKind::Text(text) => draws.push(Draw::Text {
                x: x.round() as i64,
                y: y.round() as i64,
                size: item.size,
                text: text.clone(),
            }),
            ItemKind::Image(path) => draws.push(Draw::Image {
                x: x.round() as i64,
                y: y.round() as i64,
                size: item.size,
                path: path.clone(),
            }),
        }

        match layout {
            Layout::Vertical => cy += size + padding,
            Layout::Horizontal => cx += size + padding,
        }
    }

    draws
}

fn build_argv(kind: &str, width: u64, height: u64, input_path: Option<&str>, draws: &[Draw], output: &str) -> Vec<String> {
    let mut argv = Vec::new();
    if kind == "slate" {
        argv.push("--create".to_string());
        argv.push(format!("{width}x{height}"));
        argv.push("4".to_string());
    } else if let Some(input) = input_path {
        argv.push(input.to_string());
    }

    for draw in draws {
        match draw {
            Draw::Text { x, y, size, text } => {
                argv.push(format!("--text:x={x}:y={y}:size={size}:color=1,1,1,1"));
                argv.push(text.clone());
            }
            Draw::Image { x, y, size, path } => {
                argv.push(path.clone());
                argv.push("--resize".to_string());
                argv.push(format!("{size}x{size}"));
                argv.push("--paste".to_string());
                argv.push(format!("+{x}+{y}"));
            }
        }
    }

    argv.push("-o".to_string());
    argv.push(output.to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn slate_mode_creates_black_canvas() {
        let argv = build_argv("slate", 1920, 1080, None, &[], "/out.exr");
        assert_eq!(argv[..3], ["--create".to_string(), "1920x1080".to_string(), "4".to_string()]);
        assert_eq!(argv.last().unwrap(), "/out.exr");
    }

    #[test]
    fn burnin_mode_starts_from_input_frame() {
        let argv = build_argv("burnin", 1920, 1080, Some("/in.exr"), &[], "/out.exr");
        assert_eq!(argv[0], "/in.exr");
    }

    #[test]
    fn text_draw_emits_text_directive() {
        let draws = vec![Draw::Text { x: 10, y: 20, size: 32, text: "hello".to_string() }];
        let argv = build_argv("burnin", 1920, 1080, Some("/in.exr"), &draws, "/out.exr");
        assert_eq!(argv[1], "--text:x=10:y=20:size=32:color=1,1,1,1");
        assert_eq!(argv[2], "hello");
    }

    #[test]
    fn single_item_bottom_left_group_anchors_at_origin() {
        let group = json!({
            "anchor": "bottom-left",
            "layout": "vertical",
            "padding": 0.0,
            "alignment": "start",
            "items": [{"text": "shotA", "size": 0.05}],
        });
        let ctx = Map::new();
        let draws = render_group(&group, 1000.0, 1000.0, &ctx);
        assert_eq!(draws.len(), 1);
        match &draws[0] {
            Draw::Text { x, y, size, text } => {
                assert_eq!(*x, 0);
                assert_eq!(*y, 1000 - size);
                assert_eq!(text, "shotA");
            }
            _ => panic!("expected text draw"),
        }
    }

    #[test]
    fn top_right_group_with_default_alignment_stays_on_canvas() {
        let group = json!({
            "anchor": "top-right",
            "layout": "vertical",
            "padding": 0.0,
            "items": [{"text": "v1.2.3", "size": 0.05}],
        });
        let ctx = Map::new();
        let draws = render_group(&group, 1000.0, 1000.0, &ctx);
        assert_eq!(draws.len(), 1);
        match &draws[0] {
            Draw::Text { x, y, size, .. } => {
                assert_eq!(*x, 1000 - size);
                assert_eq!(*y, 0);
            }
            _ => panic!("expected text draw"),
        }
    }

    #[test]
    fn force_frame_zero_rewrites_frame_number() {
        assert_eq!(force_frame_zero("/out/shot.1001.exr"), "/out/shot.0000.exr");
    }

    #[test]
    fn render_text_resolves_template_against_context() {
        let mut ctx = Map::new();
        ctx.insert("frame".to_string(), json!(1001));
        assert_eq!(render_text("frame {{ frame }}", &ctx), "frame 1001");
    }

    #[test]
    fn frame_context_derives_frame_and_names_from_item() {
        let mut args = Map::new();
        args.insert("item".to_string(), json!("/seq/shot.1001.exr"));
        args.insert("first_item".to_string(), json!("/seq/shot.1000.exr"));
        args.insert("last_item".to_string(), json!("/seq/shot.1010.exr"));
        let ctx = build_frame_context(&args);
        assert_eq!(ctx["frame"], json!(1001));
        assert_eq!(ctx["filename"], json!("shot.1001.exr"));
        assert_eq!(ctx["basename"], json!("shot"));
        assert_eq!(ctx["first_frame"], json!(1000));
        assert_eq!(ctx["last_frame"], json!(1010));
    }

    #[test]
    fn frame_context_falls_back_to_first_of_items_in_batch_mode() {
        let mut args = Map::new();
        args.insert("items".to_string(), json!(["/seq/shot.0050.exr", "/seq/shot.0051.exr"]));
        let ctx = build_frame_context(&args);
        assert_eq!(ctx["frame"], json!(50));
        assert_eq!(ctx["filename"], json!("shot.0050.exr"));
    }
}
