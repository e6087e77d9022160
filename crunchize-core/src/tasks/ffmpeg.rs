//! video encoding: a thin shell over `ffmpeg`, supporting a printf-style
//! glob/sequence input or an explicit file list via the concat demuxer.
//! Ported from `FFmpegTask`.

use serde_json::{Map, Value};

use crate::errors::{ConfigError, OperationError};
use crate::registry::Task;
use crate::tasks::common::{ensure_parent_dir, existing_mode, get_str, get_u64, with_forced_extension, Existing};

const TOOL: &str = "ffmpeg";

pub struct FfmpegTask;

enum InputMode {
    Glob(String),
    Concat(String),
}

impl Task for FfmpegTask {
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ConfigError> {
        if args.get("output_path").is_none() {
            return Err(ConfigError::MissingArg {
                task: "ffmpeg".to_string(),
                arg: "output_path".to_string(),
            });
        }
        if args.get("input_path").is_none() && args.get("input_files").is_none() {
            return Err(ConfigError::MissingArg {
                task: "ffmpeg".to_string(),
                arg: "input_path".to_string(),
            });
        }
        existing_mode(args, "ffmpeg")?;
        Ok(())
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<Value, OperationError> {
        let mut output_path = args["output_path"].as_str().unwrap().to_string();
        if let Some(container) = get_str(args, "container") {
            output_path = with_forced_extension(&output_path, container);
        }

        let existing = existing_mode(args, "ffmpeg").unwrap_or(Existing::Replace);
        if existing == Existing::Skip && std::path::Path::new(&output_path).exists() {
            tracing::info!(output_path, "skipping ffmpeg: output already exists");
            return Ok(Value::String(output_path));
        }
        let replace = existing == Existing::Replace;

        ensure_parent_dir(&output_path, dry_run)?;

        let framerate = get_u64(args, "fps")
            .or_else(|| get_u64(args, "framerate"))
            .unwrap_or(24);
        let start_frame = get_u64(args, "start_frame");
        let codec = get_str(args, "codec");
        let extra_args = extra_args_of(args);

        let list_file_path = format!("{output_path}.filelist.txt");
        let input_mode = match args.get("input_files") {
            Some(Value::Array(files)) if !files.is_empty() => {
                if !dry_run {
                    let body: String = files
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|p| format!("file '{p}'\n"))
                        .collect();
                    std::fs::write(&list_file_path, body)?;
                }
                InputMode::Concat(list_file_path.clone())
            }
            _ => {
                let input_path = args["input_path"].as_str().unwrap_or_default().to_string();
                InputMode::Glob(input_path)
            }
        };

        let argv = build_argv(replace, &input_mode, framerate, start_frame, codec, &extra_args, &output_path);

        if dry_run {
            tracing::info!(cmd = %argv.join(" "), "dry-run: would execute");
            return Ok(Value::String(output_path));
        }

        let result = crate::tasks::common::run_tool(TOOL, &argv);
        if result.is_ok() && std::path::Path::new(&list_file_path).exists() {
            let _ = std::fs::remove_file(&list_file_path);
        }
        result?;
        Ok(Value::String(output_path))
    }
}

fn extra_args_of(args: &Map<String, Value>) -> Vec<String> {
    match args.get("extra_args") {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn build_argv(
    replace: bool,
    input_mode: &InputMode,
    framerate: u64,
    start_frame: Option<u64>,
    codec: Option<&str>,
    extra_args: &[String],
    output_path: &str,
) -> Vec<String> {
    let mut argv = Vec::new();
    if replace {
        argv.push("-y".to_string());
    }

    match input_mode {
        InputMode::Concat(list_file) => {
            argv.extend([
                "-f".to_string(),
                "concat".to_string(),
                "-safe".to_string(),
                "0".to_string(),
                "-r".to_string(),
                framerate.to_string(),
                "-i".to_string(),
                list_file.clone(),
            ]);
        }
        InputMode::Glob(input_path) => {
            if let Some(sf) = start_frame {
                argv.push("-start_number".to_string());
                argv.push(sf.to_string());
            }
            argv.extend([
                "-framerate".to_string(),
                framerate.to_string(),
                "-i".to_string(),
                input_path.clone(),
            ]);
        }
    }

    let extra_has = |flag: &str| extra_args.iter().any(|a| a == flag);
    let codec = if codec.is_none() && !extra_has("-c:v") && !extra_has("-vcodec") {
        Some("libx264")
    } else {
        codec
    };

    if let Some(codec) = codec {
        argv.push("-c:v".to_string());
        argv.push(codec.to_string());
        if codec == "libx264" && !extra_has("-pix_fmt") {
            argv.push("-pix_fmt".to_string());
            argv.push("yuv420p".to_string());
        }
        if codec == "libx264" && !extra_has("-vf") {
            // libx264 rejects odd frame dimensions; pad to the nearest even size.
            argv.push("-vf".to_string());
            argv.push("scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string());
        }
    }

    argv.extend(extra_args.iter().cloned());
    argv.push(output_path.to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn glob_mode_with_start_frame_and_default_codec() {
        let argv = build_argv(
            true,
            &InputMode::Glob("/in/shot.%04d.exr".to_string()),
            24,
            Some(1001),
            None,
            &[],
            "/out.mp4",
        );
        assert_eq!(
            argv,
            vec![
                "-y",
                "-start_number",
                "1001",
                "-framerate",
                "24",
                "-i",
                "/in/shot.%04d.exr",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-vf",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "/out.mp4",
            ]
        );
    }

    #[test]
    fn concat_mode_uses_list_file() {
        let argv = build_argv(
            false,
            &InputMode::Concat("/out.mp4.filelist.txt".to_string()),
            30,
            None,
            Some("prores"),
            &[],
            "/out.mov",
        );
        assert_eq!(
            argv,
            vec![
                "-f",
                "concat",
                "-safe",
                "0",
                "-r",
                "30",
                "-i",
                "/out.mp4.filelist.txt",
                "-c:v",
                "prores",
                "/out.mov",
            ]
        );
    }
}
