// ============================================================================
// PicForge CLI — headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   picforge --input photo.png --recipe edit.json --output result.png
//   picforge -i photo.jpg -o out.png                  (format inferred from output ext)
//   picforge -i "*.jpg" --filter mono --output-dir processed/ --format png
//   picforge -i subject.png --mask mask.png --background beach.jpg \
//            --harmonize --light-wrap -o composite.jpg
//
// All processing runs synchronously on the current thread.
// ============================================================================

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::compositor;
use crate::editor::{Recipe, RenderPipeline, RenderTarget};
use crate::error::EngineError;
use crate::io::{self, SaveFormat};
use crate::ops::filters::FilterId;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PicForge headless image processor.
///
/// Apply stored edit recipes, look filters, and mask compositing to image
/// files without a GUI.
#[derive(Parser, Debug)]
#[command(
    name = "picforge",
    about = "PicForge headless batch image processor",
    long_about = "Apply edit recipes (tone, geometry, crop, filter) to image files and\n\
                  composite subjects onto new backgrounds through a segmentation mask.\n\n\
                  Example:\n  \
                  picforge --input photo.png --recipe edit.json --output result.png\n  \
                  picforge -i \"*.jpg\" --filter vintage --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Recipe JSON file (tone + geometry + filter) to apply to each input.
    #[arg(short, long, value_name = "EDIT.json")]
    pub recipe: Option<PathBuf>,

    /// Look filter id (e.g. mono, vintage, halo). Overrides the recipe's.
    #[arg(long, value_name = "ID")]
    pub filter: Option<String>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Single-channel mask image: composites the rendered input (foreground)
    /// onto --background through this mask.
    #[arg(long, value_name = "MASK")]
    pub mask: Option<PathBuf>,

    /// Background image for mask compositing. Requires --mask.
    #[arg(long, value_name = "IMAGE")]
    pub background: Option<PathBuf>,

    /// Erode + smooth the mask edge before compositing.
    #[arg(long)]
    pub refine_mask: bool,

    /// Nudge the foreground's color statistics toward the background's.
    #[arg(long)]
    pub harmonize: bool,

    /// Bleed blurred background light into the foreground edge band.
    #[arg(long)]
    pub light_wrap: bool,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if args.background.is_some() != args.mask.is_some() {
        eprintln!("error: --background and --mask must be given together.");
        return ExitCode::FAILURE;
    }

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    // Load the recipe once, up front
    let mut recipe = match &args.recipe {
        Some(path) => match load_recipe(path) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Recipe::default(),
    };
    if let Some(id) = &args.filter {
        recipe.filter = FilterId::parse(id);
    }

    // Create output directory if specified
    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &recipe, &args, save_format) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Process a single input file end to end.
fn run_one(
    input: &Path,
    output: &Path,
    recipe: &Recipe,
    args: &CliArgs,
    format: SaveFormat,
) -> Result<(), EngineError> {
    let mut pipeline = RenderPipeline::load(input)?;
    pipeline.apply_recipe(recipe);
    let mut rendered = pipeline.render(RenderTarget::Final, true);

    // Optional mask compositing onto a new background
    if let (Some(mask_path), Some(bg_path)) = (&args.mask, &args.background) {
        let mut mask = io::decode_mask(mask_path)?;
        mask = compositor::resample_mask(&mask, rendered.width(), rendered.height());
        if args.refine_mask {
            mask = compositor::refine_mask(&mask);
        }

        let bg = io::decode(bg_path)?;
        if args.harmonize {
            rendered = compositor::harmonize(&rendered, &bg, compositor::HARMONIZE_STRENGTH);
        }
        let mut composite = compositor::blend(&rendered, &mask, &bg);
        if args.light_wrap {
            composite =
                compositor::light_wrap(&composite, &mask, &bg, compositor::LIGHT_WRAP_STRENGTH);
        }
        rendered = composite;
    }

    io::encode(&rendered, output, format, args.quality)
}

// ============================================================================
// Helpers
// ============================================================================

fn load_recipe(path: &Path) -> Result<Recipe, EngineError> {
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EngineError::Recipe {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand glob patterns and literal paths into a concrete file list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        if let Ok(paths) = glob::glob(pattern) {
            for path in paths.flatten() {
                if path.is_file() {
                    files.push(path);
                    matched = true;
                }
            }
        }
        // A literal path with glob metacharacters in its name still works
        if !matched {
            let literal = PathBuf::from(pattern);
            if literal.is_file() {
                files.push(literal);
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn parse_format(flag: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(name) = flag
        && let Some(f) = SaveFormat::from_extension(name)
    {
        return f;
    }
    if let Some(path) = output
        && let Some(ext) = path.extension().and_then(|e| e.to_str())
        && let Some(f) = SaveFormat::from_extension(ext)
    {
        return f;
    }
    SaveFormat::Png
}

fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(dir) = output_dir {
        let stem = input.file_stem()?;
        let mut name = PathBuf::from(stem);
        name.set_extension(format.extension());
        return Some(dir.join(name));
    }
    if let Some(path) = output {
        return Some(path.to_path_buf());
    }
    // Neither given: write next to the input with a suffix
    let stem = input.file_stem()?.to_string_lossy();
    let mut path = input.to_path_buf();
    path.set_file_name(format!("{}_edited.{}", stem, format.extension()));
    Some(path)
}
