// pagesmith - content compiler for banked adventure page images
// Compiles a project manifest into page images, chapter headers and name tables

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use pagesmith::content_compiler::project::Project;
use pagesmith::content_compiler::{ChapterImage, CompiledProject, ContentCompiler};

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut output_dir = PathBuf::from(".");
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -o requires a directory");
                    process::exit(1);
                }
                output_dir = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple project files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No project file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let project = match Project::load(Path::new(input_file)) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("Error loading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    if verbose {
        println!(
            "Compiling {} ({} chapters) -> {}",
            input_file,
            project.chapters.len(),
            output_dir.display()
        );
    }

    let compiler = ContentCompiler::new(project.config.clone());
    let compiled = match compiler.compile(&project) {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("Compilation error: {}", err);
            process::exit(1);
        }
    };

    for chapter in &compiled.chapters {
        if !chapter.diagnostics.is_empty() {
            eprintln!("Chapter {}:", chapter.suffix);
            eprint!("{}", chapter.diagnostics);
        }
    }

    if let Err(err) = write_outputs(&compiled, &output_dir, project.config.page_size, verbose) {
        eprintln!("Error writing to '{}': {}", output_dir.display(), err);
        process::exit(1);
    }
}

fn write_outputs(
    compiled: &CompiledProject,
    dir: &Path,
    page_size: usize,
    verbose: bool,
) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join("huffdict.bin"), compiled.code_table.to_bytes())?;

    for chapter in &compiled.chapters {
        write_chapter(chapter, dir, page_size)?;
        if verbose {
            let used: usize = chapter.pages.iter().map(|p| p.used()).sum();
            println!(
                "Chapter {}: {} pages, {} bytes used, {} labels",
                chapter.suffix,
                chapter.pages.len(),
                used,
                chapter.resolution.len()
            );
        }
    }
    Ok(())
}

fn write_chapter(chapter: &ChapterImage, dir: &Path, page_size: usize) -> std::io::Result<()> {
    let suffix = &chapter.suffix;

    let mut pages = Vec::with_capacity(chapter.pages.len() * page_size);
    for page in &chapter.pages {
        pages.extend(page.image(page_size));
    }
    fs::write(dir.join(format!("{}_pages.bin", suffix)), pages)?;
    fs::write(dir.join(format!("{}_header.bin", suffix)), &chapter.header)?;
    fs::write(dir.join(format!("{}_directions.bin", suffix)), &chapter.direction_names)?;
    fs::write(dir.join(format!("{}_commands.bin", suffix)), &chapter.command_names)?;
    fs::write(dir.join(format!("{}_labels.txt", suffix)), chapter.resolution.listing())?;
    Ok(())
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <project.toml>", program_name);
    println!();
    println!("Options:");
    println!("  -o, --output <dir>     Output directory (default: current directory)");
    println!("  -v, --verbose          Verbose output");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Outputs:");
    println!("  huffdict.bin           Shared text decoding table");
    println!("  <suffix>_pages.bin     Page images, one per page");
    println!("  <suffix>_header.bin    Chapter header");
    println!("  <suffix>_labels.txt    Label addresses");
    println!();
    println!("Set RUST_LOG=debug for per-stage details.");
}
