mod data;
mod logging;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use renderer::Capabilities;
use tracing::{debug, info};

use crate::data::{DataPresenter, DataResolver, PresenterSpec};

#[derive(Parser)]
#[command(name = "curly", version, about = "Curly template compiler")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (repeat for debug and trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a template, and validate it when a presenter is given
    Check(CheckArgs),

    /// Render a template against a TOML presenter
    Render(RenderArgs),

    /// Run .test.curly test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Template file
    template: PathBuf,

    /// TOML presenter whose methods the template may reference
    #[arg(short, long)]
    presenter: Option<PathBuf>,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Template file
    template: PathBuf,

    /// TOML presenter to render against
    #[arg(short, long)]
    presenter: Option<PathBuf>,

    /// Dump lexer tokens instead of rendering
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Dump the parsed template instead of rendering
    #[arg(long)]
    ast: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.curly file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.no_color);

    let code = match cli.command {
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Render(args) => do_render(args, cli.no_color),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(&args.path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

/// A template file loaded into a codespan file database.
struct Source {
    files: SimpleFiles<String, String>,
    file_id: usize,
    text: String,
}

impl Source {
    fn read(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let mut files = SimpleFiles::new();
        let file_id = files.add(path.display().to_string(), text.clone());
        Ok(Source {
            files,
            file_id,
            text,
        })
    }

    fn emit(&self, diagnostic: &Diagnostic<usize>, no_color: bool) {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        let writer = StandardStream::stderr(color_choice);
        let config = term::Config::default();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &self.files, diagnostic);
    }
}

fn load_presenter(path: Option<&Path>) -> Result<Option<PresenterSpec>, String> {
    let Some(path) = path else {
        return Ok(None);
    };
    let spec = PresenterSpec::load(path)?;
    debug!(path = %path.display(), methods = spec.methods.len(), "loaded presenter");
    Ok(Some(spec))
}

fn do_check(args: CheckArgs, no_color: bool) -> i32 {
    let (source, presenter) = match Source::read(&args.template)
        .and_then(|source| Ok((source, load_presenter(args.presenter.as_deref())?)))
    {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let template = match curly::parser::Parser::new(source.text.as_str(), source.file_id).parse() {
        Ok(template) => template,
        Err(error) => {
            source.emit(&error.to_diagnostic(), no_color);
            return 1;
        }
    };

    let Some(presenter) = presenter else {
        eprintln!("ok: {} parsed successfully", args.template.display());
        return 0;
    };

    let invalid = curly::validator::validate(&template, &presenter);
    for reference in &invalid {
        source.emit(&reference.to_diagnostic(source.file_id), no_color);
    }
    if invalid.is_empty() {
        eprintln!("ok: {} is valid", args.template.display());
        0
    } else {
        1
    }
}

fn do_render(args: RenderArgs, no_color: bool) -> i32 {
    let source = match Source::read(&args.template) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    if args.tokens {
        for token in curly::lexer::scan(&source.text) {
            println!("{:?}", token);
        }
        return 0;
    }

    if args.ast {
        return match curly::parser::Parser::new(source.text.as_str(), source.file_id).parse() {
            Ok(template) => {
                println!("{:#?}", template.nodes);
                0
            }
            Err(error) => {
                source.emit(&error.to_diagnostic(), no_color);
                1
            }
        };
    }

    let presenter = match load_presenter(args.presenter.as_deref()) {
        Ok(Some(presenter)) => presenter,
        Ok(None) => {
            eprintln!("error: rendering needs a presenter (--presenter data.toml)");
            return 1;
        }
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let capabilities: &dyn Capabilities = &presenter;
    let template = match renderer::compile_with_id(&source.text, source.file_id, Some(capabilities)) {
        Ok(template) => template,
        Err(error) => {
            source.emit(&error.to_diagnostic(source.file_id), no_color);
            return 1;
        }
    };

    match template.render(&DataPresenter::root(&presenter), &DataResolver::new(&presenter)) {
        Ok(output) => {
            info!(bytes = output.len(), "rendered");
            print!("{}", output);
            0
        }
        Err(error) => {
            eprintln!("render error: {}", error);
            1
        }
    }
}
