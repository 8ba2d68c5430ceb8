use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand};
use playpen::{
    Block, EngineLabel, Session, Transcript, Viewport, Widget,
    config::{OutputFormat, Settings},
};

#[derive(Parser)]
#[command(author, version, about = "Run Narcissus, HTML and React snippets")]
struct Args {
    /// YAML settings file supplying defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available engines
    Engines,
    /// List the bundled examples of an engine
    Examples {
        #[arg(long, value_enum)]
        engine: Option<EngineLabel>,
    },
    /// Run one snippet and print its output blocks
    #[command(group(ArgGroup::new("input").args(["file", "example", "source"])))]
    Run {
        #[arg(long, value_enum)]
        engine: Option<EngineLabel>,
        /// Snippet file; `-` reads stdin
        file: Option<PathBuf>,
        /// Name of a bundled example, as shown by `examples`
        #[arg(long)]
        example: Option<String>,
        /// Snippet text given inline
        #[arg(long)]
        source: Option<String>,
        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
        /// Write each markup viewport to DIR/preview-N.html
        #[arg(long, value_name = "DIR")]
        preview_dir: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_default_env().init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    match args.command {
        Command::Engines => {
            for label in EngineLabel::ALL {
                let engine = label.build();
                println!("{:<14}{:<22}{}", label.name(), label.label(), engine.language_id());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Examples { engine } => {
            let session = Session::new(engine.unwrap_or(settings.engine));
            for example in session.examples() {
                println!("{}", example.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            engine,
            file,
            example,
            source,
            json,
            preview_dir,
        } => {
            let mut session = Session::new(engine.unwrap_or(settings.engine));
            let source = match (file, example, source) {
                (Some(path), _, _) => read_snippet(&path)?,
                (_, Some(name), _) => {
                    if !session.select_example(&name) {
                        bail!("no example named `{name}` for {}", session.label());
                    }
                    match session.load_selected() {
                        Some(text) => text.with_context(|| format!("failed to read example `{name}`"))?,
                        None => bail!("no example selected"),
                    }
                }
                (_, _, Some(text)) => text,
                (None, None, None) => bail!("nothing to run: pass a FILE, --example or --source"),
            };

            let mut transcript = Transcript::new();
            session.run(&source, &mut transcript);

            if let Some(dir) = preview_dir.or(settings.preview_dir) {
                write_previews(&dir, &transcript)?;
            }
            let format = if json { OutputFormat::Json } else { settings.format };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&transcript)?),
                OutputFormat::Text => print_text(&transcript),
            }

            Ok(if transcript.faults().next().is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn read_snippet(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read snippet from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_previews(dir: &Path, transcript: &Transcript) -> Result<()> {
    let viewports = transcript.blocks.iter().filter_map(|block| match block {
        Block::Markup(viewport) => Some(viewport),
        _ => None,
    });
    for (idx, viewport) in viewports.enumerate() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("preview-{}.html", idx + 1));
        fs::write(&path, preview_page(viewport))
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn preview_page(viewport: &Viewport) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<body style=\"margin: 0;\">\n{}\n</body>\n</html>\n",
        viewport.iframe()
    )
}

fn print_text(transcript: &Transcript) {
    for block in &transcript.blocks {
        match block {
            Block::Console { text } => print!("{text}"),
            Block::Panel { title, body } => println!("--- {title} ---\n{body}"),
            Block::Markup(viewport) => println!("{}", viewport.document),
            Block::Widget { widget } => println!("{}", render_widget(widget)),
            Block::Fault(report) => eprintln!("error: {report}"),
        }
    }
}

fn render_widget(widget: &Widget) -> String {
    match widget {
        Widget::Title { text } => format!("# {text}"),
        Widget::Header { text } => format!("## {text}"),
        Widget::Subheader { text } => format!("### {text}"),
        Widget::Markdown { text } | Widget::Text { text } => text.clone(),
        Widget::Caption { text } => format!("  {text}"),
        Widget::Code { source, language } => {
            format!("```{}\n{source}\n```", language.as_deref().unwrap_or(""))
        }
        Widget::Json { value } => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Widget::Table { columns, rows } => {
            let mut lines = vec![columns.join(" | ")];
            lines.extend(rows.iter().map(|row| row.join(" | ")));
            lines.join("\n")
        }
        Widget::Metric {
            label,
            value,
            delta,
        } => match delta {
            Some(delta) => format!("{label}: {value} ({delta})"),
            None => format!("{label}: {value}"),
        },
        Widget::Divider => "---".to_string(),
        Widget::Alert { level, message } => format!("[{}] {message}", level.as_str()),
    }
}
