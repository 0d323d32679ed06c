use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use storyloom::{
    graph_to_dot, Character, Clue, Config, ContentStore, Database, DotConfig, EditorPanel, Error, ExportMetadata,
    ExportSelection, LinkOutcome, LoadScope, MinigameConfig, MinigameCoordinator, MinigameKind, NewStorylet,
    StoryEditor, Storylet, Transfer,
};
use storyloom::minigame::Difficulty;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyloom")]
#[command(author, version, about = "Storyloom - storylet authoring: content, story graphs and choice links")]
struct Cli {
    /// Log debug output to stderr (otherwise STORYLOOM_LOG, default warn)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize storyloom in the current directory
    Init,

    /// Manage story arcs
    Arc {
        #[command(subcommand)]
        action: ArcAction,
    },

    /// Manage storylets
    Storylet {
        #[command(subcommand)]
        action: StoryletAction,
    },

    /// Manage characters
    Character {
        #[command(subcommand)]
        action: CharacterAction,
    },

    /// Manage clues
    Clue {
        #[command(subcommand)]
        action: ClueAction,
    },

    /// Show the storylet graph derived from choices
    Graph {
        /// Only storylets in this arc
        #[arg(long)]
        arc: Option<String>,

        #[arg(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,

        /// Title for DOT output
        #[arg(long)]
        title: Option<String>,
    },

    /// Connect two storylets with a choice
    Link {
        from: String,
        to: String,

        /// Choice text (default "Continue")
        #[arg(short, long)]
        label: Option<String>,

        #[arg(long)]
        arc: Option<String>,
    },

    /// Lay the graph out on a grid and print node positions
    Layout {
        #[arg(long)]
        arc: Option<String>,
    },

    /// Export content as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Collections to include (default: all)
        #[arg(long, value_enum, value_delimiter = ',')]
        only: Vec<Collection>,
    },

    /// Import content from a JSON export
    Import { file: PathBuf },

    /// Play a minigame for a clue with the scripted player and record the attempt
    Play {
        clue_id: String,

        /// memory_match, logic_puzzle, word_search, reaction_time, sequence_recall, pattern_recognition
        kind: String,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(long, value_enum, default_value_t = Level::Medium)]
        difficulty: Level,

        /// Time limit in seconds
        #[arg(long)]
        time_limit: Option<u32>,

        /// Storylet to continue with on success
        #[arg(long)]
        success: Option<String>,

        /// Storylet to continue with on failure
        #[arg(long)]
        failure: Option<String>,
    },

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ArcAction {
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum StoryletAction {
    Add {
        title: String,
        #[arg(long)]
        arc: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
    },
    List {
        #[arg(long)]
        arc: Option<String>,
    },
    Show {
        id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
        /// Replace the tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(short, long)]
        priority: Option<i32>,
        /// Estimated play time in minutes
        #[arg(long)]
        play_time: Option<u32>,
        /// Add a choice with this text
        #[arg(long = "add-choice")]
        add_choices: Vec<String>,
        /// Remove the choice with this id
        #[arg(long = "remove-choice")]
        remove_choices: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CharacterAction {
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long)]
        role: Option<String>,
        #[arg(long = "trait")]
        traits: Vec<String>,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum ClueAction {
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum GraphFormat {
    Text,
    Json,
    Dot,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Collection {
    Storylets,
    Arcs,
    Clues,
    Characters,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
    Easy,
    Medium,
    Hard,
}

impl From<Level> for Difficulty {
    fn from(level: Level) -> Self {
        match level {
            Level::Easy => Difficulty::Easy,
            Level::Medium => Difficulty::Medium,
            Level::Hard => Difficulty::Hard,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("STORYLOOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Init => storyloom::init::init_project(),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "storyloom", &mut io::stdout());
            Ok(())
        }
        command => run(command).map_err(|e| e.to_string()),
    };

    if let Err(e) = outcome {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn open_store() -> Result<ContentStore<Database>, Error> {
    let db = Database::open()?;
    tracing::debug!(path = %Database::db_path().display(), "opened content database");
    ContentStore::open(db)
}

fn run(command: Command) -> Result<(), Error> {
    let config = Config::load();
    let mut store = open_store()?;

    match command {
        Command::Init | Command::Completion { .. } => {}

        Command::Arc { action } => match action {
            ArcAction::Add { name, description } => {
                let arc = store.create_arc(&name, &description)?;
                println!("{} arc {} {}", "Created".green(), arc.id.dimmed(), arc.name.bold());
            }
            ArcAction::List => {
                if store.arcs().is_empty() {
                    println!("No arcs yet. Create one with {}", "storyloom arc add <name>".cyan());
                }
                for arc in store.arcs() {
                    let count = store.storylets_for(&LoadScope::Arc(arc.id.clone())).len();
                    println!("{}  {}  ({} storylets)", arc.id.dimmed(), arc.name.bold(), count);
                }
            }
        },

        Command::Storylet { action } => storylet_command(&mut store, action)?,

        Command::Character { action } => match action {
            CharacterAction::Add {
                name,
                description,
                role,
                traits,
            } => {
                let mut character = Character::new(name, description);
                character.role = role;
                character.traits = traits;
                let id = character.id.clone();
                store.insert_character(character)?;
                println!("{} character {}", "Created".green(), id.dimmed());
            }
            CharacterAction::List => {
                for c in store.characters() {
                    let role = c.role.as_deref().unwrap_or("-");
                    println!("{}  {}  [{}]  {}", c.id.dimmed(), c.name.bold(), role, c.traits.join(", "));
                }
            }
        },

        Command::Clue { action } => match action {
            ClueAction::Add {
                name,
                description,
                category,
            } => {
                let mut clue = Clue::new(name, description);
                clue.category = category;
                let id = clue.id.clone();
                store.insert_clue(clue)?;
                println!("{} clue {}", "Created".green(), id.dimmed());
            }
            ClueAction::List => {
                for clue in store.clues() {
                    let mark = if clue.discovered { "✓".green() } else { "·".dimmed() };
                    println!("{} {}  {}", mark, clue.id.dimmed(), clue.name.bold());
                }
            }
        },

        Command::Graph { arc, format, title } => {
            let mut editor = StoryEditor::new(store, config);
            editor.load(&LoadScope::from_arc(arc))?;
            match format {
                GraphFormat::Text => print_graph(&editor),
                GraphFormat::Json => println!("{}", serde_json::to_string_pretty(&editor.graph().snapshot())?),
                GraphFormat::Dot => {
                    let dot_config = DotConfig {
                        title,
                        ..DotConfig::default()
                    };
                    print!("{}", graph_to_dot(editor.graph(), &dot_config));
                }
            }
        }

        Command::Link { from, to, label, arc } => {
            let mut editor = StoryEditor::new(store, config);
            editor.load(&LoadScope::from_arc(arc))?;
            match editor.connect(&from, &to, label.as_deref())? {
                LinkOutcome::Linked => println!("{} {} -> {}", "Linked".green(), from, to),
                LinkOutcome::AlreadyLinked => println!("{} {} already leads to {}", "Skipping".yellow(), from, to),
                LinkOutcome::Stale => {
                    return Err(Error::Validation(vec![format!(
                        "{} and {} must both be loaded storylets",
                        from, to
                    )]))
                }
            }
            editor.shutdown();
        }

        Command::Layout { arc } => {
            let mut editor = StoryEditor::new(store, config);
            editor.load(&LoadScope::from_arc(arc))?;
            editor.graph_mut().auto_layout();
            for node in editor.graph().nodes() {
                println!(
                    "{:>8.1} {:>8.1}  {}",
                    node.position.x,
                    node.position.y,
                    node.data.title.bold()
                );
            }
        }

        Command::Export {
            output,
            description,
            tags,
            only,
        } => {
            let selection = if only.is_empty() {
                ExportSelection::default()
            } else {
                ExportSelection {
                    storylets: only.contains(&Collection::Storylets),
                    arcs: only.contains(&Collection::Arcs),
                    clues: only.contains(&Collection::Clues),
                    characters: only.contains(&Collection::Characters),
                }
            };
            let metadata = ExportMetadata {
                description,
                tags: (!tags.is_empty()).then_some(tags),
            };
            let json = Transfer::new(&config.transfer).export_json(&store, selection, metadata)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("{} {}", "Exported".green(), path.display());
                }
                None => println!("{}", json),
            }
        }

        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let report = Transfer::new(&config.transfer).import_json(&mut store, &json)?;
            println!(
                "{} {} storylets, {} arcs, {} clues, {} characters",
                "Imported".green(),
                report.storylets,
                report.arcs,
                report.clues,
                report.characters
            );
            if report.skipped > 0 {
                println!("{} {} records already present", "Skipped".yellow(), report.skipped);
            }
            for failure in &report.failed {
                eprintln!("{} {}", "Failed".red(), failure);
            }
        }

        Command::Play {
            clue_id,
            kind,
            seed,
            difficulty,
            time_limit,
            success,
            failure,
        } => {
            let kind = MinigameKind::from_str(&kind).map_err(|e| Error::Validation(vec![e]))?;
            let game = MinigameConfig {
                time_limit_secs: time_limit,
                difficulty: difficulty.into(),
                success_storylet_id: success,
                failure_storylet_id: failure,
                ..MinigameConfig::new(kind)
            };
            let (result, next) = MinigameCoordinator::new(&mut store).play_scripted(&clue_id, &game, seed)?;
            let verdict = if result.success { "Success".green() } else { "Failed".red() };
            println!(
                "{} {}  score {}  in {:.1}s",
                verdict,
                result.kind,
                result.score,
                result.duration_ms as f64 / 1000.0
            );
            if let Some(next) = next {
                println!("   Next storylet: {}", next.cyan());
            }
        }
    }
    Ok(())
}

fn storylet_command(store: &mut ContentStore<Database>, action: StoryletAction) -> Result<(), Error> {
    match action {
        StoryletAction::Add {
            title,
            arc,
            description,
            content,
            tags,
            priority,
        } => {
            if let Some(arc_id) = arc.as_deref() {
                if store.arc(arc_id).is_none() {
                    return Err(Error::not_found("Arc", arc_id));
                }
            }
            let storylet = store.create_storylet(NewStorylet {
                title,
                description,
                content,
                arc_id: arc,
                tags,
                priority,
                estimated_play_time: None,
            })?;
            println!("{} storylet {} {}", "Created".green(), storylet.id.dimmed(), storylet.title.bold());
        }
        StoryletAction::List { arc } => {
            for s in store.storylets_for(&LoadScope::from_arc(arc)) {
                println!("{}  {}  ({} choices)", s.id.dimmed(), s.title.bold(), s.choices.len());
            }
        }
        StoryletAction::Show { id } => {
            let store: &ContentStore<Database> = store;
            let storylet = store.storylet(&id).ok_or_else(|| Error::not_found("Storylet", &id))?;
            print_storylet(store, storylet);
        }
        StoryletAction::Edit {
            id,
            title,
            description,
            content,
            tags,
            priority,
            play_time,
            add_choices,
            remove_choices,
        } => {
            let mut panel = EditorPanel::open(store, &id)?;
            if let Some(title) = title {
                panel.set_title(title);
            }
            if let Some(description) = description {
                panel.set_description(description);
            }
            if let Some(content) = content {
                panel.set_content(content);
            }
            if !tags.is_empty() {
                panel.set_tags(tags);
            }
            if let Some(priority) = priority {
                panel.set_priority(priority);
            }
            if play_time.is_some() {
                panel.set_estimated_play_time(play_time);
            }
            for choice_id in &remove_choices {
                if !panel.remove_choice(choice_id) {
                    return Err(Error::not_found("Choice", choice_id));
                }
            }
            for text in add_choices {
                panel.add_choice(text);
            }
            if !panel.is_dirty() {
                println!("{} nothing to change", "Skipping".yellow());
                return Ok(());
            }
            let saved = panel.save(store)?;
            println!("{} storylet {}", "Updated".green(), saved.id.dimmed());
        }
    }
    Ok(())
}

fn print_storylet(store: &ContentStore<Database>, s: &Storylet) {
    println!("{}", s.title.bold());
    println!("   id:       {}", s.id.dimmed());
    if let Some(arc) = s.arc_id.as_deref().and_then(|id| store.arc(id)) {
        println!("   arc:      {}", arc.name);
    }
    if !s.tags.is_empty() {
        println!("   tags:     {}", s.tags.join(", "));
    }
    println!("   priority: {}", s.priority);
    if !s.description.is_empty() {
        println!("\n{}", s.description);
    }
    if !s.content.is_empty() {
        println!("\n{}", s.content);
    }
    if !s.choices.is_empty() {
        println!("\n{}", "Choices:".bold());
        for choice in &s.choices {
            let target = choice
                .next_storylet_id
                .as_deref()
                .map(|t| store.storylet(t).map(|n| n.title.as_str()).unwrap_or(t))
                .unwrap_or("-");
            println!("   {} {} -> {}", choice.id.dimmed(), choice.text, target.cyan());
        }
    }
}

fn print_graph(editor: &StoryEditor<Database>) {
    let graph = editor.graph();
    println!("{} {} nodes, {} connections", "Graph:".bold(), graph.nodes().len(), graph.connections().len());
    for node in graph.nodes() {
        let arc = node.data.arc_name.as_deref().unwrap_or("-");
        println!("   {}  {}  [{}]", node.data.storylet_id.dimmed(), node.data.title.bold(), arc);
    }
    for connection in graph.connections() {
        let title = |node_id: &str| {
            graph
                .node(node_id)
                .map(|n| n.data.title.clone())
                .unwrap_or_else(|| node_id.to_string())
        };
        let label = connection.label.as_deref().unwrap_or("");
        println!(
            "   {} -> {}  {}",
            title(&connection.from_node_id),
            title(&connection.to_node_id),
            label.dimmed()
        );
    }
}
