// flowsh: Pathflow Shell (optional local session driver)
// Build with: cargo build --features cli --bin flowsh

use clap::{Arg, ArgAction, Command};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

use pathflow::flow::changes::{Connection, NodeChange};
use pathflow::flow::snapshot::{Node, Position, Snapshot};
use pathflow::history::session::FlowSession;
use pathflow::history::throttle::TriggerThrottle;
use pathflow::persistence::persist::{flow_file_to_string, SlotStore};
use pathflow::persistence::settings::EngineSettings;

fn settings_dir() -> std::path::PathBuf {
    // Reuse the engine's settings directory for history storage
    EngineSettings::settings_dir()
}

fn main() {
    env_logger::init();

    let matches = Command::new("flowsh")
        .about("Pathflow shell: drive an undo-aware node-flow session from the terminal")
        .arg(Arg::new("slot_dir").long("slot-dir").value_name("DIR").help("Directory for flow slots (overrides settings)"))
        .arg(Arg::new("eval").short('e').long("eval").value_name("COMMAND").help("Run a single command and exit"))
        .arg(Arg::new("demo").long("demo").action(ArgAction::SetTrue).help("Seed the session with the two sample schema nodes"))
        .arg(Arg::new("quiet").short('q').long("quiet").action(ArgAction::SetTrue).help("Suppress banner/help text"))
        .get_matches();

    let settings = EngineSettings::load().unwrap_or_default();
    let slot_dir = matches
        .get_one::<String>("slot_dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.slot_dir());
    let store = SlotStore::new(slot_dir);

    let initial = if matches.get_flag("demo") { demo_snapshot() } else { Snapshot::new() };
    let mut session = FlowSession::with_capacity(initial, settings.max_history);
    let mut gate = TriggerThrottle::new(settings.throttle_interval());
    let quiet = matches.get_flag("quiet");

    // One-off eval mode
    if let Some(line) = matches.get_one::<String>("eval").cloned() {
        match run_line(&mut session, &store, &mut gate, &line) {
            Ok(Some(out)) => println!("{}", out),
            Ok(None) => {}
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Interactive mode with history
    let mut rl: Editor<(), DefaultHistory> = match Editor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to initialize editor: {}", e);
            std::process::exit(1);
        }
    };
    let mut hist_path = settings_dir();
    hist_path.push("flowsh_history.txt");
    // Load history if present
    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or_else(|| std::path::Path::new(".")));
    let _ = rl.load_history(&hist_path);

    if !quiet {
        eprintln!(
            "Pathflow session ready ({} nodes). Type :help for commands, quit / exit to leave. History saved at {}.\n",
            session.snapshot().node_count(),
            hist_path.display()
        );
    }

    loop {
        match rl.readline("flowsh> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() { continue; }
                if input == ":quit" || input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") { break; }
                if input == ":help" || input == "?" {
                    println!("{}", HELP);
                    continue;
                }
                rl.add_history_entry(input).ok();

                match run_line(&mut session, &store, &mut gate, input) {
                    Ok(Some(out)) => println!("{}", out),
                    Ok(None) => {}
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => { // Ctrl-C
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => { // Ctrl-D
                break;
            }
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);
}

const HELP: &str = "Commands:\n  add <kind> <x> <y> [label]                Create a node\n  move <id> <x> <y>                         Move a node (drag end)\n  link <src> <srcHandle> <dst> <dstHandle>  Connect two handles\n  rm <id...>                                Remove nodes and their edges\n  dup <id...>                               Duplicate nodes\n  expand | collapse                         Toggle isExpanded on every node\n  undo | redo                               Traverse history (throttled)\n  nodes | edges | show                      Inspect the live flow\n  history                                   Log length and pointer\n  save [name] | load [name]                 Write/read a flow slot (default \"flow\")\n  checkpoint                                Timestamped slot\n  slots                                     List slots\n  export <path> | import <path>             Flow JSON to/from a file\n  :help or ?                                Show this help\n  :quit, quit, exit                         Leave flowsh\nNotes:\n  - Quote handle names containing spaces: link 2 Lime 3 \"Ammonia for Fuel\"";

fn run_line(
    session: &mut FlowSession,
    store: &SlotStore,
    gate: &mut TriggerThrottle,
    line: &str,
) -> Result<Option<String>> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    let cmd = tokens[0].as_str();
    let args = &tokens[1..];

    match cmd {
        "add" => {
            if args.len() < 3 {
                return Err(anyhow!("usage: add <kind> <x> <y> [label]"));
            }
            let x: f64 = args[1].parse()?;
            let y: f64 = args[2].parse()?;
            let mut data = Map::new();
            if let Some(label) = args.get(3) {
                data.insert("label".to_string(), Value::String(label.clone()));
            }
            let id = session.add_node(args[0].clone(), Position { x, y }, data);
            Ok(Some(format!("added node {}", id)))
        }
        "move" => {
            if args.len() < 3 {
                return Err(anyhow!("usage: move <id> <x> <y>"));
            }
            let x: f64 = args[1].parse()?;
            let y: f64 = args[2].parse()?;
            session.apply_node_changes(vec![NodeChange::Position {
                id: args[0].clone(),
                position: Position { x, y },
                dragging: false,
            }]);
            Ok(Some(format!("moved {}", args[0])))
        }
        "link" => {
            if args.len() < 4 {
                return Err(anyhow!("usage: link <source> <sourceHandle> <target> <targetHandle>"));
            }
            let id = session.connect(Connection::new(
                args[0].clone(),
                args[1].clone(),
                args[2].clone(),
                args[3].clone(),
            ));
            Ok(Some(format!("linked as {}", id)))
        }
        "rm" => {
            if args.is_empty() {
                return Err(anyhow!("usage: rm <id...>"));
            }
            session.remove_nodes(args);
            Ok(Some(format!("removed {} node(s)", args.len())))
        }
        "dup" => {
            if args.is_empty() {
                return Err(anyhow!("usage: dup <id...>"));
            }
            let ids = session.duplicate_nodes(args);
            if ids.is_empty() {
                Ok(Some("no matching nodes".to_string()))
            } else {
                Ok(Some(format!("duplicated as {}", ids.join(", "))))
            }
        }
        "expand" => {
            session.set_all_expanded(true);
            Ok(Some("expanded all nodes".to_string()))
        }
        "collapse" => {
            session.set_all_expanded(false);
            Ok(Some("collapsed all nodes".to_string()))
        }
        "undo" => {
            if !gate.try_trigger() {
                return Ok(None);
            }
            let msg = if session.undo() { "undone" } else { "nothing to undo" };
            Ok(Some(msg.to_string()))
        }
        "redo" => {
            if !gate.try_trigger() {
                return Ok(None);
            }
            let msg = if session.redo() { "redone" } else { "nothing to redo" };
            Ok(Some(msg.to_string()))
        }
        "nodes" => {
            let lines: Vec<String> = session
                .snapshot()
                .nodes
                .iter()
                .map(|n| format!("{}  {}  ({}, {})", n.id, n.kind, n.position.x, n.position.y))
                .collect();
            Ok(Some(if lines.is_empty() { "no nodes".to_string() } else { lines.join("\n") }))
        }
        "edges" => {
            let lines: Vec<String> = session
                .snapshot()
                .edges
                .iter()
                .map(|e| format!("{}  {} -> {}", e.id, e.source, e.target))
                .collect();
            Ok(Some(if lines.is_empty() { "no edges".to_string() } else { lines.join("\n") }))
        }
        "show" => Ok(Some(flow_file_to_string(&session.to_flow_file())?)),
        "history" => Ok(Some(format!(
            "{} operations, pointer {} (undo: {}, redo: {})",
            session.history_len(),
            session.pointer(),
            session.can_undo(),
            session.can_redo()
        ))),
        "save" => {
            let name = args.first().map(String::as_str).unwrap_or("flow");
            let path = session.save_to(store, name)?;
            Ok(Some(format!("saved {}", path.display())))
        }
        "checkpoint" => {
            let path = store.save_checkpoint(&session.to_flow_file())?;
            session.reset_history();
            Ok(Some(format!("saved {}", path.display())))
        }
        "load" => {
            let name = args.first().map(String::as_str).unwrap_or("flow");
            match store.try_load(name)? {
                Some(flow) => {
                    session.load_flow(flow);
                    Ok(Some(format!(
                        "loaded {} ({} nodes, {} edges)",
                        name,
                        session.snapshot().node_count(),
                        session.snapshot().edge_count()
                    )))
                }
                None => Ok(Some(format!("no slot named {}", name))),
            }
        }
        "slots" => {
            let slots = store.list_slots()?;
            Ok(Some(if slots.is_empty() { "no slots".to_string() } else { slots.join("\n") }))
        }
        "export" => {
            if args.is_empty() {
                return Err(anyhow!("usage: export <path>"));
            }
            let s = flow_file_to_string(&session.to_flow_file())?;
            std::fs::write(&args[0], s)?;
            Ok(Some(format!("exported {}", args[0])))
        }
        "import" => {
            if args.is_empty() {
                return Err(anyhow!("usage: import <path>"));
            }
            let text = std::fs::read_to_string(&args[0])?;
            session.import_json(&text)?;
            Ok(Some(format!(
                "imported {} ({} nodes, {} edges)",
                args[0],
                session.snapshot().node_count(),
                session.snapshot().edge_count()
            )))
        }
        _ => Err(anyhow!("unrecognized command: {}", cmd)),
    }
}

// Split a command line into tokens, honoring double quotes so handle names
// with spaces stay one token.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// Two sample schema nodes patterned after the ammonia pathway demo data
fn demo_snapshot() -> Snapshot {
    let mut a = Map::new();
    a.insert("label".to_string(), Value::String("Ammonia from H2 from Coal Gasification w/ CC S".to_string()));
    a.insert("bgColor".to_string(), Value::String("#bfdbff".to_string()));
    a.insert("isExpanded".to_string(), Value::Bool(true));
    a.insert(
        "schema".to_string(),
        json!({
            "input": [
                { "title": "Nitrogen Gas", "value": "75%" },
                { "title": "Gaseous Hydrogen", "value": "10%" },
                { "title": "Electricity", "value": "15%" }
            ],
            "output": [
                { "title": "Lime", "value": "18%" },
                { "title": "Ammonia for Fuel", "value": "80%" }
            ]
        }),
    );

    let mut b = Map::new();
    b.insert("label".to_string(), Value::String("Ammonia Transportation and Distribution".to_string()));
    b.insert("bgColor".to_string(), Value::String("#ffe54e".to_string()));
    b.insert("isExpanded".to_string(), Value::Bool(true));
    b.insert(
        "schema".to_string(),
        json!({
            "input": [
                { "title": "Ammonia for Fuel", "value": "100%" },
                { "title": "Gaseous Hydrogen", "value": "10%" }
            ],
            "output": [
                { "title": "Lime", "value": "18%" },
                { "title": "Ammonia for Fuel", "value": "80%" }
            ]
        }),
    );

    Snapshot {
        nodes: vec![
            Node::new("2".to_string(), "dataSchema".to_string(), Position { x: 0.0, y: 0.0 }, a),
            Node::new("3".to_string(), "dataSchema".to_string(), Position { x: 600.0, y: 0.0 }, b),
        ],
        edges: Vec::new(),
    }
}
