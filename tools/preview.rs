/// Preview — interactive shell for walking conversations in a dialogue database.
///
/// Usage: preview --db <path> [--vars <path>] [--strict]
///
/// Commands:
///   list                  — list conversations
///   start <id|title>      — start a conversation
///   next                  — follow the first NPC line
///   <n> | pick <n>        — choose player response n
///   refresh               — re-evaluate responses for the current line
///   force <conv> <entry>  — force the next step to link to an entry
///   set <name> <value>    — set a variable
///   vars                  — list variables
///   state                 — show the current state again
///   help                  — list commands
///   quit                  — exit

use dialogue_engine::core::characters::DatabaseCharacters;
use dialogue_engine::core::conversation::ConversationModel;
use dialogue_engine::core::database::DialogueDatabase;
use dialogue_engine::core::state::ConversationState;
use dialogue_engine::core::variables::{Value, VariableTable};
use dialogue_engine::schema::entry::{ConversationId, EntryRef};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut db_path = None;
    let mut vars_path = None;
    let mut strict = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                i += 1;
                db_path = Some(args[i].clone());
            }
            "--vars" if i + 1 < args.len() => {
                i += 1;
                vars_path = Some(args[i].clone());
            }
            "--strict" => strict = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(db_path) = db_path else {
        eprintln!("Missing --db <path>");
        print_usage();
        std::process::exit(1);
    };

    let database = match DialogueDatabase::load_from_ron(Path::new(&db_path)) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to load {}: {}", db_path, e);
            std::process::exit(1);
        }
    };

    let variables = match vars_path {
        Some(path) => load_variables(&path),
        None => VariableTable::new(),
    };

    println!(
        "Loaded {} conversations, {} actors",
        database.conversations().len(),
        database.actors().len()
    );
    println!("Type 'help' for commands.\n");

    let mut model = ConversationModel::builder(&database, variables, DatabaseCharacters::new(&database))
        .allow_evaluation_errors(strict)
        .build();
    let mut state: Option<ConversationState> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "list" => {
                for conversation in database.conversations() {
                    println!(
                        "  {:>3}  {} ({} entries)",
                        conversation.id.0,
                        conversation.title,
                        conversation.entries().len()
                    );
                }
            }
            "start" => {
                if parts.len() < 2 {
                    println!("Usage: start <id|title>");
                    continue;
                }
                let target = line["start".len()..].trim();
                let result = match target.parse::<u32>() {
                    Ok(id) => model.start(ConversationId(id)),
                    Err(_) => model.start_by_title(target),
                };
                match result {
                    Ok(s) => {
                        if !model.has_valid_entry() {
                            println!("(conversation has no valid entry)");
                        }
                        print_state(&s);
                        state = Some(s);
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "next" => {
                let Some(current) = &state else {
                    println!("No conversation started.");
                    continue;
                };
                let Some(response) = current.first_npc_response().cloned() else {
                    println!("No NPC line to follow.");
                    continue;
                };
                step(model.advance(&response), &mut state);
            }
            "pick" => {
                if parts.len() < 2 {
                    println!("Usage: pick <n>");
                    continue;
                }
                pick(&mut model, &mut state, parts[1]);
            }
            "refresh" => {
                let Some(current) = &state else {
                    println!("No conversation started.");
                    continue;
                };
                match model.refresh_responses(current) {
                    Ok(s) => {
                        print_state(&s);
                        state = Some(s);
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "force" => {
                let target = match (parts.get(1), parts.get(2)) {
                    (Some(c), Some(e)) => c.parse::<u32>().ok().zip(e.parse::<u32>().ok()),
                    _ => None,
                };
                let Some((conversation, entry)) = target else {
                    println!("Usage: force <conversation> <entry>");
                    continue;
                };
                match model.force_next_link_to(EntryRef::new(conversation, entry)) {
                    Ok(()) => println!("Next step will link to {}:{}", conversation, entry),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: set <name> <value>");
                    continue;
                }
                let value = parse_value(&parts[2..].join(" "));
                println!("{} = {}", parts[1], value);
                model.evaluator_mut().set(parts[1], value);
            }
            "vars" => {
                let vars = model.evaluator().variables();
                if vars.is_empty() {
                    println!("  (no variables)");
                }
                for (name, value) in vars {
                    println!("  {} = {}", name, value);
                }
            }
            "state" => match &state {
                Some(s) => print_state(s),
                None => println!("No conversation started."),
            },
            _ if cmd.parse::<usize>().is_ok() => {
                pick(&mut model, &mut state, &cmd);
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

type PreviewModel<'db> = ConversationModel<'db, VariableTable, DatabaseCharacters<'db>>;

fn pick(model: &mut PreviewModel<'_>, state: &mut Option<ConversationState>, choice: &str) {
    let Some(current) = state.as_ref() else {
        println!("No conversation started.");
        return;
    };
    let response = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| current.pc_responses.get(n))
        .cloned();
    let Some(response) = response else {
        println!("No response {}.", choice);
        return;
    };
    if !response.is_valid {
        println!("That response is blocked.");
        return;
    }
    step(model.advance(&response), state);
}

fn step(
    result: Result<ConversationState, dialogue_engine::core::conversation::ConversationError>,
    state: &mut Option<ConversationState>,
) {
    match result {
        Ok(s) => {
            print_state(&s);
            *state = Some(s);
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn print_state(state: &ConversationState) {
    if state.is_terminal() {
        println!("--- Conversation ended ---\n");
        return;
    }

    match &state.current_line {
        Some(line) if !line.text.is_empty() => {
            println!("\n{}: {}", line.speaker.name, line.text);
        }
        Some(line) => {
            println!("\n[{}] ({} says nothing)", line.entry, line.speaker.name);
        }
        None => {
            if let Some(entry) = state.entry {
                println!("\n[{}] (group)", entry);
            }
        }
    }

    for response in &state.npc_responses {
        println!("  > {} [{}]", response.formatted_text, response.destination);
    }
    for (i, response) in state.pc_responses.iter().enumerate() {
        let blocked = if response.is_valid { "" } else { " (blocked)" };
        println!("  {}. {}{}", i + 1, response.formatted_text, blocked);
    }
    if state.has_npc_response() {
        println!("(type 'next' to continue)");
    } else if !state.has_any_responses() {
        println!("(no responses; the conversation ends here)");
    }
    println!();
}

fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match s.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(s.trim_matches('"').to_string()),
        },
    }
}

fn load_variables(path: &str) -> VariableTable {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    match VariableTable::parse_ron(&text) {
        Ok(vars) => vars,
        Err(e) => {
            eprintln!("ERROR: Failed to parse {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: preview --db <path> [--vars <path>] [--strict]");
    println!();
    println!("  --db <path>     Dialogue database (.ron)");
    println!("  --vars <path>   Initial variables as a RON map");
    println!("  --strict        Report condition and script errors instead of ignoring them");
}

fn print_help() {
    println!("Commands:");
    println!("  list                  — list conversations");
    println!("  start <id|title>      — start a conversation");
    println!("  next                  — follow the first NPC line");
    println!("  <n> | pick <n>        — choose player response n");
    println!("  refresh               — re-evaluate responses for the current line");
    println!("  force <conv> <entry>  — force the next step to link to an entry");
    println!("  set <name> <value>    — set a variable");
    println!("  vars                  — list variables");
    println!("  state                 — show the current state again");
    println!("  help                  — list commands");
    println!("  quit                  — exit");
}
