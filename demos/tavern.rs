/// Tavern demo — a few visits to the Gilded Goose.
///
/// The first visit buys an ale, which unlocks the regulars' questions and a
/// detour into the bard's conversation. The second visit gets the returning
/// greeting, and choices already taken come back tagged `[em1]`. Finally the
/// bard's own conversation is started with an empty purse; its display
/// settings keep the unaffordable choice visible but blocked.
///
/// Run with: cargo run --example tavern

use dialogue_engine::core::characters::DatabaseCharacters;
use dialogue_engine::core::conversation::ConversationModel;
use dialogue_engine::core::database::DialogueDatabase;
use dialogue_engine::core::state::ConversationState;
use dialogue_engine::core::variables::VariableTable;
use dialogue_engine::schema::settings::{EmTag, ResponseDisplaySettings};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let database = DialogueDatabase::load_from_ron(std::path::Path::new("dialogue_data/tavern.ron"))
        .expect("Failed to load tavern dialogue");

    let report = database.lint();
    for warning in &report.warnings {
        println!("lint: {}", warning);
    }
    assert!(report.errors.is_empty(), "tavern dialogue has lint errors");

    let mut variables = VariableTable::new();
    variables.set("gold", 5);
    variables.set("ales", 0);

    let settings = ResponseDisplaySettings {
        em_tag_for_old_responses: EmTag::Em1,
        ..ResponseDisplaySettings::default()
    };
    let mut model = ConversationModel::builder(&database, variables, DatabaseCharacters::new(&database))
        .settings(settings)
        .build();

    println!("=== First visit ===\n");
    let mut state = model
        .start_by_title("Tavern Welcome")
        .expect("Failed to start conversation");
    // Buy an ale, ask about the bard, pay for a song, then leave.
    for choice in [
        "An ale, please.",
        "Who's the fellow with the lute?",
        "Here's a coin.",
        "Just passing through.",
    ] {
        state = walk_to_choices(&mut model, state);
        print_choices(&state);
        let response = state
            .pc_responses
            .iter()
            .find(|r| r.formatted_text.contains(choice))
            .cloned()
            .unwrap_or_else(|| panic!("choice '{}' not offered", choice));
        println!("  -> {}\n", response.formatted_text);
        state = model.advance(&response).expect("Failed to advance");
    }
    walk_to_choices(&mut model, state);

    println!("\n=== Second visit ===\n");
    let state = model
        .start_by_title("Tavern Welcome")
        .expect("Failed to start conversation");
    let state = walk_to_choices(&mut model, state);
    print_choices(&state);

    let bard = state
        .pc_responses
        .iter()
        .find(|r| r.formatted_text.contains("lute"))
        .cloned()
        .expect("bard question offered to regulars");
    let state = model.advance(&bard).expect("Failed to advance");
    let state = walk_to_choices(&mut model, state);
    print_choices(&state);

    println!("\n=== Broke ===\n");
    model.evaluator_mut().set("gold", 0);
    let state = model
        .start_by_title("Bard's Tale")
        .expect("Failed to start conversation");
    let state = walk_to_choices(&mut model, state);
    print_choices(&state);

    println!("\nPlayer: {}", model.pc_name().unwrap_or("(none)"));
    for (name, value) in model.evaluator().variables() {
        println!("  {} = {}", name, value);
    }
}

/// Follow NPC lines, printing them, until the player has to choose or the
/// conversation ends.
fn walk_to_choices(
    model: &mut ConversationModel<'_, VariableTable, DatabaseCharacters<'_>>,
    mut state: ConversationState,
) -> ConversationState {
    loop {
        if let Some(line) = &state.current_line {
            if !line.text.is_empty() {
                println!("{}: {}", line.speaker.name, line.text);
            }
        }
        if state.has_pc_responses() {
            return state;
        }
        let Some(next) = state.first_npc_response().cloned() else {
            println!("--- Conversation ended ---");
            return state;
        };
        state = model.advance(&next).expect("Failed to advance");
    }
}

fn print_choices(state: &ConversationState) {
    for (i, response) in state.pc_responses.iter().enumerate() {
        let blocked = if response.is_valid { "" } else { " (blocked)" };
        println!("  {}. {}{}", i + 1, response.formatted_text, blocked);
    }
}
