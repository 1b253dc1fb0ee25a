//! Three participants share one in-process room and rotate turns.
//!
//! Participant 1 starts as the authority, advances twice by hand, lets one
//! turn time out and then hands authority to participant 2.
//!
//! Run with `RUST_LOG=turnsync_room=debug` to see every adoption.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use turnsync::prelude::*;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

const ROSTER: &str = r#"{
    "combatants": [
        { "id": "1", "displayName": "Aria" },
        { "id": "2", "displayName": "Borin" },
        { "id": "3", "displayName": "Cyra" }
    ]
}"#;

const TURN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct Roster {
    combatants: Vec<Combatant>,
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

struct Seat {
    name: String,
    handle: TurnHandle,
}

fn seat(room: &MemoryRoom, combatant: &Combatant) -> Seat {
    let participant = room.join(combatant.id.clone());
    let (observer, events) = channel_observer();
    let handle = spawn_turn_actor(
        Arc::new(participant.clone()),
        participant,
        observer,
        TurnConfig::with_timeout(TURN_TIMEOUT),
    );
    handle.follow(room.subscribe());
    tokio::spawn(print_events(combatant.display_name.clone(), events));

    Seat {
        name: combatant.display_name.clone(),
        handle,
    }
}

async fn print_events(name: String, mut events: mpsc::UnboundedReceiver<TurnChanged>) {
    while let Some(event) = events.recv().await {
        let marker = if event.is_my_turn { " <- my turn" } else { "" };
        match serde_json::to_string(&event) {
            Ok(json) => println!("[{name:>5}] {json}{marker}"),
            Err(error) => tracing::warn!(%error, "could not render turn event"),
        }
    }
}

/// Lets the room feed reach every seat.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    turnsync::init_tracing("info");

    let roster: Roster = serde_json::from_str(ROSTER)?;
    let room = MemoryRoom::new();
    let seats: Vec<Seat> = roster.combatants.iter().map(|c| seat(&room, c)).collect();

    println!("--- {} starts the rotation", seats[0].name);
    seats[0].handle.initialize(roster.combatants.clone()).await?;
    settle().await;

    for _ in 0..2 {
        seats[0].handle.advance_turn().await?;
        settle().await;
    }

    // Observers cannot move the turn.
    let moved = seats[1].handle.advance_turn().await?;
    println!("--- {} tried to advance: moved = {moved}", seats[1].name);

    println!("--- waiting out a {}s turn", TURN_TIMEOUT.as_secs());
    tokio::time::sleep(TURN_TIMEOUT + Duration::from_millis(200)).await;

    println!("--- authority moves to {}", seats[1].name);
    seats[0].handle.shutdown().await?;
    room.set_authority(Some(roster.combatants[1].id.clone()));
    for seat in &seats[1..] {
        seat.handle.authority_changed().await?;
    }
    seats[1].handle.advance_turn().await?;
    settle().await;

    for seat in &seats[1..] {
        let snapshot = seat.handle.snapshot().await?;
        println!(
            "--- {}: index {:?}, authority {}, deadline {:?}",
            seat.name,
            snapshot.state.map(|s| s.index()),
            snapshot.is_authority,
            snapshot.deadline_remaining,
        );
        seat.handle.shutdown().await?;
    }

    Ok(())
}
