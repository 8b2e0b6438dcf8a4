//! Line-oriented terminal loop.
//!
//! Reads one line at a time from stdin and hands it to the session. Ctrl-C
//! during a conversation walks away from the NPC, interrupting a pending
//! reply; anywhere else it leaves the game. On leaving the player is
//! offered a save before the worker is stopped.

use llama::WorkerLauncher;
use std::io::{self, Write};
use tavern_core::GameSession;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

/// Run the game until the player leaves.
pub async fn run<L: WorkerLauncher>(mut session: GameSession<L>) -> io::Result<()> {
    println!("{}", "=".repeat(50));
    println!("    WELCOME TO THE TAVERN ADVENTURE!");
    println!("{}", "=".repeat(50));
    println!("{}", session.intro());
    println!();

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        show_prompt(&session)?;

        let line = tokio::select! {
            line = input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                if let Some(text) = session.interrupt_conversation() {
                    println!("\n{text}\n");
                    continue;
                }
                println!("\n\nGame interrupted.");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let turn = session.engine().turn_token();
        let in_conversation = session.conversation().is_some();
        let handling = session.handle_with(&line, &turn);
        tokio::pin!(handling);

        let (response, interrupted) = tokio::select! {
            response = &mut handling => (response, false),
            _ = tokio::signal::ctrl_c() => {
                turn.cancel();
                (handling.await, true)
            }
        };

        if !response.text.is_empty() {
            println!("{}", response.text);
            println!();
        }
        if response.quit || (interrupted && !in_conversation) {
            break;
        }
    }

    offer_save(&mut session, &mut input).await?;
    session.engine().shutdown().await;
    Ok(())
}

fn show_prompt<L: WorkerLauncher>(session: &GameSession<L>) -> io::Result<()> {
    let npc_name = session
        .conversation()
        .and_then(|id| session.world().npcs.get(id))
        .map(|npc| npc.name.as_str());

    match npc_name {
        Some(name) => print!("What do you say to {name}? (or 'bye' to end conversation): "),
        None => print!("> "),
    }
    io::stdout().flush()
}

async fn offer_save<L: WorkerLauncher>(
    session: &mut GameSession<L>,
    input: &mut Input,
) -> io::Result<()> {
    print!("Would you like to save your game? (y/n): ");
    io::stdout().flush()?;

    let Ok(Some(answer)) = input.next_line().await else {
        println!();
        return Ok(());
    };
    if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        if session.conversation().is_some() {
            session.handle("bye").await;
        }
        println!("{}", session.handle("save").await.text);
    }
    Ok(())
}
